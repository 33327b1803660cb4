//! # Effects Module
//!
//! Every effect maps to a fixed ffmpeg filter graph and fixed codec/quality
//! parameters, plus the suffix and container used to name its output.
//!
//! ## Effetti supportati:
//! - `mirror`: flip orizzontale, audio in passthrough
//! - `grayscale`: saturazione a zero, video ricodificato, audio in passthrough
//! - `copyright-filter`: flip + crop + scale + hue + eq + noise sul video,
//!   pitch/tempo/dinamica sull'audio
//! - `audio-only`: estrae solo la traccia audio in MP3

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::args;

/// x264 quality used by every effect that re-encodes video
pub const VIDEO_CRF: u8 = 23;
/// x264 preset used by every effect that re-encodes video
pub const VIDEO_PRESET: &str = "veryfast";

const COMPOSITE_VIDEO_FILTER: &str = "hflip,\
crop=iw*0.92:ih*0.92,\
scale=trunc(iw/2)*2:trunc(ih/2)*2,\
hue=h=4:s=1.08,\
eq=brightness=0.02:contrast=1.04,\
noise=alls=4:allf=t";

const COMPOSITE_AUDIO_FILTER: &str = "asetrate=44100*1.04,\
aresample=44100,\
atempo=0.97,\
acompressor=threshold=0.125:ratio=3";

/// Transformation applied to the fetched media
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Effect {
    /// Horizontal flip, audio untouched
    Mirror,
    /// Remove colour saturation, audio untouched
    Grayscale,
    /// Composite video and audio alteration
    CopyrightFilter,
    /// Drop the video stream and keep an MP3
    AudioOnly,
}

impl Effect {
    /// Effect-specific ffmpeg arguments, placed between the input and the output path
    pub fn ffmpeg_args(&self) -> Vec<String> {
        match self {
            Effect::Mirror => args![
                "-vf", "hflip",
                "-c:v", "libx264", "-preset", VIDEO_PRESET, "-crf", VIDEO_CRF,
                "-c:a", "copy",
            ],
            Effect::Grayscale => args![
                "-vf", "hue=s=0",
                "-c:v", "libx264", "-preset", VIDEO_PRESET, "-crf", VIDEO_CRF,
                "-c:a", "copy",
            ],
            Effect::CopyrightFilter => args![
                "-vf", COMPOSITE_VIDEO_FILTER,
                "-af", COMPOSITE_AUDIO_FILTER,
                "-c:v", "libx264", "-preset", VIDEO_PRESET, "-crf", VIDEO_CRF,
                "-c:a", "aac", "-b:a", "192k",
                "-movflags", "+faststart",
            ],
            Effect::AudioOnly => args![
                "-vn",
                "-c:a", "libmp3lame", "-q:a", 2,
            ],
        }
    }

    /// Suffix appended to the input's base name
    pub fn suffix(&self) -> &'static str {
        match self {
            Effect::Mirror => "_mirrored",
            Effect::Grayscale => "_grayscale",
            Effect::CopyrightFilter => "_transformed",
            Effect::AudioOnly => "_audio",
        }
    }

    /// Container extension forced on the output
    pub fn extension(&self) -> &'static str {
        match self {
            Effect::AudioOnly => "mp3",
            _ => "mp4",
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Effect::Mirror => "mirror",
            Effect::Grayscale => "grayscale",
            Effect::CopyrightFilter => "copyright-filter",
            Effect::AudioOnly => "audio-only",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_mirror_flips_and_copies_audio() {
        let args = Effect::Mirror.ffmpeg_args();
        assert_eq!(value_after(&args, "-vf"), Some("hflip"));
        assert_eq!(value_after(&args, "-c:a"), Some("copy"));
        assert_eq!(value_after(&args, "-crf"), Some("23"));
    }

    #[test]
    fn test_grayscale_zeroes_saturation() {
        let args = Effect::Grayscale.ffmpeg_args();
        assert_eq!(value_after(&args, "-vf"), Some("hue=s=0"));
        assert_eq!(value_after(&args, "-c:v"), Some("libx264"));
        assert_eq!(value_after(&args, "-c:a"), Some("copy"));
    }

    #[test]
    fn test_composite_has_paired_audio_chain() {
        let args = Effect::CopyrightFilter.ffmpeg_args();
        let video = value_after(&args, "-vf").unwrap();
        for filter in ["hflip", "crop=", "scale=", "hue=", "eq=", "noise="] {
            assert!(video.contains(filter), "missing {filter} in {video}");
        }
        let audio = value_after(&args, "-af").unwrap();
        for filter in ["asetrate=", "atempo=", "acompressor"] {
            assert!(audio.contains(filter), "missing {filter} in {audio}");
        }
        assert_eq!(value_after(&args, "-c:a"), Some("aac"));
    }

    #[test]
    fn test_audio_only_drops_video() {
        let args = Effect::AudioOnly.ffmpeg_args();
        assert!(args.contains(&"-vn".to_string()));
        assert!(!args.contains(&"-vf".to_string()));
        assert_eq!(Effect::AudioOnly.extension(), "mp3");
    }

    #[test]
    fn test_args_are_deterministic() {
        for effect in Effect::value_variants() {
            assert_eq!(effect.ffmpeg_args(), effect.ffmpeg_args());
        }
    }

    #[test]
    fn test_naming() {
        assert_eq!(Effect::Mirror.suffix(), "_mirrored");
        assert_eq!(Effect::CopyrightFilter.suffix(), "_transformed");
        assert_eq!(Effect::Grayscale.extension(), "mp4");
        assert_eq!(Effect::CopyrightFilter.to_string(), "copyright-filter");
    }
}
