//! # Tool Path Resolver
//!
//! Finds the external executables the pipeline drives:
//! - `ffmpeg` for the transform
//! - `yt-dlp` for the retrieval
//!
//! Resolution order: explicit path from the configuration, then the
//! `CLIP_TRANSFORM_<TOOL>` environment variable, then the system PATH.

use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Tools the pipeline needs
pub const REQUIRED_TOOLS: &[&str] = &["ffmpeg", "yt-dlp"];

/// Resolves tool names to executables
#[derive(Debug, Clone, Default)]
pub struct ToolResolver;

impl ToolResolver {
    pub fn new() -> Self {
        Self
    }

    /// Environment variable that overrides a tool, e.g. `CLIP_TRANSFORM_YT_DLP`
    pub fn env_var(tool_name: &str) -> String {
        let suffix: String = tool_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("CLIP_TRANSFORM_{}", suffix)
    }

    /// Resolve the path to a specific tool
    pub fn resolve(&self, tool_name: &str, explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            debug!("Using configured {}: {:?}", tool_name, path);
            return Some(path.to_path_buf());
        }

        let var = Self::env_var(tool_name);
        if let Some(value) = env::var_os(&var) {
            let path = PathBuf::from(value);
            if path.is_file() {
                debug!("Using {} from {}: {:?}", tool_name, var, path);
                return Some(path);
            }
            warn!("{} is set but does not point to a file: {:?}", var, path);
        }

        match which::which(tool_name) {
            Ok(path) => {
                debug!("Using system {}: {:?}", tool_name, path);
                Some(path)
            }
            Err(_) => None,
        }
    }

    /// Like `resolve`, falling back to the bare name.
    ///
    /// Spawning the bare name then fails with a clear launch error.
    pub fn resolve_or_bare(&self, tool_name: &str, explicit: Option<&Path>) -> PathBuf {
        self.resolve(tool_name, explicit).unwrap_or_else(|| {
            warn!("Tool not found: {}", tool_name);
            PathBuf::from(tool_name)
        })
    }

    /// Get installation instructions for a tool
    pub fn install_instructions(tool_name: &str) -> String {
        let hint = if cfg!(target_os = "macos") {
            match tool_name {
                "yt-dlp" => "brew install yt-dlp",
                "ffmpeg" => "brew install ffmpeg",
                _ => "",
            }
        } else if cfg!(windows) {
            match tool_name {
                "yt-dlp" => "winget install yt-dlp.yt-dlp",
                "ffmpeg" => "winget install Gyan.FFmpeg",
                _ => "",
            }
        } else {
            match tool_name {
                "yt-dlp" => "python3 -m pip install -U yt-dlp",
                "ffmpeg" => "sudo apt-get install ffmpeg",
                _ => "",
            }
        };
        if hint.is_empty() {
            format!("install {} and make sure it is on PATH", tool_name)
        } else {
            hint.to_string()
        }
    }

    /// Get a report of tool availability
    pub fn tools_report(&self, ffmpeg: Option<&Path>, ytdlp: Option<&Path>) -> String {
        let mut report = String::from("Tool availability:\n");
        for (tool, explicit) in [("ffmpeg", ffmpeg), ("yt-dlp", ytdlp)] {
            match self.resolve(tool, explicit) {
                Some(path) => report.push_str(&format!("  ✅ {} -> {}\n", tool, path.display())),
                None => report.push_str(&format!(
                    "  ❌ {} (install with: {}, or set {})\n",
                    tool,
                    Self::install_instructions(tool),
                    Self::env_var(tool)
                )),
            }
        }
        report
    }
}
