//! # Transform Request Module
//!
//! Input/output description of a single transcoder run and its outcome.
//! Output naming is centralised here: `<stem><suffix>.<container>`.

use crate::effect::Effect;
use crate::error::{Result, TransformError};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// One transform to run; immutable once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformRequest {
    input_path: PathBuf,
    effect: Effect,
    output_path: PathBuf,
}

impl TransformRequest {
    pub fn new(input_path: impl Into<PathBuf>, effect: Effect, output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            effect,
            output_path: output_path.into(),
        }
    }

    /// Builds a request whose output is named after the input.
    ///
    /// Without `output_dir` the output lands next to the input.
    pub fn for_input(input_path: &Path, effect: Effect, output_dir: Option<&Path>) -> Result<Self> {
        let output_path = derive_output_path(input_path, effect, output_dir)?;
        Ok(Self::new(input_path, effect, output_path))
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn effect(&self) -> Effect {
        self.effect
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Full ffmpeg argument vector for this request
    pub fn ffmpeg_args(&self) -> Vec<String> {
        let mut args = crate::args!["-hide_banner", "-nostdin", "-y", "-i"];
        args.push(self.input_path.to_string_lossy().into_owned());
        args.extend(self.effect.ffmpeg_args());
        args.push(self.output_path.to_string_lossy().into_owned());
        args
    }
}

/// Computes `<dir>/<stem><suffix>.<ext>` for an input file
pub fn derive_output_path(input_path: &Path, effect: Effect, output_dir: Option<&Path>) -> Result<PathBuf> {
    let stem = input_path
        .file_stem()
        .ok_or_else(|| TransformError::InvalidInput(format!("Invalid file name: {}", input_path.display())))?
        .to_string_lossy();
    let filename = format!("{}{}.{}", stem, effect.suffix(), effect.extension());

    let dir = match output_dir {
        Some(dir) => dir,
        None => input_path.parent().unwrap_or(Path::new("")),
    };
    // a bare name starting with '-' would be read by ffmpeg as an option
    let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };
    Ok(dir.join(filename))
}

/// Outcome of one transcoder run, fixed at process exit
#[derive(Debug, Clone, Serialize)]
pub struct TransformResult {
    pub output_path: PathBuf,
    pub succeeded: bool,
    pub exit_code: i32,
    /// Raw diagnostic output captured from the transcoder
    #[serde(skip)]
    pub diagnostics: String,
}

impl TransformResult {
    pub fn new(output_path: PathBuf, exit_code: i32, diagnostics: String) -> Self {
        Self {
            output_path,
            succeeded: exit_code == 0,
            exit_code,
            diagnostics,
        }
    }

    /// Converts a non-zero exit into `TransformFailed`
    pub fn ensure_success(self) -> Result<Self> {
        if self.succeeded {
            Ok(self)
        } else {
            Err(TransformError::TransformFailed {
                exit_code: self.exit_code,
                output: self.diagnostics,
            })
        }
    }
}
