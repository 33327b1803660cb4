//! # Delivery Module
//!
//! Hands a finished transform over to the user.
//!
//! A failed result is never served: the caller gets `NotDeliverable` with the
//! transcoder's exit code instead of a path to a partial file.

use crate::error::{Result, TransformError};
use crate::file_manager::FileManager;
use crate::transform::TransformResult;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// A file ready for download
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveredFile {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Delivery adapter that publishes results into an optional output directory
#[derive(Debug, Clone, Default)]
pub struct Delivery {
    output_dir: Option<PathBuf>,
}

impl Delivery {
    pub fn new(output_dir: Option<PathBuf>) -> Self {
        Self { output_dir }
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    pub async fn deliver(&self, result: &TransformResult) -> Result<DeliveredFile> {
        if !result.succeeded {
            return Err(TransformError::NotDeliverable { exit_code: result.exit_code });
        }

        let size_bytes = FileManager::file_size(&result.output_path).await.map_err(|e| {
            TransformError::InvalidInput(format!("{} is missing: {}", result.output_path.display(), e))
        })?;
        if size_bytes == 0 {
            return Err(TransformError::InvalidInput(format!(
                "{} is empty",
                result.output_path.display()
            )));
        }

        let path = match &self.output_dir {
            Some(dir) if !same_dir(result.output_path.parent(), dir) => {
                FileManager::copy_into(&result.output_path, dir).await?
            }
            _ => result.output_path.clone(),
        };

        info!("📦 File ready: {} ({})", path.display(), FileManager::format_size(size_bytes));
        Ok(DeliveredFile { path, size_bytes })
    }
}

fn same_dir(parent: Option<&Path>, dir: &Path) -> bool {
    let Some(parent) = parent else {
        return false;
    };
    match (parent.canonicalize(), dir.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => parent == dir,
    }
}
