//! # File Management Module
//!
//! Questo modulo gestisce le operazioni sui file della pipeline.
//!
//! ## Responsabilità:
//! - Creazione delle directory di download e di output
//! - Dimensione dei file e formattazione human-readable
//! - Copia atomica dei file consegnati (file temporaneo + rename)
//! - Rimozione dei sorgenti scaricati dopo la consegna
//!
//! ## Esempio:
//! ```rust,no_run
//! # async fn demo() -> clip_transformer::error::Result<()> {
//! use clip_transformer::file_manager::FileManager;
//! use std::path::Path;
//!
//! FileManager::ensure_dir(Path::new("downloads")).await?;
//! let size = FileManager::file_size(Path::new("downloads/clip.mp4")).await?;
//! println!("{}", FileManager::format_size(size));
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::debug;

/// Manages file operations
pub struct FileManager;

impl FileManager {
    /// Create a directory (and parents) if missing
    pub async fn ensure_dir(dir: &Path) -> Result<()> {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).await?;
        }
        Ok(())
    }

    /// Size of a file in bytes
    pub async fn file_size(path: &Path) -> Result<u64> {
        Ok(fs::metadata(path).await?.len())
    }

    /// Copy `source` into `dir` keeping its file name.
    ///
    /// The copy goes to a temporary file in `dir` first and is renamed into
    /// place, so a reader never sees a half-written file.
    pub async fn copy_into(source: &Path, dir: &Path) -> Result<PathBuf> {
        let file_name = source.file_name().ok_or_else(|| {
            crate::error::TransformError::InvalidInput(format!("Invalid file name: {}", source.display()))
        })?;
        let target = dir.join(file_name);
        Self::ensure_dir(dir).await?;

        let (from, into, persisted) = (source.to_path_buf(), dir.to_path_buf(), target.clone());
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut temp = NamedTempFile::new_in(&into)?;
            let mut reader = std::fs::File::open(&from)?;
            std::io::copy(&mut reader, temp.as_file_mut())?;
            temp.as_file().sync_all()?;
            temp.persist(&persisted).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))??;

        debug!("Copied {} -> {}", source.display(), target.display());
        Ok(target)
    }

    /// Remove a file, ignoring a file that is already gone
    pub async fn remove_if_exists(path: &Path) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }
}
