//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri della pipeline
//! - Fornisce validazione dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `ffmpeg_path` / `ytdlp_path`: path espliciti dei tool esterni (default: ricerca nel PATH)
//! - `download_dir`: directory dei download (default: `downloads`)
//! - `output_dir`: directory di consegna (default: None = accanto al file scaricato)
//! - `format`: selettore formato yt-dlp (default: `bestvideo+bestaudio/best`)
//! - `idle_timeout_secs`: abort se ffmpeg non scrive nulla per N secondi (default: None)
//! - `keep_source`: conserva il file scaricato dopo la consegna (default: true)
//! - `json_output`: emette eventi JSON su stdout (default: false)
//!
//! ## Esempio:
//! ```rust
//! use clip_transformer::Config;
//!
//! let config = Config {
//!     idle_timeout_secs: Some(60),
//!     ..Default::default()
//! };
//! config.validate().unwrap();
//! ```

use crate::error::{Result, TransformError};
use crate::retriever::DEFAULT_FORMAT;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the fetch → transform → deliver pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Explicit ffmpeg executable
    pub ffmpeg_path: Option<PathBuf>,
    /// Explicit yt-dlp executable
    pub ytdlp_path: Option<PathBuf>,
    /// Where fetched media is stored
    pub download_dir: PathBuf,
    /// Where transformed files are delivered (None = next to the source)
    pub output_dir: Option<PathBuf>,
    /// yt-dlp format selector
    pub format: String,
    /// Abort a transform after this many seconds without diagnostic output
    pub idle_timeout_secs: Option<u64>,
    /// Keep the fetched source after delivery
    pub keep_source: bool,
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ytdlp_path: None,
            download_dir: PathBuf::from("downloads"),
            output_dir: None,
            format: DEFAULT_FORMAT.to_string(),
            idle_timeout_secs: None,
            keep_source: true,
            json_output: false,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.format.trim().is_empty() {
            return Err(TransformError::Config("Format selector must not be empty".to_string()));
        }

        if self.idle_timeout_secs == Some(0) {
            return Err(TransformError::Config("Idle timeout must be greater than 0".to_string()));
        }

        if self.download_dir.as_os_str().is_empty() {
            return Err(TransformError::Config("Download directory must not be empty".to_string()));
        }

        if let Some(ref output_dir) = self.output_dir {
            if output_dir.exists() && !output_dir.is_dir() {
                return Err(TransformError::Config(format!(
                    "Output path is not a directory: {}",
                    output_dir.display()
                )));
            }
        }

        for tool in [&self.ffmpeg_path, &self.ytdlp_path].into_iter().flatten() {
            if !tool.is_file() {
                return Err(TransformError::Config(format!("Tool not found: {}", tool.display())));
            }
        }

        Ok(())
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }

    /// `<config dir>/clip-transform/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("clip-transform").join("config.json"))
    }

    /// Load configuration from file; a missing file yields the defaults
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            crate::file_manager::FileManager::ensure_dir(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.idle_timeout_secs = Some(0);
        assert!(config.validate().is_err());

        config.idle_timeout_secs = Some(30);
        config.format = "  ".to_string();
        assert!(config.validate().is_err());

        config.format = DEFAULT_FORMAT.to_string();
        config.ffmpeg_path = Some(PathBuf::from("/nonexistent/ffmpeg"));
        assert!(matches!(config.validate(), Err(TransformError::Config(_))));
    }

    #[test]
    fn test_output_dir_must_be_directory() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("not_a_dir");
        std::fs::write(&file, b"x").unwrap();

        let config = Config {
            output_dir: Some(file),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.download_dir, PathBuf::from("downloads"));
        assert_eq!(config.format, "bestvideo+bestaudio/best");
        assert!(config.keep_source);
        assert!(!config.json_output);
        assert_eq!(config.idle_timeout(), None);
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.json");

        let original_config = Config {
            download_dir: PathBuf::from("/tmp/clips"),
            output_dir: Some(temp_dir.path().to_path_buf()),
            format: "best[height<=720]".to_string(),
            idle_timeout_secs: Some(45),
            keep_source: false,
            ..Default::default()
        };

        original_config.save_to_file(&config_path).await.unwrap();
        let loaded_config = Config::from_file(&config_path).await.unwrap();

        assert_eq!(loaded_config, original_config);
        assert_eq!(loaded_config.idle_timeout(), Some(Duration::from_secs(45)));
    }

    #[tokio::test]
    async fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        std::fs::write(&config_path, r#"{ "json_output": true }"#).unwrap();

        let loaded = Config::from_file(&config_path).await.unwrap();
        assert!(loaded.json_output);
        assert_eq!(loaded.format, DEFAULT_FORMAT);
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let loaded = Config::from_file(&temp_dir.path().join("absent.json")).await.unwrap();
        assert_eq!(loaded, Config::default());
    }
}
