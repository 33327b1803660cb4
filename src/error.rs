//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore della pipeline fetch → transform → deliver.
//!
//! ## Responsabilità:
//! - Definisce `TransformError` enum per categorizzare tutti gli errori fatali
//! - Conserva il contesto utile all'utente (exit code, output diagnostico catturato)
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - `InvalidInput`: File di input mancante o vuoto, path di output in conflitto
//! - `ExecutionError`: Tool esterno non avviabile (non installato / non nel PATH)
//! - `TransformFailed`: Il transcoder è terminato con exit code diverso da zero
//! - `Cancelled` / `TimedOut`: Trasformazione interrotta
//! - `LiveStream`: Il retriever ha restituito una diretta, non trasformabile
//! - `Retrieval`: Errore del tool di estrazione video
//! - `NotDeliverable`: Tentativo di consegnare un risultato fallito
//!
//! Le righe diagnostiche non riconosciute NON sono errori: il parser le salta.
//!
//! ## Esempio:
//! ```rust
//! # use clip_transformer::TransformError;
//! # fn check(path: &std::path::Path, size: u64) -> Result<(), TransformError> {
//! if size == 0 {
//!     return Err(TransformError::InvalidInput(format!("{} is empty", path.display())));
//! }
//! # Ok(())
//! # }
//! # assert!(check(std::path::Path::new("clip.mp4"), 0).is_err());
//! ```

/// Errors surfaced by the transform pipeline
#[derive(thiserror::Error, Debug)]
pub enum TransformError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to launch {program}: {source}")]
    ExecutionError {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Transcoder exited with code {exit_code}")]
    TransformFailed { exit_code: i32, output: String },

    #[error("Transform cancelled")]
    Cancelled,

    #[error("Transcoder produced no output for {idle_secs}s")]
    TimedOut { idle_secs: u64 },

    #[error("Refusing to process a live stream: {0}")]
    LiveStream(String),

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Result of a failed transform (exit code {exit_code}) cannot be delivered")]
    NotDeliverable { exit_code: i32 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TransformError>;

impl TransformError {
    /// Exit code of the transcoder, when the error came from one
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::TransformFailed { exit_code, .. } | Self::NotDeliverable { exit_code } => Some(*exit_code),
            _ => None,
        }
    }

    /// Captured diagnostic output, if any
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::TransformFailed { output, .. } => Some(output),
            _ => None,
        }
    }
}
