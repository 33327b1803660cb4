//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per uso programmatico.
//!
//! ## Responsabilità:
//! - Emette un messaggio JSON per riga su stdout per ogni evento della pipeline
//! - Fornisce un'interfaccia standardizzata per la comunicazione inter-processo
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio della pipeline (sorgente ed effetto)
//! - `fetched`: Media scaricato dal retriever
//! - `progress`: Snapshot di avanzamento della trasformazione
//! - `complete`: File consegnato
//! - `error`: Errore fatale, con exit code e coda dell'output diagnostico

use crate::delivery::DeliveredFile;
use crate::effect::Effect;
use crate::error::TransformError;
use crate::progress_parser::{ProgressSnapshot, TransformPhase};
use crate::utils::tail_lines;
use serde::Serialize;
use std::path::PathBuf;

/// Diagnostic lines kept in an `error` message
const ERROR_TAIL_LINES: usize = 20;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    /// Inizio della pipeline
    Start { source: String, effect: Effect },

    /// Media recuperato
    Fetched {
        title: String,
        path: PathBuf,
        duration_seconds: Option<f64>,
    },

    /// Progresso corrente
    Progress {
        #[serde(flatten)]
        phase: TransformPhase,
        percent: Option<u8>,
        current_seconds: f64,
        total_duration_seconds: Option<f64>,
    },

    /// Pipeline completata
    Complete {
        path: PathBuf,
        size_bytes: u64,
        duration_seconds: f64,
    },

    /// Errore fatale
    Error {
        message: String,
        exit_code: Option<i32>,
        details: Option<String>,
    },
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn progress(snapshot: &ProgressSnapshot) -> Self {
        Self::Progress {
            phase: snapshot.phase,
            percent: snapshot.state.percent,
            current_seconds: snapshot.state.current_seconds,
            total_duration_seconds: snapshot.state.total_duration_seconds,
        }
    }

    pub fn complete(delivered: &DeliveredFile, duration_seconds: f64) -> Self {
        Self::Complete {
            path: delivered.path.clone(),
            size_bytes: delivered.size_bytes,
            duration_seconds,
        }
    }

    pub fn error(error: &TransformError) -> Self {
        Self::Error {
            message: error.to_string(),
            exit_code: error.exit_code(),
            details: error.diagnostics().map(|text| tail_lines(text, ERROR_TAIL_LINES)),
        }
    }
}
