//! # Transform Module
//!
//! Separa le responsabilità in sottomoduli:
//! - `request`: descrizione input/output di una trasformazione e risultato
//! - `invoker`: ciclo di vita del processo ffmpeg e lettura dello stream diagnostico

pub mod invoker;
pub mod request;

pub use invoker::{DiagnosticLines, TranscoderCommand, TransformInvoker};
pub use request::{derive_output_path, TransformRequest, TransformResult};
