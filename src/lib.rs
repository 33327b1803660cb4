//! # Clip Transformer Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore della pipeline
//! - `effect`: Effetti disponibili e relativi argomenti ffmpeg
//! - `retriever`: Download dei media tramite yt-dlp
//! - `transform`: Richieste di trasformazione e invocazione di ffmpeg
//! - `progress_parser`: Parsing dello stream diagnostico in percentuale
//! - `progress`: Rendering del progresso (barra, spinner, JSON)
//! - `delivery`: Consegna del file trasformato
//! - `pipeline`: Orchestratore fetch → transform → deliver
//!
//! ## Utilizzo:
//! ```rust,no_run
//! # async fn demo() -> clip_transformer::error::Result<()> {
//! use clip_transformer::{Config, Effect, MediaSource, TransformPipeline, YtDlpRetriever};
//! use clip_transformer::progress_parser::ProgressSnapshot;
//! use clip_transformer::transform::TranscoderCommand;
//! use tokio_util::sync::CancellationToken;
//!
//! let pipeline = TransformPipeline::new(
//!     Config::default(),
//!     YtDlpRetriever::new("yt-dlp"),
//!     TranscoderCommand::new("ffmpeg"),
//! );
//! let (tx, _rx) = tokio::sync::watch::channel(ProgressSnapshot::default());
//! let source = MediaSource::parse("https://example.com/watch?v=abc");
//! let report = pipeline.run(&source, Effect::Mirror, &tx, CancellationToken::new()).await?;
//! println!("{}", report.delivered.path.display());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod delivery;
pub mod effect;
pub mod error;
pub mod file_manager;
pub mod json_output;
pub mod pipeline;
pub mod progress;
pub mod progress_parser;
pub mod retriever;
pub mod tool_resolver;
pub mod transform;
pub mod utils;

pub use config::Config;
pub use effect::Effect;
pub use error::TransformError;
pub use pipeline::{PipelineReport, TransformPipeline};
pub use retriever::{MediaSource, YtDlpRetriever};
