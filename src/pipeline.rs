//! # Pipeline Orchestrator
//!
//! Orchestratore principale che delega ai moduli specializzati:
//! retriever → transform invoker → delivery.
//!
//! Qualsiasi errore fatale interrompe la pipeline prima della consegna:
//! nessun file parziale viene mai offerto all'utente.

use crate::config::Config;
use crate::delivery::{DeliveredFile, Delivery};
use crate::effect::Effect;
use crate::error::{Result, TransformError};
use crate::file_manager::FileManager;
use crate::json_output::JsonMessage;
use crate::progress_parser::ProgressSnapshot;
use crate::retriever::{FetchOptions, MediaSource, Retriever};
use crate::transform::{TranscoderCommand, TransformInvoker, TransformRequest};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Summary of one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub title: String,
    pub source_path: PathBuf,
    pub delivered: DeliveredFile,
    pub elapsed: Duration,
}

/// Fetch, transform and deliver a single source
pub struct TransformPipeline<R> {
    config: Config,
    retriever: R,
    invoker: TransformInvoker,
    delivery: Delivery,
}

impl<R: Retriever> TransformPipeline<R> {
    pub fn new(config: Config, retriever: R, transcoder: TranscoderCommand) -> Self {
        let mut invoker = TransformInvoker::new(transcoder);
        if let Some(idle) = config.idle_timeout() {
            invoker = invoker.with_idle_timeout(idle);
        }
        let delivery = Delivery::new(config.output_dir.clone());
        Self {
            config,
            retriever,
            invoker,
            delivery,
        }
    }

    fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            download_dir: self.config.download_dir.clone(),
            format: self.config.format.clone(),
            no_playlist: true,
        }
    }

    /// Runs the whole pipeline, publishing transform progress on `progress`
    pub async fn run(
        &self,
        source: &MediaSource,
        effect: Effect,
        progress: &watch::Sender<ProgressSnapshot>,
        cancel: CancellationToken,
    ) -> Result<PipelineReport> {
        let started = Instant::now();

        let (title, source_path, fetched) = match source {
            MediaSource::Url(url) => {
                let options = self.fetch_options();
                let media = tokio::select! {
                    media = self.retriever.fetch(url, &options) => media?,
                    _ = cancel.cancelled() => return Err(TransformError::Cancelled),
                };
                if media.is_live {
                    return Err(TransformError::LiveStream(media.title));
                }
                info!("Fetched \"{}\" -> {}", media.title, media.local_path.display());
                if self.config.json_output {
                    JsonMessage::Fetched {
                        title: media.title.clone(),
                        path: media.local_path.clone(),
                        duration_seconds: media.duration_seconds,
                    }
                    .emit();
                }
                (media.title, media.local_path, true)
            }
            MediaSource::LocalFile(path) => {
                let title = path.file_stem().unwrap_or_default().to_string_lossy().into_owned();
                (title, path.clone(), false)
            }
        };

        let request = TransformRequest::for_input(&source_path, effect, None)?;
        let result = self.invoker.transform(&request, progress, cancel).await?;
        let delivered = self.delivery.deliver(&result).await?;

        if delivered.path != result.output_path {
            // delivered as a copy, drop the working file
            FileManager::remove_if_exists(&result.output_path).await?;
        }
        if fetched && !self.config.keep_source {
            if let Err(e) = FileManager::remove_if_exists(&source_path).await {
                warn!("Could not remove downloaded source {}: {}", source_path.display(), e);
            }
        }

        Ok(PipelineReport {
            title,
            source_path,
            delivered,
            elapsed: started.elapsed(),
        })
    }
}
