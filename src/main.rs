//! # Clip Transformer - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Merge tra file di configurazione e flag CLI
//! - Avvio della pipeline e gestione di Ctrl-C (cancellazione)
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (sorgente, effetto, directory, timeout, etc.)
//! 2. Configura il logging (INFO o DEBUG a seconda del flag verbose)
//! 3. Carica e valida la configurazione
//! 4. Risolve ffmpeg e yt-dlp
//! 5. Esegue fetch → transform → deliver mostrando il progresso
//!
//! ## Esempio di utilizzo:
//! ```bash
//! clip-transform "https://www.youtube.com/watch?v=abc" --effect grayscale --output ./out --verbose
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use clip_transformer::file_manager::FileManager;
use clip_transformer::json_output::JsonMessage;
use clip_transformer::progress::{ProgressRenderer, RenderMode};
use clip_transformer::progress_parser::ProgressSnapshot;
use clip_transformer::tool_resolver::ToolResolver;
use clip_transformer::transform::TranscoderCommand;
use clip_transformer::utils::tail_lines;
use clip_transformer::{Config, Effect, MediaSource, TransformPipeline, YtDlpRetriever};

#[derive(Parser)]
#[command(name = "clip-transform")]
#[command(about = "Fetch a video link, transform it with ffmpeg and deliver the result")]
struct Args {
    /// Video link (http/https) or local media file
    #[arg(required_unless_present = "check_tools")]
    source: Option<String>,

    /// Effect to apply
    #[arg(short, long, value_enum, default_value_t = Effect::Mirror)]
    effect: Effect,

    /// Output directory for transformed files (default: next to the source)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for downloaded media
    #[arg(long)]
    download_dir: Option<PathBuf>,

    /// yt-dlp format selector
    #[arg(long)]
    format: Option<String>,

    /// Abort when ffmpeg prints nothing for this many seconds
    #[arg(long)]
    idle_timeout: Option<u64>,

    /// Delete the downloaded source after delivery
    #[arg(long)]
    discard_source: bool,

    /// Output progress and status as JSON lines
    #[arg(long)]
    json: bool,

    /// Configuration file (default: user config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective configuration back to the config file
    #[arg(long)]
    save_config: bool,

    /// Report which external tools are available and exit
    #[arg(long)]
    check_tools: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply_to(&self, config: &mut Config) {
        if let Some(ref dir) = self.output {
            config.output_dir = Some(dir.clone());
        }
        if let Some(ref dir) = self.download_dir {
            config.download_dir = dir.clone();
        }
        if let Some(ref format) = self.format {
            config.format = format.clone();
        }
        if self.idle_timeout.is_some() {
            config.idle_timeout_secs = self.idle_timeout;
        }
        if self.discard_source {
            config.keep_source = false;
        }
        if self.json {
            config.json_output = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; stdout is reserved for results and JSON
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = args.config.clone().or_else(Config::default_path);
    let mut config = match config_path {
        Some(ref path) => Config::from_file(path).await?,
        None => Config::default(),
    };
    args.apply_to(&mut config);
    config.validate()?;

    let resolver = ToolResolver::new();
    if args.check_tools {
        print!("{}", resolver.tools_report(config.ffmpeg_path.as_deref(), config.ytdlp_path.as_deref()));
        return Ok(());
    }

    if args.save_config {
        if let Some(ref path) = config_path {
            config.save_to_file(path).await?;
            info!("Saved configuration to {}", path.display());
        } else {
            warn!("No configuration directory available, not saving");
        }
    }

    if let Some(ref dir) = config.output_dir {
        FileManager::ensure_dir(dir).await?;
    }

    let Some(source) = args.source.as_deref() else {
        return Ok(());
    };
    let source = MediaSource::parse(source);

    let ffmpeg_found = resolver.resolve("ffmpeg", config.ffmpeg_path.as_deref());
    let ffmpeg = ffmpeg_found.clone().unwrap_or_else(|| {
        warn!("Tool not found: ffmpeg");
        PathBuf::from("ffmpeg")
    });
    let mut retriever = match source {
        MediaSource::Url(_) => YtDlpRetriever::new(resolver.resolve_or_bare("yt-dlp", config.ytdlp_path.as_deref())),
        MediaSource::LocalFile(_) => YtDlpRetriever::new("yt-dlp"),
    };
    if let Some(location) = ffmpeg_found {
        retriever = retriever.with_ffmpeg_location(location);
    }
    let json_output = config.json_output;

    if json_output {
        JsonMessage::Start {
            source: args.source.clone().unwrap_or_default(),
            effect: args.effect,
        }
        .emit();
    }

    let pipeline = TransformPipeline::new(config, retriever, TranscoderCommand::new(ffmpeg));

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping...");
            on_signal.cancel();
        }
    });

    let (tx, rx) = watch::channel(ProgressSnapshot::default());
    let mode = if json_output { RenderMode::Json } else { RenderMode::Bar };
    let renderer = ProgressRenderer::new(mode, &args.effect.to_string()).spawn(rx);

    let outcome = pipeline.run(&source, args.effect, &tx, cancel).await;
    drop(tx);
    let _ = renderer.await;

    match outcome {
        Ok(report) => {
            if json_output {
                JsonMessage::complete(&report.delivered, report.elapsed.as_secs_f64()).emit();
            } else {
                eprintln!(
                    "✅ \"{}\" ready in {:.1}s ({})",
                    report.title,
                    report.elapsed.as_secs_f64(),
                    FileManager::format_size(report.delivered.size_bytes)
                );
                println!("{}", report.delivered.path.display());
            }
            Ok(())
        }
        Err(e) => {
            if json_output {
                JsonMessage::error(&e).emit();
            } else if let Some(diagnostics) = e.diagnostics() {
                eprintln!("{}", tail_lines(diagnostics, 20));
            }
            Err(e.into())
        }
    }
}
