//! # Progress Rendering Module
//!
//! Questo modulo gestisce la visualizzazione del progresso della trasformazione.
//!
//! ## Responsabilità:
//! - Sottoscrive il canale `watch` su cui l'invoker pubblica gli snapshot
//! - Progress bar con `indicatif` quando la percentuale è nota
//! - Spinner per avanzamento indeterminato (durata totale sconosciuta)
//! - Messaggi JSON su stdout in modalità `--json`
//!
//! Lo stato è pubblicato come valore intero (replace atomico): il renderer
//! legge solo l'ultimo snapshot e può perdere quelli intermedi.
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:12] [========================>---------------] 61% 00:01:13 / 00:02:00
//! ```

use crate::json_output::JsonMessage;
use crate::progress_parser::{ProgressSnapshot, TransformPhase};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// How snapshots are shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Bar,
    Json,
    Hidden,
}

/// Consumer side of the progress channel
pub struct ProgressRenderer {
    mode: RenderMode,
    bar: ProgressBar,
    determinate: bool,
}

impl ProgressRenderer {
    pub fn new(mode: RenderMode, label: &str) -> Self {
        let bar = match mode {
            RenderMode::Bar => Self::spinner(label),
            _ => ProgressBar::hidden(),
        };
        Self {
            mode,
            bar,
            determinate: false,
        }
    }

    /// Renders every snapshot until the sender is dropped or a terminal phase arrives
    pub fn spawn(mut self, mut rx: watch::Receiver<ProgressSnapshot>) -> JoinHandle<Option<ProgressSnapshot>> {
        tokio::spawn(async move {
            let mut last = None;
            while rx.changed().await.is_ok() {
                let snapshot = *rx.borrow_and_update();
                self.render(&snapshot);
                last = Some(snapshot);
                if snapshot.phase.is_terminal() {
                    break;
                }
            }
            last
        })
    }

    pub fn render(&mut self, snapshot: &ProgressSnapshot) {
        match self.mode {
            RenderMode::Hidden => {}
            RenderMode::Json => JsonMessage::progress(snapshot).emit(),
            RenderMode::Bar => self.render_bar(snapshot),
        }
    }

    fn render_bar(&mut self, snapshot: &ProgressSnapshot) {
        let state = &snapshot.state;
        if let Some(percent) = state.percent {
            if !self.determinate {
                self.switch_to_bar();
            }
            self.bar.set_position(percent as u64);
        }

        let position = match state.total_duration_seconds {
            Some(total) => format!("{} / {}", format_clock(state.current_seconds), format_clock(total)),
            None => format_clock(state.current_seconds),
        };

        match snapshot.phase {
            TransformPhase::NotStarted => {}
            TransformPhase::Running => self.bar.set_message(position),
            TransformPhase::Completed => self.bar.finish_with_message("✅ done"),
            TransformPhase::Failed { exit_code } => {
                self.bar.abandon_with_message(format!("❌ failed (exit code {})", exit_code))
            }
            TransformPhase::Cancelled => self.bar.abandon_with_message("⏹ cancelled"),
            TransformPhase::TimedOut => self.bar.abandon_with_message("⌛ timed out"),
        }
    }

    fn switch_to_bar(&mut self) {
        self.determinate = true;
        self.bar.set_length(100);
        self.bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
    }

    /// Create a spinner for indeterminate progress
    fn spinner(message: &str) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();

        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {prefix} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );

        spinner.set_prefix(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));

        spinner
    }
}

/// `HH:MM:SS` for a position in seconds
pub fn format_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 { seconds as u64 } else { 0 };
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}
