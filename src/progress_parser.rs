//! # Progress Parser Module
//!
//! Turns ffmpeg's free-form diagnostic stream into a bounded completion percentage.
//!
//! ## Responsabilità:
//! - Riconosce le righe con la durata totale (`Duration: H:MM:SS.ff`)
//! - Riconosce le righe con la posizione corrente (`time=H:MM:SS.ff`)
//! - Calcola la percentuale `floor(100 * current / total)` limitata a [0, 100]
//! - Gestisce la macchina a stati `NotStarted → Running → Completed | Failed | Cancelled | TimedOut`
//!
//! Il formato dello stream non è un contratto stabile: ogni riga che non
//! corrisponde ai pattern viene saltata silenziosamente, mai propagata come errore.
//!
//! ## Esempio:
//! ```rust
//! use clip_transformer::progress_parser::ProgressParser;
//!
//! let mut parser = ProgressParser::new();
//! parser.start();
//! parser.feed_line("  Duration: 00:00:10.00, start: 0.000000, bitrate: 1205 kb/s");
//! let state = parser.feed_line("frame=  60 fps=0.0 q=28.0 size=256kB time=00:00:02.50 bitrate=838.9kbits/s").unwrap();
//! assert_eq!(state.percent, Some(25));
//! ```

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use tracing::trace;

fn duration_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"Duration:\s*(?P<ts>\d+:\d{2}:\d{2}(?:\.\d+)?)").expect("valid duration regex")
    })
}

fn position_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"time=\s*(?P<ts>\d+:\d{2}:\d{2}(?:\.\d+)?)").expect("valid position regex")
    })
}

/// Parses an `H:MM:SS[.frac]` timestamp into seconds.
///
/// `"00:02:30.50"` → `150.5`. Returns `None` for anything else, including
/// minutes or seconds out of range.
pub fn parse_timestamp(ts: &str) -> Option<f64> {
    let mut parts = ts.trim().split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || minutes >= 60 || !(0.0..60.0).contains(&seconds) {
        return None;
    }
    Some(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds)
}

/// What a single diagnostic line tells us
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiagnosticLine {
    /// Total duration of the input, in seconds
    Duration(f64),
    /// Current output position, in seconds
    Position(f64),
    /// Anything else, including garbled markers
    Other,
}

impl DiagnosticLine {
    pub fn classify(line: &str) -> Self {
        if let Some(secs) = Self::capture(duration_pattern(), line) {
            return DiagnosticLine::Duration(secs);
        }
        if let Some(secs) = Self::capture(position_pattern(), line) {
            return DiagnosticLine::Position(secs);
        }
        DiagnosticLine::Other
    }

    fn capture(re: &Regex, line: &str) -> Option<f64> {
        re.captures(line).and_then(|caps| parse_timestamp(&caps["ts"]))
    }
}

/// Lifecycle of one transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum TransformPhase {
    #[default]
    NotStarted,
    Running,
    Completed,
    Failed { exit_code: i32 },
    Cancelled,
    TimedOut,
}

impl TransformPhase {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransformPhase::NotStarted | TransformPhase::Running)
    }
}

/// Completion estimate for one transform
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ProgressState {
    /// `None` until a duration line has been seen
    pub total_duration_seconds: Option<f64>,
    pub current_seconds: f64,
    /// `None` means indeterminate: render a spinner, not a bar
    pub percent: Option<u8>,
}

impl ProgressState {
    fn with_position(&self, current_seconds: f64) -> Self {
        let percent = self
            .total_duration_seconds
            .and_then(|total| percent_of(current_seconds, total))
            // never step backwards
            .map(|p| p.max(self.percent.unwrap_or(0)));
        Self {
            total_duration_seconds: self.total_duration_seconds,
            current_seconds,
            percent,
        }
    }
}

/// `floor(100 * current / total)` clamped to [0, 100]; `None` when total is unusable
pub fn percent_of(current: f64, total: f64) -> Option<u8> {
    if !total.is_finite() || total <= 0.0 || !current.is_finite() {
        return None;
    }
    let pct = (100.0 * current / total).floor().clamp(0.0, 100.0);
    Some(pct as u8)
}

/// Value published on the progress channel
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ProgressSnapshot {
    #[serde(flatten)]
    pub phase: TransformPhase,
    pub state: ProgressState,
}

/// Single-writer parser for one transcoder run
#[derive(Debug, Default)]
pub struct ProgressParser {
    phase: TransformPhase,
    state: ProgressState,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> TransformPhase {
        self.phase
    }

    pub fn state(&self) -> ProgressState {
        self.state
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            phase: self.phase,
            state: self.state,
        }
    }

    /// `NotStarted → Running`; no-op in any other phase
    pub fn start(&mut self) -> ProgressSnapshot {
        if self.phase == TransformPhase::NotStarted {
            self.phase = TransformPhase::Running;
        }
        self.snapshot()
    }

    /// Consumes one diagnostic line.
    ///
    /// Returns the new state when the line moved the current position.
    /// Duration lines only prime the total and emit nothing.
    pub fn feed_line(&mut self, line: &str) -> Option<ProgressState> {
        if self.phase != TransformPhase::Running {
            return None;
        }
        match DiagnosticLine::classify(line) {
            DiagnosticLine::Duration(total) => {
                // the first one belongs to the input; later ones are extra streams
                if self.state.total_duration_seconds.is_none() && total > 0.0 {
                    self.state.total_duration_seconds = Some(total);
                }
                None
            }
            DiagnosticLine::Position(current) => {
                self.state = self.state.with_position(current);
                Some(self.state)
            }
            DiagnosticLine::Other => {
                trace!(line, "skipping diagnostic line");
                None
            }
        }
    }

    /// Records the process exit. Exit code 0 forces the percent to 100.
    pub fn finish(&mut self, exit_code: i32) -> ProgressSnapshot {
        if self.phase.is_terminal() {
            return self.snapshot();
        }
        if exit_code == 0 {
            self.phase = TransformPhase::Completed;
            self.state.percent = Some(100);
            if let Some(total) = self.state.total_duration_seconds {
                self.state.current_seconds = self.state.current_seconds.max(total);
            }
        } else {
            self.phase = TransformPhase::Failed { exit_code };
        }
        self.snapshot()
    }

    pub fn cancel(&mut self) -> ProgressSnapshot {
        self.terminate(TransformPhase::Cancelled)
    }

    pub fn time_out(&mut self) -> ProgressSnapshot {
        self.terminate(TransformPhase::TimedOut)
    }

    fn terminate(&mut self, phase: TransformPhase) -> ProgressSnapshot {
        if !self.phase.is_terminal() {
            self.phase = phase;
        }
        self.snapshot()
    }
}
