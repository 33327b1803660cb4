//! # Transform Invoker Module
//!
//! Runs one ffmpeg process per request and follows its diagnostic stream.
//!
//! ## Pipeline di esecuzione:
//! 1. Valida l'input prima di avviare qualsiasi processo (fail fast)
//! 2. Avvia ffmpeg con stderr in pipe (`-y`: sovrascrive sempre l'output)
//! 3. Legge stderr riga per riga mentre il processo è in esecuzione,
//!    spezzando anche su `\r` perché ffmpeg riscrive la riga delle statistiche
//! 4. Pubblica ogni `ProgressSnapshot` sul canale `watch`
//! 5. Alla terminazione produce un `TransformResult`
//!
//! Cancellazione e idle timeout terminano il processo figlio e rimuovono
//! l'output parziale. Nessun retry automatico.

use crate::error::{Result, TransformError};
use crate::progress_parser::{ProgressParser, ProgressSnapshot};
use crate::transform::request::{TransformRequest, TransformResult};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Executable plus any arguments that precede the ffmpeg arguments
#[derive(Debug, Clone)]
pub struct TranscoderCommand {
    program: PathBuf,
    leading_args: Vec<String>,
}

impl TranscoderCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Runs the transcoder through a wrapper, e.g. `nice -n 10 ffmpeg`
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

/// Owns the lifecycle of transcoder processes
#[derive(Debug, Clone)]
pub struct TransformInvoker {
    command: TranscoderCommand,
    idle_timeout: Option<Duration>,
}

enum StreamEnd {
    Eof,
    Cancelled,
    TimedOut(Duration),
}

impl TransformInvoker {
    pub fn new(command: TranscoderCommand) -> Self {
        Self {
            command,
            idle_timeout: None,
        }
    }

    /// Abort when the transcoder stays silent for longer than `timeout`
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Runs the request and turns a non-zero exit into `TransformFailed`
    pub async fn transform(
        &self,
        request: &TransformRequest,
        progress: &watch::Sender<ProgressSnapshot>,
        cancel: CancellationToken,
    ) -> Result<TransformResult> {
        self.run(request, progress, cancel).await?.ensure_success()
    }

    /// Runs the request once and reports how the process exited.
    ///
    /// A non-zero exit is an `Ok` result with `succeeded == false`; launch
    /// failures, invalid input, cancellation and idle timeouts are errors.
    pub async fn run(
        &self,
        request: &TransformRequest,
        progress: &watch::Sender<ProgressSnapshot>,
        cancel: CancellationToken,
    ) -> Result<TransformResult> {
        validate_input(request).await?;

        if let Some(parent) = request.output_path().parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let program = self.command.program.display().to_string();
        let mut cmd = Command::new(&self.command.program);
        cmd.args(&self.command.leading_args)
            .args(request.ffmpeg_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(
            "🎬 Starting {} on {} -> {}",
            request.effect(),
            request.input_path().display(),
            request.output_path().display()
        );
        let started = Instant::now();

        let mut child = cmd.spawn().map_err(|source| TransformError::ExecutionError {
            program: program.clone(),
            source,
        })?;
        let stderr = child.stderr.take().ok_or_else(|| TransformError::ExecutionError {
            program: program.clone(),
            source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stderr was not captured"),
        })?;

        let mut parser = ProgressParser::new();
        progress.send_replace(parser.start());

        let mut diagnostics = String::new();
        let end = self
            .follow_diagnostics(stderr, &mut parser, &mut diagnostics, progress, &cancel)
            .await;

        match end {
            StreamEnd::Eof => {}
            StreamEnd::Cancelled => {
                warn!("Cancelling transform of {}", request.input_path().display());
                kill_quietly(&mut child).await;
                progress.send_replace(parser.cancel());
                remove_partial(request.output_path()).await;
                return Err(TransformError::Cancelled);
            }
            StreamEnd::TimedOut(idle) => {
                warn!("Transcoder silent for {:?}, terminating", idle);
                kill_quietly(&mut child).await;
                progress.send_replace(parser.time_out());
                remove_partial(request.output_path()).await;
                return Err(TransformError::TimedOut { idle_secs: idle.as_secs() });
            }
        }

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = cancel.cancelled() => {
                kill_quietly(&mut child).await;
                progress.send_replace(parser.cancel());
                remove_partial(request.output_path()).await;
                return Err(TransformError::Cancelled);
            }
        };
        // killed by a signal: no code
        let exit_code = status.code().unwrap_or(-1);
        progress.send_replace(parser.finish(exit_code));

        let elapsed = started.elapsed();
        if exit_code == 0 {
            info!("✅ Transform completed in {:.1}s", elapsed.as_secs_f64());
        } else {
            warn!("❌ Transcoder failed with exit code {} after {:.1}s", exit_code, elapsed.as_secs_f64());
            remove_partial(request.output_path()).await;
        }

        Ok(TransformResult::new(request.output_path().to_path_buf(), exit_code, diagnostics))
    }

    async fn follow_diagnostics<R>(
        &self,
        stream: R,
        parser: &mut ProgressParser,
        diagnostics: &mut String,
        progress: &watch::Sender<ProgressSnapshot>,
        cancel: &CancellationToken,
    ) -> StreamEnd
    where
        R: AsyncRead + Unpin,
    {
        let mut lines = DiagnosticLines::new(stream);
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return StreamEnd::Cancelled,
                next = next_with_timeout(&mut lines, self.idle_timeout) => next,
            };
            let line = match next {
                Ok(Ok(Some(line))) => line,
                Ok(Ok(None)) => return StreamEnd::Eof,
                Ok(Err(e)) => {
                    // the process is still reaped by the caller
                    warn!("Error reading transcoder output: {}", e);
                    return StreamEnd::Eof;
                }
                Err(idle) => return StreamEnd::TimedOut(idle),
            };

            diagnostics.push_str(&line);
            diagnostics.push('\n');
            if let Some(state) = parser.feed_line(&line) {
                debug!(percent = ?state.percent, current = state.current_seconds, "progress");
                progress.send_replace(parser.snapshot());
            }
        }
    }
}

async fn next_with_timeout<R>(
    lines: &mut DiagnosticLines<R>,
    idle_timeout: Option<Duration>,
) -> std::result::Result<std::io::Result<Option<String>>, Duration>
where
    R: AsyncRead + Unpin,
{
    match idle_timeout {
        Some(idle) => tokio::time::timeout(idle, lines.next_line()).await.map_err(|_| idle),
        None => Ok(lines.next_line().await),
    }
}

async fn validate_input(request: &TransformRequest) -> Result<()> {
    let input = request.input_path();
    let metadata = tokio::fs::metadata(input)
        .await
        .map_err(|e| TransformError::InvalidInput(format!("{}: {}", input.display(), e)))?;
    if !metadata.is_file() {
        return Err(TransformError::InvalidInput(format!("{} is not a file", input.display())));
    }
    if metadata.len() == 0 {
        return Err(TransformError::InvalidInput(format!("{} is empty", input.display())));
    }
    if request.output_path() == input {
        return Err(TransformError::InvalidInput(format!(
            "output path {} would overwrite the input",
            input.display()
        )));
    }
    Ok(())
}

async fn kill_quietly(child: &mut tokio::process::Child) {
    if let Err(e) = child.kill().await {
        debug!("Transcoder already gone: {}", e);
    }
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed partial output {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove partial output {}: {}", path.display(), e),
    }
}

/// Line reader that treats both `\n` and `\r` as terminators
pub struct DiagnosticLines<R> {
    reader: BufReader<R>,
    pending: Vec<u8>,
}

impl<R: AsyncRead + Unpin> DiagnosticLines<R> {
    pub fn new(stream: R) -> Self {
        Self {
            reader: BufReader::new(stream),
            pending: Vec::new(),
        }
    }

    /// Next non-empty line, or `None` at end of stream.
    /// Invalid UTF-8 is replaced rather than rejected.
    pub async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                if self.pending.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(self.take_pending()));
            }

            match buf.iter().position(|b| *b == b'\n' || *b == b'\r') {
                Some(pos) => {
                    self.pending.extend_from_slice(&buf[..pos]);
                    self.reader.consume(pos + 1);
                    if !self.pending.is_empty() {
                        return Ok(Some(self.take_pending()));
                    }
                }
                None => {
                    let len = buf.len();
                    self.pending.extend_from_slice(buf);
                    self.reader.consume(len);
                }
            }
        }
    }

    fn take_pending(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::Effect;
    use crate::progress_parser::TransformPhase;
    use tempfile::TempDir;

    async fn collect_lines(input: &[u8]) -> Vec<String> {
        let mut lines = DiagnosticLines::new(input);
        let mut out = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            out.push(line);
        }
        out
    }

    #[tokio::test]
    async fn test_lines_split_on_carriage_return() {
        let lines = collect_lines(b"Duration: 00:00:10.00\nframe=1 time=00:00:02.50\rframe=2 time=00:00:05.00\r\nend").await;
        assert_eq!(
            lines,
            vec!["Duration: 00:00:10.00", "frame=1 time=00:00:02.50", "frame=2 time=00:00:05.00", "end"]
        );
    }

    #[tokio::test]
    async fn test_lines_tolerate_invalid_utf8() {
        let lines = collect_lines(b"ok\n\xff\xfe time=00:00:01.00\n").await;
        assert_eq!(lines.len(), 2);
        assert!(lines[1].ends_with("time=00:00:01.00"));
    }

    fn write_input(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    /// ffmpeg stand-in: prints `stderr_script` output and writes the last argument
    #[cfg(unix)]
    fn fake_transcoder(body: &str) -> TransformInvoker {
        let script = format!("for last; do :; done\n{body}");
        TransformInvoker::new(
            TranscoderCommand::new("sh").with_leading_args(["-c".to_string(), script, "fake-ffmpeg".to_string()]),
        )
    }

    #[cfg(unix)]
    const TEN_SECOND_RUN: &str = r#"
printf '  Duration: 00:00:10.00, start: 0.000000, bitrate: 1205 kb/s\n' >&2
printf 'frame=  60 time=00:00:02.50 bitrate= 838.9kbits/s\r' >&2
printf 'frame= 120 time=00:00:05.00 bitrate= 838.9kbits/s\r' >&2
printf 'frame= 240 time=00:00:10.00 bitrate= 838.9kbits/s\n' >&2
printf 'transformed' > "$last"
exit 0
"#;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_run_reports_progress() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, "clip.mp4", b"source");
        let request = TransformRequest::for_input(&input, Effect::Mirror, None).unwrap();

        let (tx, mut rx) = watch::channel(ProgressSnapshot::default());
        let observer = tokio::spawn(async move {
            let mut seen = Vec::new();
            while rx.changed().await.is_ok() {
                let snapshot = *rx.borrow_and_update();
                seen.push(snapshot);
            }
            seen
        });

        let invoker = fake_transcoder(TEN_SECOND_RUN);
        let result = invoker
            .transform(&request, &tx, CancellationToken::new())
            .await
            .unwrap();
        drop(tx);

        assert!(result.succeeded);
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.output_path, dir.path().join("clip_mirrored.mp4"));
        assert_eq!(std::fs::read_to_string(&result.output_path).unwrap(), "transformed");
        assert!(result.diagnostics.contains("Duration: 00:00:10.00"));

        let seen = observer.await.unwrap();
        let last = seen.last().unwrap();
        assert_eq!(last.phase, TransformPhase::Completed);
        assert_eq!(last.state.percent, Some(100));
        // the watch channel may coalesce, but percents never go backwards
        let percents: Vec<u8> = seen.iter().filter_map(|s| s.state.percent).collect();
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_rerun_overwrites_existing_output() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, "clip.mp4", b"source");
        let request = TransformRequest::for_input(&input, Effect::Grayscale, None).unwrap();
        std::fs::write(request.output_path(), b"stale output from an earlier run").unwrap();

        let invoker = fake_transcoder(TEN_SECOND_RUN);
        let (tx, _rx) = watch::channel(ProgressSnapshot::default());
        invoker.transform(&request, &tx, CancellationToken::new()).await.unwrap();
        let first = std::fs::read(request.output_path()).unwrap();
        invoker.transform(&request, &tx, CancellationToken::new()).await.unwrap();
        let second = std::fs::read(request.output_path()).unwrap();

        assert_eq!(first, b"transformed");
        assert_eq!(first, second);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_transform_failed() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, "clip.mp4", b"source");
        let request = TransformRequest::for_input(&input, Effect::CopyrightFilter, None).unwrap();

        let invoker = fake_transcoder(
            "printf 'Duration: 00:00:10.00\\n' >&2\n\
             printf 'time=00:00:04.00\\n' >&2\n\
             printf 'partial' > \"$last\"\n\
             printf 'Conversion failed!\\n' >&2\n\
             exit 1",
        );
        let (tx, rx) = watch::channel(ProgressSnapshot::default());

        let result = invoker.run(&request, &tx, CancellationToken::new()).await.unwrap();
        assert!(!result.succeeded);
        assert_eq!(result.exit_code, 1);
        assert!(!request.output_path().exists(), "partial output must be removed");
        assert_eq!(rx.borrow().phase, TransformPhase::Failed { exit_code: 1 });
        assert_eq!(rx.borrow().state.percent, Some(40));

        let err = invoker.transform(&request, &tx, CancellationToken::new()).await.unwrap_err();
        match err {
            TransformError::TransformFailed { exit_code, output } => {
                assert_eq!(exit_code, 1);
                assert!(output.contains("Conversion failed!"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_garbage_output_does_not_break_the_run() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, "clip.mp4", b"source");
        let request = TransformRequest::for_input(&input, Effect::Mirror, None).unwrap();

        let invoker = fake_transcoder(
            "printf 'Duration: 00:00:20.00\\n' >&2\n\
             printf 'time=garbage\\n' >&2\n\
             printf 'time=00:00:05.00\\n' >&2\n\
             printf 'done' > \"$last\"",
        );
        let (tx, rx) = watch::channel(ProgressSnapshot::default());
        let result = invoker.transform(&request, &tx, CancellationToken::new()).await.unwrap();
        assert!(result.succeeded);
        assert_eq!(rx.borrow().state.percent, Some(100));
    }

    #[tokio::test]
    async fn test_missing_input_fails_before_spawn() {
        let dir = TempDir::new().unwrap();
        let request = TransformRequest::for_input(&dir.path().join("nope.mp4"), Effect::Mirror, None).unwrap();
        // a program that cannot exist proves nothing was launched
        let invoker = TransformInvoker::new(TranscoderCommand::new("/nonexistent/ffmpeg"));
        let (tx, rx) = watch::channel(ProgressSnapshot::default());

        let err = invoker.run(&request, &tx, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TransformError::InvalidInput(_)));
        assert_eq!(rx.borrow().phase, TransformPhase::NotStarted);
    }

    #[tokio::test]
    async fn test_empty_input_is_invalid() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, "empty.mp4", b"");
        let request = TransformRequest::for_input(&input, Effect::Mirror, None).unwrap();
        let invoker = TransformInvoker::new(TranscoderCommand::new("/nonexistent/ffmpeg"));
        let (tx, _rx) = watch::channel(ProgressSnapshot::default());

        let err = invoker.run(&request, &tx, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TransformError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_output_equal_to_input_is_invalid() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, "clip.mp4", b"source");
        let request = TransformRequest::new(&input, Effect::Mirror, &input);
        let invoker = TransformInvoker::new(TranscoderCommand::new("/nonexistent/ffmpeg"));
        let (tx, _rx) = watch::channel(ProgressSnapshot::default());

        let err = invoker.run(&request, &tx, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TransformError::InvalidInput(_)));
        assert_eq!(std::fs::read(&input).unwrap(), b"source");
    }

    #[tokio::test]
    async fn test_missing_tool_is_execution_error() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, "clip.mp4", b"source");
        let request = TransformRequest::for_input(&input, Effect::Mirror, None).unwrap();
        let invoker = TransformInvoker::new(TranscoderCommand::new("/nonexistent/ffmpeg"));
        let (tx, _rx) = watch::channel(ProgressSnapshot::default());

        let err = invoker.run(&request, &tx, CancellationToken::new()).await.unwrap_err();
        match err {
            TransformError::ExecutionError { program, .. } => assert_eq!(program, "/nonexistent/ffmpeg"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancellation_kills_the_process() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, "clip.mp4", b"source");
        let request = TransformRequest::for_input(&input, Effect::Mirror, None).unwrap();

        let invoker = fake_transcoder(
            "printf 'Duration: 00:00:10.00\\n' >&2\n\
             printf 'partial' > \"$last\"\n\
             exec sleep 30",
        );
        let (tx, rx) = watch::channel(ProgressSnapshot::default());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = invoker.run(&request, &tx, cancel).await.unwrap_err();
        assert!(matches!(err, TransformError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(rx.borrow().phase, TransformPhase::Cancelled);
        assert!(!request.output_path().exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_idle_timeout() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, "clip.mp4", b"source");
        let request = TransformRequest::for_input(&input, Effect::Mirror, None).unwrap();

        let invoker = fake_transcoder("printf 'Duration: 00:00:10.00\\n' >&2\nexec sleep 30")
            .with_idle_timeout(Duration::from_millis(300));
        let (tx, rx) = watch::channel(ProgressSnapshot::default());

        let err = invoker.run(&request, &tx, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TransformError::TimedOut { .. }));
        assert_eq!(rx.borrow().phase, TransformPhase::TimedOut);
    }
}
