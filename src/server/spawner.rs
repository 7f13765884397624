//! Server process spawner and the process-backed [`ServerPort`].
//!
//! Spawns the server with:
//! - `kill_on_drop(true)` as a backstop so an aborted run cannot leak the
//!   child past the probe's own lifetime.
//! - Piped stdin/stdout; stderr is piped-and-merged or inherited per
//!   [`StderrMode`].
//! - One pump task per captured stream, decoding lines through
//!   [`LineCodec`] and forwarding them into a single bounded channel
//!   tagged with their source stream.
//!
//! Spawning never waits for readiness — that is the driver's concern.
//! Teardown is split the way the driver consumes it: [`ServerPort::terminate`]
//! delivers the termination signal (SIGTERM on unix), and
//! [`ServerPort::wait_exit`] reaps with a bounded grace window, escalating
//! to a hard kill if the child ignores the signal.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{ProbeConfig, StderrMode};
use crate::server::codec::LineCodec;
use crate::server::port::{LineEvent, LineSource, ServerPort, StreamLine};
use crate::{AppError, Result};

/// Capacity of the merged line channel.
const LINE_CHANNEL_CAPACITY: usize = 64;

/// Grace window between the termination signal and a hard kill.
const REAP_GRACE: Duration = Duration::from_secs(3);

/// Configuration for spawning the server process.
#[derive(Debug, Clone)]
pub struct SpawnConfig {
    /// Server executable path or name.
    pub command: String,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
    /// Handling of the server's stderr stream.
    pub stderr_mode: StderrMode,
    /// Maximum accepted line length on captured streams, in bytes.
    pub max_line_bytes: usize,
}

impl From<&ProbeConfig> for SpawnConfig {
    fn from(config: &ProbeConfig) -> Self {
        Self {
            command: config.server_command.clone(),
            args: config.server_args.clone(),
            stderr_mode: config.stderr_mode,
            max_line_bytes: config.max_line_bytes,
        }
    }
}

/// Process-backed [`ServerPort`] over a spawned server.
///
/// Holds the child, its stdin, and the receiving end of the merged line
/// channel fed by the stream pump tasks. The pumps exit on EOF or when the
/// internal cancellation token fires during teardown.
pub struct ServerProcess {
    child: Child,
    stdin: ChildStdin,
    line_rx: mpsc::Receiver<StreamLine>,
    pump_cancel: CancellationToken,
}

impl ServerProcess {
    /// Spawn the server and start its stream pumps.
    ///
    /// Does not block on readiness; the child may still be initializing
    /// when this returns.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Launch`] when the executable cannot be started
    /// or a required stdio handle cannot be captured.
    pub fn spawn(config: &SpawnConfig) -> Result<Self> {
        let mut cmd = Command::new(&config.command);
        for arg in &config.args {
            cmd.arg(arg);
        }

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true);

        match config.stderr_mode {
            StderrMode::Inherit => cmd.stderr(Stdio::inherit()),
            StderrMode::Merge => cmd.stderr(Stdio::piped()),
        };

        let mut child = cmd.spawn().map_err(|err| {
            AppError::Launch(format!("failed to spawn {}: {err}", config.command))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AppError::Launch("failed to capture server stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Launch("failed to capture server stdout".into()))?;

        let (line_tx, line_rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        let pump_cancel = CancellationToken::new();

        tokio::spawn(pump_lines(
            LineSource::Output,
            stdout,
            line_tx.clone(),
            pump_cancel.clone(),
            config.max_line_bytes,
        ));

        if config.stderr_mode == StderrMode::Merge {
            let stderr = child
                .stderr
                .take()
                .ok_or_else(|| AppError::Launch("failed to capture server stderr".into()))?;
            tokio::spawn(pump_lines(
                LineSource::Diag,
                stderr,
                line_tx,
                pump_cancel.clone(),
                config.max_line_bytes,
            ));
        }

        debug!(command = %config.command, "server spawned");

        Ok(Self {
            child,
            stdin,
            line_rx,
            pump_cancel,
        })
    }
}

impl ServerPort for ServerProcess {
    fn send_line(&mut self, line: String) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut bytes = line.into_bytes();
            bytes.push(b'\n');

            self.stdin
                .write_all(&bytes)
                .await
                .map_err(|err| AppError::Write(format!("stdin write failed: {err}")))?;
            self.stdin
                .flush()
                .await
                .map_err(|err| AppError::Write(format!("stdin flush failed: {err}")))?;

            Ok(())
        })
    }

    fn next_line(
        &mut self,
        wait: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<LineEvent>> + Send + '_>> {
        Box::pin(async move {
            match tokio::time::timeout(wait, self.line_rx.recv()).await {
                Err(_elapsed) => Ok(LineEvent::Idle),
                Ok(None) => Ok(LineEvent::Eof),
                Ok(Some(line)) => Ok(LineEvent::Line(line)),
            }
        })
    }

    fn terminate(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.pump_cancel.cancel();
            signal_term(&mut self.child)
        })
    }

    fn wait_exit(&mut self) -> Pin<Box<dyn Future<Output = Result<Option<i32>>> + Send + '_>> {
        Box::pin(async move {
            match tokio::time::timeout(REAP_GRACE, self.child.wait()).await {
                Ok(Ok(status)) => Ok(status.code()),
                Ok(Err(err)) => Err(AppError::Io(format!("wait failed: {err}"))),
                Err(_elapsed) => {
                    warn!("server ignored its termination signal, killing");
                    self.child
                        .kill()
                        .await
                        .map_err(|err| AppError::Io(format!("kill failed: {err}")))?;
                    let status = self
                        .child
                        .wait()
                        .await
                        .map_err(|err| AppError::Io(format!("wait failed: {err}")))?;
                    Ok(status.code())
                }
            }
        })
    }
}

/// Pump decoded lines from one child stream into the merged channel.
///
/// Framing errors (over-long lines) are logged and skipped; I/O errors and
/// EOF end the pump. The channel closes once every pump has exited, which
/// the port surfaces as [`LineEvent::Eof`].
async fn pump_lines<R>(
    source: LineSource,
    stream: R,
    line_tx: mpsc::Sender<StreamLine>,
    cancel: CancellationToken,
    max_line_bytes: usize,
) where
    R: AsyncRead + Unpin + Send,
{
    let mut framed = FramedRead::new(stream, LineCodec::with_max_length(max_line_bytes));

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(source = source.as_str(), "pump: cancellation received, stopping");
                break;
            }

            item = framed.next() => {
                match item {
                    None => {
                        debug!(source = source.as_str(), "pump: EOF");
                        break;
                    }

                    Some(Err(AppError::Codec(ref msg))) => {
                        warn!(
                            source = source.as_str(),
                            error = msg.as_str(),
                            "pump: framing error, skipping line"
                        );
                    }

                    Some(Err(err)) => {
                        warn!(source = source.as_str(), error = %err, "pump: stream error, stopping");
                        break;
                    }

                    Some(Ok(text)) => {
                        if line_tx.send(StreamLine { source, text }).await.is_err() {
                            debug!(source = source.as_str(), "pump: line channel closed, stopping");
                            break;
                        }
                    }
                }
            }
        }
    }
}

/// Deliver the platform's termination signal to the child.
///
/// SIGTERM on unix — what a graceful stop means to well-behaved servers —
/// falling back to the runtime's hard kill elsewhere. A child that has
/// already exited is not an error.
#[cfg(unix)]
fn signal_term(child: &mut Child) -> Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(id) = child.id() else {
        // Already reaped.
        return Ok(());
    };

    let raw = i32::try_from(id).map_err(|err| AppError::Io(format!("pid out of range: {err}")))?;

    match kill(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(err) => Err(AppError::Io(format!("SIGTERM failed: {err}"))),
    }
}

#[cfg(not(unix))]
fn signal_term(child: &mut Child) -> Result<()> {
    match child.start_kill() {
        Ok(()) => Ok(()),
        // Already-exited children report InvalidInput.
        Err(err) if err.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
        Err(err) => Err(AppError::Io(format!("kill failed: {err}"))),
    }
}
