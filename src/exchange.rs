//! Request/response exchange: one bounded send, one bounded collect.
//!
//! The request write always happens-before any response collection; no
//! line read during collection predates the flush of the request. Both
//! collection policies poll in short waits so an external interrupt is
//! noticed within one poll interval.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::report::ProbeReport;
use crate::request::Request;
use crate::response::{parse_reply, RpcReply};
use crate::server::port::{LineEvent, LineSource, ServerPort};
use crate::{AppError, Result};

/// Response collection policy for one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectPolicy {
    /// Read exactly one structured reply line within the overall deadline.
    SingleLine {
        /// Overall response deadline.
        overall: Duration,
    },
    /// Append whatever output lines arrive within the window, stopping
    /// early once the stream goes idle after prior content.
    BoundedDrain {
        /// Overall drain window.
        window: Duration,
    },
}

/// Write the encoded request as one newline-terminated line and flush.
///
/// # Errors
///
/// Returns [`AppError::Write`] when the server's stdin is closed or broken.
pub async fn send_request(port: &mut dyn ServerPort, request: &Request) -> Result<()> {
    let line = request.encode_line();
    debug!(request = %line, "sending request");
    port.send_line(line).await
}

/// Collect a response according to `policy`.
///
/// Recoverable outcomes (decode failure, no data) become reports; only
/// interruption and unrecoverable stream errors surface as errors.
///
/// # Errors
///
/// Returns [`AppError::Interrupted`] when `cancel` fires, or propagates
/// stream errors from the port.
pub async fn collect(
    port: &mut dyn ServerPort,
    policy: CollectPolicy,
    poll: Duration,
    cancel: &CancellationToken,
) -> Result<ProbeReport> {
    match policy {
        CollectPolicy::SingleLine { overall } => {
            collect_single_line(port, overall, poll, cancel).await
        }
        CollectPolicy::BoundedDrain { window } => collect_drain(port, window, poll, cancel).await,
    }
}

/// Wait for one output line and parse it as the reply envelope.
async fn collect_single_line(
    port: &mut dyn ServerPort,
    overall: Duration,
    poll: Duration,
    cancel: &CancellationToken,
) -> Result<ProbeReport> {
    let deadline = Instant::now() + overall;

    loop {
        let now = Instant::now();
        if now >= deadline {
            warn!("no reply line within the response deadline");
            return Ok(ProbeReport::NoResponse);
        }

        let wait = poll.min(deadline.saturating_duration_since(now));

        let event = tokio::select! {
            biased;

            () = cancel.cancelled() => return Err(AppError::Interrupted),

            event = port.next_line(wait) => event?,
        };

        match event {
            LineEvent::Line(line) if line.source == LineSource::Diag => {
                debug!(text = %line.text, "diagnostic line during collection");
            }
            LineEvent::Line(line) => {
                return Ok(match parse_reply(&line.text) {
                    Ok(RpcReply::Result { content }) => ProbeReport::Success { content },
                    Ok(RpcReply::Error { message }) => ProbeReport::RpcError { message },
                    Err(AppError::Decode(reason)) => {
                        warn!(reason = reason.as_str(), raw_line = %line.text, "reply failed to decode");
                        ProbeReport::DecodeFailed { reason }
                    }
                    Err(error) => {
                        warn!(%error, raw_line = %line.text, "reply failed to decode");
                        ProbeReport::DecodeFailed {
                            reason: error.to_string(),
                        }
                    }
                });
            }
            LineEvent::Eof => {
                warn!("end of stream before any reply line");
                return Ok(ProbeReport::NoResponse);
            }
            LineEvent::Idle => {}
        }
    }
}

/// Drain output lines until the window closes, the stream ends, or the
/// stream goes idle after at least one line was collected.
async fn collect_drain(
    port: &mut dyn ServerPort,
    window: Duration,
    poll: Duration,
    cancel: &CancellationToken,
) -> Result<ProbeReport> {
    let deadline = Instant::now() + window;
    let mut lines: Vec<String> = Vec::new();

    loop {
        let now = Instant::now();
        if now >= deadline {
            debug!(collected = lines.len(), "drain window elapsed");
            break;
        }

        let wait = poll.min(deadline.saturating_duration_since(now));

        let event = tokio::select! {
            biased;

            () = cancel.cancelled() => return Err(AppError::Interrupted),

            event = port.next_line(wait) => event?,
        };

        match event {
            LineEvent::Line(line) if line.source == LineSource::Diag => {
                debug!(text = %line.text, "diagnostic line during drain");
            }
            LineEvent::Line(line) => lines.push(line.text),
            LineEvent::Eof => {
                debug!(collected = lines.len(), "end of stream during drain");
                break;
            }
            LineEvent::Idle => {
                if !lines.is_empty() {
                    debug!(collected = lines.len(), "stream idle after content, stopping early");
                    break;
                }
            }
        }
    }

    if lines.is_empty() {
        warn!("drain finished with no output collected");
        Ok(ProbeReport::NoResponse)
    } else {
        Ok(ProbeReport::Success {
            content: lines.join("\n"),
        })
    }
}
