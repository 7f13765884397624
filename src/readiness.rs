//! Readiness detection over observed server lines.
//!
//! Some servers must not receive a request until they have logged an
//! initialization marker (e.g. `Starting RPC`). The detector is a pure
//! substring scan; the wait loop drives it with bounded polls so a server
//! that never becomes ready produces a distinct outcome instead of a hang.
//! Marker lines typically arrive on stderr, so the loop scans both source
//! streams of the merged channel.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::server::port::{LineEvent, ServerPort};
use crate::{AppError, Result};

/// True exactly when `marker` occurs as a substring of `line`.
#[must_use]
pub fn observe_line(line: &str, marker: &str) -> bool {
    line.contains(marker)
}

/// Outcome of the bounded readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Marker observed; the request may be sent.
    Ready,
    /// The deadline elapsed, or the server exited, before the marker
    /// appeared. The request must not be sent.
    NeverReady,
}

/// Wait until a line containing `marker` is observed, bounded by `overall`.
///
/// Polls the port in `poll`-sized waits so cancellation is noticed
/// promptly. End-of-stream before the marker counts as never-ready: a dead
/// server cannot accept a request.
///
/// # Errors
///
/// Returns [`AppError::Interrupted`] when `cancel` fires, or propagates
/// stream errors from the port.
pub async fn wait_for_ready(
    port: &mut dyn ServerPort,
    marker: &str,
    overall: Duration,
    poll: Duration,
    cancel: &CancellationToken,
) -> Result<Readiness> {
    let deadline = Instant::now() + overall;

    loop {
        let now = Instant::now();
        if now >= deadline {
            debug!(marker, "readiness deadline elapsed");
            return Ok(Readiness::NeverReady);
        }

        let wait = poll.min(deadline.saturating_duration_since(now));

        let event = tokio::select! {
            biased;

            () = cancel.cancelled() => return Err(AppError::Interrupted),

            event = port.next_line(wait) => event?,
        };

        match event {
            LineEvent::Line(line) => {
                if observe_line(&line.text, marker) {
                    info!(marker, "readiness marker observed");
                    return Ok(Readiness::Ready);
                }
                debug!(
                    source = line.source.as_str(),
                    text = %line.text,
                    "line observed before readiness"
                );
            }
            LineEvent::Eof => {
                debug!("server streams closed before the readiness marker");
                return Ok(Readiness::NeverReady);
            }
            LineEvent::Idle => {}
        }
    }
}
