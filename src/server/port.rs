//! Capability surface over the spawned server process.
//!
//! The [`ServerPort`] trait is the single seam between the exchange logic
//! and the operating system: the driver and the exchange/readiness loops
//! only ever talk to a port, so tests can substitute a scripted fake
//! without spawning a real process. The process-backed implementation
//! lives in [`crate::server::spawner`].

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::Result;

/// Which child stream a line was observed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSource {
    /// The server's stdout — response data.
    Output,
    /// The server's stderr — diagnostic text, never part of a response.
    Diag,
}

impl LineSource {
    /// Short stream label for log fields.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Output => "stdout",
            Self::Diag => "stderr",
        }
    }
}

/// One decoded line from the server, tagged with its source stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamLine {
    /// Stream the line arrived on.
    pub source: LineSource,
    /// Line content without its trailing newline.
    pub text: String,
}

impl StreamLine {
    /// Build a stdout line.
    #[must_use]
    pub fn output(text: impl Into<String>) -> Self {
        Self {
            source: LineSource::Output,
            text: text.into(),
        }
    }

    /// Build a stderr line.
    #[must_use]
    pub fn diag(text: impl Into<String>) -> Self {
        Self {
            source: LineSource::Diag,
            text: text.into(),
        }
    }
}

/// Outcome of one bounded wait for the next server line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// A line arrived.
    Line(StreamLine),
    /// All captured server streams reached end-of-stream.
    Eof,
    /// The wait elapsed with no line available.
    Idle,
}

/// Capability surface over the child server process.
///
/// Methods return boxed futures so the trait stays object-safe; the driver
/// holds a `&mut dyn ServerPort` and awaits each call in sequence — there
/// is never more than one outstanding operation per port.
pub trait ServerPort: Send {
    /// Write `line` followed by a single newline and flush immediately.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Write`](crate::AppError::Write) when the child's
    /// stdin is closed or broken.
    fn send_line(&mut self, line: String) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Wait up to `wait` for the next observed line.
    ///
    /// Never blocks past `wait`: an empty window yields [`LineEvent::Idle`]
    /// so the caller stays responsive to interruption.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`](crate::AppError::Io) on unrecoverable
    /// stream failures.
    fn next_line(
        &mut self,
        wait: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<LineEvent>> + Send + '_>>;

    /// Send the child its termination signal.
    ///
    /// Signalling an already-exited child is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`](crate::AppError::Io) when the signal cannot
    /// be delivered.
    fn terminate(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Block until the child has exited and reclaim its resources.
    ///
    /// Returns the exit code when the child exited normally, `None` when it
    /// was killed by a signal. Implementations must bound this wait and
    /// escalate rather than hang on a child that ignores its termination
    /// signal.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`](crate::AppError::Io) when the child cannot
    /// be reaped.
    fn wait_exit(&mut self) -> Pin<Box<dyn Future<Output = Result<Option<i32>>> + Send + '_>>;
}
