//! Terminal probe outcomes and their user-visible rendering.
//!
//! Every run ends in exactly one report, and every failure mode renders a
//! distinct message. The driver converts recoverable errors (decode
//! failures, empty responses, a server that never became ready) into
//! reports rather than propagating them, so teardown always runs first.

use std::fmt::{Display, Formatter};

use crate::errors::AppError;

/// Terminal outcome of one driver run.
#[derive(Debug)]
pub enum ProbeReport {
    /// The exchange produced content.
    Success {
        /// Extracted or drained response content.
        content: String,
    },
    /// The server answered with an RPC-level error.
    RpcError {
        /// Message carried in the reply's `error` field.
        message: String,
    },
    /// A reply line arrived but failed structural decoding.
    DecodeFailed {
        /// Decoder failure description.
        reason: String,
    },
    /// Timeout or end-of-stream with no response data.
    NoResponse,
    /// The readiness marker was never observed within its deadline; the
    /// request was not sent.
    NotReady,
    /// The run was cancelled by an external interrupt.
    Interrupted,
    /// Launch or exchange failure outside the recoverable outcomes.
    Failed {
        /// Underlying application error.
        error: AppError,
    },
}

impl ProbeReport {
    /// True only for a successful exchange.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl Display for ProbeReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success { .. } => write!(f, "SUCCESS"),
            Self::RpcError { message } => write!(f, "RPC Error: {message}"),
            Self::DecodeFailed { reason } => write!(f, "Failed to decode: {reason}"),
            Self::NoResponse => write!(f, "No response received"),
            Self::NotReady => write!(f, "Server never became ready"),
            Self::Interrupted => write!(f, "Interrupted"),
            Self::Failed { error } => write!(f, "{error}"),
        }
    }
}
