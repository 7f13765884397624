//! Request construction and one-line wire encoding.
//!
//! Exactly one request is sent per driver invocation, in one of the two
//! wire shapes the server accepts on stdin: a JSON-RPC envelope
//! (`{"jsonrpc":"2.0","method":…,"params":[…],"id":…}`) or a bare command
//! word. Both are newline-terminated by the port when written.

use serde_json::{json, Value};

use crate::{AppError, Result};

/// Structured JSON-RPC request envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    /// Fully qualified method name, e.g. `RPCHandler.GetPR`.
    pub method: String,
    /// Ordered positional parameters.
    pub params: Vec<Value>,
    /// Request correlation identifier.
    pub id: u64,
}

/// One request sent to the server per driver invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// JSON-RPC envelope serialized to a single line.
    Rpc(RpcRequest),
    /// Bare command word, e.g. `hello` or `getReviews`.
    Bare(String),
}

impl Request {
    /// Build a JSON-RPC request.
    #[must_use]
    pub fn rpc(method: impl Into<String>, params: Vec<Value>, id: u64) -> Self {
        Self::Rpc(RpcRequest {
            method: method.into(),
            params,
            id,
        })
    }

    /// Build a bare command-word request.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] when `word` is empty or contains
    /// whitespace — a bare command is exactly one word on one line.
    pub fn bare(word: impl Into<String>) -> Result<Self> {
        let word = word.into();
        if word.is_empty() || word.contains(char::is_whitespace) {
            return Err(AppError::Config(
                "bare command must be a single non-empty word".into(),
            ));
        }
        Ok(Self::Bare(word))
    }

    /// Encode the request as exactly one line, without a trailing newline.
    ///
    /// The port appends the newline and flushes; the encoded line itself
    /// never contains one.
    #[must_use]
    pub fn encode_line(&self) -> String {
        match self {
            Self::Rpc(request) => json!({
                "jsonrpc": "2.0",
                "method": request.method,
                "params": request.params,
                "id": request.id,
            })
            .to_string(),
            Self::Bare(word) => word.clone(),
        }
    }
}
