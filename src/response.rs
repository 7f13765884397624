//! Single-line reply parsing for the structured envelope.
//!
//! The server answers a JSON-RPC request with one JSON line carrying
//! either an `error` field or a `result` object whose `Content` string
//! holds the payload. The `error` field wins when both are present and
//! non-null; `Content` is never inspected on an error reply.

use serde_json::Value;

use crate::{AppError, Result};

/// Parsed single-line server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcReply {
    /// Successful result carrying the `Content` payload.
    Result {
        /// Extracted `result.Content` string.
        content: String,
    },
    /// Server-reported RPC error.
    Error {
        /// Rendered error message.
        message: String,
    },
}

/// Parse one line as the structured reply envelope.
///
/// # Errors
///
/// Returns [`AppError::Decode`] when the line is not valid JSON, is not an
/// object, carries neither `error` nor `result`, or carries a `result`
/// without a string `Content` field.
pub fn parse_reply(line: &str) -> Result<RpcReply> {
    let value: Value = serde_json::from_str(line.trim())
        .map_err(|err| AppError::Decode(format!("malformed json: {err}")))?;

    let Some(object) = value.as_object() else {
        return Err(AppError::Decode("reply is not a JSON object".into()));
    };

    if let Some(error) = object.get("error") {
        if !error.is_null() {
            // String errors render bare; structured errors render as JSON.
            let message = error
                .as_str()
                .map_or_else(|| error.to_string(), str::to_owned);
            return Ok(RpcReply::Error { message });
        }
    }

    match object.get("result") {
        Some(result) => {
            let content = result.get("Content").and_then(Value::as_str).ok_or_else(|| {
                AppError::Decode("result is missing a string `Content` field".into())
            })?;
            Ok(RpcReply::Result {
                content: content.to_owned(),
            })
        }
        None => Err(AppError::Decode(
            "reply has neither `error` nor `result`".into(),
        )),
    }
}
