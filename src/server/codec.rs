//! Line codec for server streams.
//!
//! Wraps [`tokio_util::codec::LinesCodec`] with a configurable maximum line
//! length to prevent memory exhaustion caused by unterminated or absurdly
//! large output from a misbehaving server process.
//!
//! Used as the decoder for [`tokio_util::codec::FramedRead`] over the
//! child's stdout (and stderr, when captured). Each newline-terminated
//! UTF-8 string is one complete observed line; a trailing fragment with no
//! newline is surfaced by `decode_eof` once the stream closes.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};

use crate::{AppError, Result};

/// Default maximum line length accepted on server streams: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Newline-delimited line decoder for server streams.
///
/// Delegates framing to [`LinesCodec`] with a fixed per-instance length
/// limit. Lines exceeding the limit return [`AppError::Codec`] with
/// `"line too long"` rather than allocating without bound.
#[derive(Debug)]
pub struct LineCodec(LinesCodec);

impl LineCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_BYTES)
    }

    /// Create a codec with an explicit maximum line length in bytes.
    #[must_use]
    pub fn with_max_length(max_line_bytes: usize) -> Self {
        Self(LinesCodec::new_with_max_length(max_line_bytes))
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = AppError;

    /// Decode the next newline-terminated line from `src`.
    ///
    /// Returns `Ok(None)` while `src` holds no complete line yet.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Codec`]`("line too long: …")` when a line
    /// exceeds the configured limit, or [`AppError::Io`] on stream errors.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode(src).map_err(map_codec_error)
    }

    /// Decode the final (possibly unterminated) line at end-of-stream.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode_eof(src).map_err(map_codec_error)
    }
}

/// Map a [`LinesCodecError`] to an [`AppError`].
fn map_codec_error(err: LinesCodecError) -> AppError {
    match err {
        LinesCodecError::MaxLineLengthExceeded => {
            AppError::Codec("line too long: exceeded the configured limit".into())
        }
        LinesCodecError::Io(io_err) => AppError::Io(io_err.to_string()),
    }
}
