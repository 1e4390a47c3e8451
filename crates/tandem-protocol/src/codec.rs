//! Codec for encoding and decoding Tandem frames.
//!
//! Frames are JSON objects. One transport message may carry several
//! frames separated by a single `\n`.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Maximum encoded frame size (64 KiB).
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Frame delimiter.
pub const DELIMITER: u8 = b'\n';

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame exceeds maximum size.
    #[error("Frame size {0} exceeds maximum {MAX_FRAME_SIZE}")]
    FrameTooLarge(usize),

    /// Frame contained only whitespace.
    #[error("Empty frame")]
    Empty,

    /// JSON encoding error.
    #[error("Encoding error: {0}")]
    Encode(#[source] serde_json::Error),

    /// JSON decoding error, including unknown frame types.
    #[error("Decoding error: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Encode a frame to bytes, without a trailing delimiter.
///
/// # Errors
///
/// Returns an error if the frame is too large or encoding fails.
pub fn encode<F: Serialize>(frame: &F) -> Result<Bytes, ProtocolError> {
    let payload = serde_json::to_vec(frame).map_err(ProtocolError::Encode)?;

    if payload.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(payload.len()));
    }

    Ok(Bytes::from(payload))
}

/// Decode a single frame.
///
/// Surrounding whitespace, including a trailing delimiter, is ignored.
///
/// # Errors
///
/// Returns an error if the data is empty, too large, or not a valid frame.
pub fn decode<F: DeserializeOwned>(data: &[u8]) -> Result<F, ProtocolError> {
    let data = data.trim_ascii();

    if data.is_empty() {
        return Err(ProtocolError::Empty);
    }
    if data.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(data.len()));
    }

    serde_json::from_slice(data).map_err(ProtocolError::Decode)
}

/// Decode every frame in a message carrying newline-separated frames.
///
/// Blank lines are skipped. Each frame decodes independently, so one bad
/// frame does not hide the others.
pub fn frames<'a, F: DeserializeOwned + 'a>(
    data: &'a [u8],
) -> impl Iterator<Item = Result<F, ProtocolError>> + 'a {
    data.split(|b| *b == DELIMITER)
        .filter(|line| !line.trim_ascii().is_empty())
        .map(decode)
}
