//! Glue onto the length-prefixed frame codec.
//!
//! The node does not implement framing itself: frames are produced and
//! consumed by [`LengthDelimitedCodec`], configured here for the wire
//! format: 4-byte big-endian length prefix, bounded frame size. The
//! length is validated before any allocation happens.

use bytes::Bytes;
use tokio_util::codec::LengthDelimitedCodec;

use super::ProtocolError;

/// Length of the frame header in bytes.
const HEADER_LEN: usize = 4;

/// Builds the wire codec with the given frame cap.
#[must_use]
pub fn frame_codec(max_frame_bytes: usize) -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(HEADER_LEN)
        .big_endian()
        .max_frame_length(max_frame_bytes)
        .new_codec()
}

/// Encodes a message into a frame payload.
#[must_use]
pub fn encode<M: prost::Message>(msg: &M) -> Bytes {
    Bytes::from(msg.encode_to_vec())
}

/// Decodes a frame payload into a message.
///
/// # Errors
///
/// Returns [`ProtocolError::Decode`] if the payload is not a valid
/// encoding of `M`.
pub fn decode<M: prost::Message + Default>(frame: &[u8]) -> Result<M, ProtocolError> {
    Ok(M::decode(frame)?)
}
