//! The agent wire protocol.
//!
//! Every frame on the wire is a 4-byte big-endian length prefix followed
//! by a protobuf payload. Framing rides on
//! [`tokio_util::codec::LengthDelimitedCodec`]; the payloads are the
//! hand-written prost messages in [`messages`], with the schema and query
//! encodings coming from [`oef_core::wire`].
//!
//! # Protocol Sequence
//!
//! 1. Agent sends [`messages::Id`] with its public key.
//! 2. Node answers [`messages::Phrase`]: a challenge, or `failure` if the
//!    key is already connected.
//! 3. Agent sends [`messages::Answer`].
//! 4. Node answers [`messages::Connected`] with the admission verdict.
//! 5. Established: agent sends [`messages::Envelope`]s, node answers with
//!    [`messages::ServerMessage`]s.

pub mod framing;
pub mod messages;

use std::time::Duration;

pub use framing::{decode, encode, frame_codec};

/// Error surfaced by reading, writing or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Transport failure, including oversized frames rejected by the
    /// codec.
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    /// The frame payload does not decode as the expected message.
    #[error("undecodable frame: {0}")]
    Decode(#[from] prost::DecodeError),

    /// A write did not complete within its deadline.
    #[error("write deadline of {0:?} elapsed")]
    WriteTimeout(Duration),
}
