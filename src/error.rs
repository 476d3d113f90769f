//! Error types for the media bridge
//!
//! Only setup and configuration problems surface as errors. Per-packet
//! conditions (malformed datagrams, gaps, loss) are handled locally through
//! `Option` and counters and never reach these types.

use thiserror::Error;

use crate::bridge::BridgeState;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Audio format error: {0}")]
    Format(#[from] FormatError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Packet error: {0}")]
    Packet(#[from] PacketError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio format descriptor errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Bit depth must be a non-zero multiple of 8, got {0}")]
    InvalidBitDepth(u16),

    #[error("Channel count must be non-zero")]
    NoChannels,

    #[error("Sample rate must be non-zero")]
    ZeroSampleRate,
}

/// Network errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Socket bind failed on {addr}: {source}")]
    BindFailed {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Socket option failed: {0}")]
    SocketOption(std::io::Error),

    #[error("Receive failed: {0}")]
    ReceiveFailed(std::io::Error),

    #[error("Send failed: {0}")]
    SendFailed(std::io::Error),
}

/// Session lifecycle errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition { from: BridgeState, to: BridgeState },
}

/// Errors building an outgoing RTP packet
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("Too many CSRC identifiers: {0} (max 15)")]
    TooManyCsrcs(usize),

    #[error("Payload type out of range: {0} (max 127)")]
    PayloadTypeOutOfRange(u8),

    #[error("Extension data must be a multiple of 4 bytes, got {0}")]
    UnalignedExtension(usize),
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;
