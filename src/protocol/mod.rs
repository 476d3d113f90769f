//! RTP wire protocol
//!
//! Packet codec plus the wrap-aware sequence arithmetic every consumer of
//! sequence numbers and timestamps has to go through.

pub mod rtp;
pub mod seq;

pub use rtp::{RtpExtension, RtpPacket, RTP_HEADER_LEN, RTP_VERSION};
pub use seq::{seq_distance, seq_is_newer, timestamp_distance, timestamp_is_newer};
