//! UDP transport for RTP

pub mod udp;
pub mod sender;
pub mod receiver;

pub use udp::{bind_socket, RemotePeer};
pub use sender::{OutboundAudio, RtpPacketizer, RtpSender};
pub use receiver::RtpReceiver;
