//! # RTP Media Bridge
//!
//! Relays real-time audio between a telephony (SIP/RTP) endpoint and a cloud
//! real-time media platform.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────┐                      ┌───────────────────────────┐
//! │  SIP / RTP endpoint  │                      │ Real-time media platform  │
//! └──────────┬───────────┘                      └─────────────▲─────────────┘
//!            │ UDP                                            │
//!            ▼                                                │
//! ┌───────────────────────────────────────────────────────────┼───────────────┐
//! │                       BRIDGE SESSION                      │               │
//! │                                                           │ PlayoutSink   │
//! │  ┌──────────────────┐   ┌──────────────┐   ┌────────────┐ │ (decode and   │
//! │  │   RtpReceiver    │──►│ JitterBuffer │──►│  Playout   │─┘  publish)     │
//! │  │ RtpPacket::parse │put│              │get│ every 20ms │                 │
//! │  └────────┬─────────┘   └──────┬───────┘   └────────────┘                 │
//! │           │ received           │ loss                                     │
//! │           ▼                    ▼                                          │
//! │     ┌──────────────────────────────┐                                      │
//! │     │         BridgeStats          │◄─────── monitor (HTTP, pull)         │
//! │     └──────────────────────────────┘                                      │
//! │           ▲ sent                                                          │
//! │  ┌────────┴─────────┐   ┌──────────────┐                                  │
//! │  │    RtpSender     │◄──│OutboundAudio │◄─────── platform audio           │
//! │  │  RtpPacketizer   │   └──────────────┘                                  │
//! │  └────────┬─────────┘                                                     │
//! └───────────┼───────────────────────────────────────────────────────────────┘
//!             │ UDP
//!             ▼
//!      SIP / RTP endpoint
//! ```

pub mod audio;
pub mod bridge;
pub mod config;
pub mod error;
pub mod monitor;
pub mod network;
pub mod protocol;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default frame duration in milliseconds (also the playout clock period)
    pub const DEFAULT_FRAME_MS: u32 = 20;

    /// Longest frame duration accepted by configuration
    pub const MAX_FRAME_MS: u32 = 120;

    /// Default dynamic payload type for outbound audio
    pub const DEFAULT_PAYLOAD_TYPE: u8 = 111;

    /// Default local RTP port
    pub const DEFAULT_RTP_PORT: u16 = 40000;

    /// Default port for the monitoring HTTP endpoint
    pub const DEFAULT_MONITOR_PORT: u16 = 8080;

    /// Default skip threshold in sequence numbers (60ms at 20ms frames)
    pub const DEFAULT_SKIP_THRESHOLD: u16 = 3;

    /// Default maximum packets held by the jitter buffer
    pub const DEFAULT_JITTER_CAPACITY: usize = 512;

    /// Default packets buffered before playout starts
    pub const DEFAULT_PREFILL_PACKETS: usize = 2;

    /// Sequence numbers ahead of the playout cursor still treated as the same
    /// stream (RFC 3550 A.1 MAX_DROPOUT)
    pub const JITTER_MAX_DROPOUT: u16 = 3000;

    /// Sequence numbers behind the playout cursor counted as late rather than
    /// a restart (RFC 3550 A.1 MAX_MISORDER)
    pub const JITTER_MAX_MISORDER: u16 = 100;

    /// Maximum RTP datagram size (MTU - IP/UDP headers)
    pub const MAX_PACKET_SIZE: usize = 1472;

    /// Outbound frames queued before `OutboundAudio::send` waits
    pub const OUTBOUND_QUEUE_FRAMES: usize = 64;
}
