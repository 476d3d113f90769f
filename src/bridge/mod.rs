//! Bridge session lifecycle and health tracking

pub mod session;
pub mod stats;

pub use session::{BridgeSession, PlayoutSink};
pub use stats::{BridgeSnapshot, BridgeState, BridgeStats, RtpSnapshot};
