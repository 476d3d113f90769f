//! Bridge lifecycle state and RTP counters
//!
//! One `BridgeStats` is owned by each session and shared (via `Arc`) with the
//! receive, playout and send tasks plus any monitoring reader. State and
//! counters sit behind one mutex so a snapshot never mixes values from
//! different moments.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::time::Instant;
use uuid::Uuid;

use crate::error::SessionError;

/// Lifecycle state of a bridge session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeState {
    /// Session created, transport not yet confirmed
    Initializing,
    /// Media flowing
    Active,
    /// Torn down normally
    Closed,
    /// Transport failed irrecoverably
    Failed,
}

impl BridgeState {
    /// Closed or failed; no further transitions
    pub fn is_terminal(self) -> bool {
        matches!(self, BridgeState::Closed | BridgeState::Failed)
    }

    pub fn can_transition_to(self, next: BridgeState) -> bool {
        use BridgeState::*;
        matches!(
            (self, next),
            (Initializing, Active) | (Initializing | Active, Closed | Failed)
        )
    }

    /// Lowercase name as used in snapshots
    pub fn as_str(self) -> &'static str {
        match self {
            BridgeState::Initializing => "initializing",
            BridgeState::Active => "active",
            BridgeState::Closed => "closed",
            BridgeState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for BridgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
struct Counters {
    state: BridgeState,
    received: u64,
    sent: u64,
    lost: u64,
    invalid: u64,
}

/// Shared state and counters for one bridge session
pub struct BridgeStats {
    session_id: Uuid,
    started: Instant,
    started_at: DateTime<Utc>,
    inner: Mutex<Counters>,
}

impl BridgeStats {
    /// Create a tracker in the `Initializing` state
    pub fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            started: Instant::now(),
            started_at: Utc::now(),
            inner: Mutex::new(Counters {
                state: BridgeState::Initializing,
                received: 0,
                sent: 0,
                lost: 0,
                invalid: 0,
            }),
        }
    }

    /// Get session ID
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Get current lifecycle state
    pub fn state(&self) -> BridgeState {
        self.inner.lock().state
    }

    /// Move to `next`. Re-entering the current state is a no-op; leaving a
    /// terminal state or skipping back to `Initializing` is rejected.
    pub fn transition(&self, next: BridgeState) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();
        let current = inner.state;
        if current == next {
            return Ok(());
        }
        if !current.can_transition_to(next) {
            return Err(SessionError::InvalidTransition {
                from: current,
                to: next,
            });
        }
        inner.state = next;
        drop(inner);

        tracing::info!(session_id = %self.session_id, from = %current, to = %next, "Bridge state changed");
        Ok(())
    }

    /// Count valid inbound RTP packets
    pub fn record_received(&self, packets: u64) {
        self.inner.lock().received += packets;
    }

    /// Count RTP packets sent to the peer
    pub fn record_sent(&self, packets: u64) {
        self.inner.lock().sent += packets;
    }

    /// Add declared loss. The lost counter only ever grows.
    pub fn record_lost(&self, packets: u64) {
        self.inner.lock().lost += packets;
    }

    /// Count a datagram the packet codec could not parse
    pub fn record_invalid(&self, packets: u64) {
        self.inner.lock().invalid += packets;
    }

    /// Get received packet count
    pub fn rtp_packets_received(&self) -> u64 {
        self.inner.lock().received
    }

    /// Get sent packet count
    pub fn rtp_packets_sent(&self) -> u64 {
        self.inner.lock().sent
    }

    /// Get lost packet count
    pub fn rtp_packets_lost(&self) -> u64 {
        self.inner.lock().lost
    }

    /// Get malformed datagram count
    pub fn rtp_packets_invalid(&self) -> u64 {
        self.inner.lock().invalid
    }

    /// lost / (received + lost), zero before any traffic
    pub fn rtp_packet_loss_rate(&self) -> f64 {
        let inner = self.inner.lock();
        loss_rate(inner.received, inner.lost)
    }

    /// Seconds since the tracker was created
    pub fn uptime_seconds(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Consistent copy of state and counters
    pub fn to_snapshot(&self) -> BridgeSnapshot {
        let counters = *self.inner.lock();
        BridgeSnapshot {
            session_id: self.session_id,
            state: counters.state,
            started_at: self.started_at,
            uptime_seconds: self.uptime_seconds(),
            rtp: RtpSnapshot {
                packets_received: counters.received,
                packets_sent: counters.sent,
                packets_lost: counters.lost,
                packets_invalid: counters.invalid,
                loss_rate: loss_rate(counters.received, counters.lost),
            },
        }
    }
}

fn loss_rate(received: u64, lost: u64) -> f64 {
    let total = received + lost;
    if total == 0 {
        0.0
    } else {
        lost as f64 / total as f64
    }
}

/// Point-in-time report for monitoring consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgeSnapshot {
    pub session_id: Uuid,
    pub state: BridgeState,
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: f64,
    pub rtp: RtpSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RtpSnapshot {
    pub packets_received: u64,
    pub packets_sent: u64,
    pub packets_lost: u64,
    pub packets_invalid: u64,
    pub loss_rate: f64,
}
