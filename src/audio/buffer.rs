//! Jitter buffer for RTP packet reordering
//!
//! Packets are held by sequence number and released strictly in sequence
//! order. A missing packet is waited for while the hole is small; once the
//! next available packet sits `skip_threshold` or more sequence numbers past
//! the last one played, the hole is declared lost and playout jumps ahead.
//! Real-time audio prefers a gap over a stale packet.
//!
//! A packet far outside the sequence window around the cursor, or from a new
//! SSRC, is held on probation. If the next such packet directly follows it,
//! the stream restarted (re-INVITE, new sequence base) and playout re-anchors
//! on the new stream; otherwise the stray is discarded as late.
//!
//! All state lives behind a single mutex so the network receive path (`put`)
//! and the playout clock (`get`) can share one buffer. Every call is one
//! short critical section and nothing inside it blocks.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::constants::{
    DEFAULT_JITTER_CAPACITY, DEFAULT_SKIP_THRESHOLD, JITTER_MAX_DROPOUT, JITTER_MAX_MISORDER,
};
use crate::protocol::{seq_distance, seq_is_newer, RtpPacket};

/// Result of one playout pull
#[derive(Debug, Clone, Default)]
pub struct Playout {
    /// Packet to play, if one is ready
    pub packet: Option<RtpPacket>,
    /// Sequence numbers declared lost by this pull
    pub lost: u64,
}

/// Jitter buffer statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JitterBufferStats {
    pub packets_in: u64,
    pub packets_out: u64,
    pub packets_lost: u64,
    /// Arrived behind the playout cursor, or outside the sequence window and
    /// never confirmed, and discarded
    pub packets_late: u64,
    /// Rejected because the buffer was at capacity
    pub packets_dropped: u64,
    /// Times playout re-anchored on a restarted stream
    pub resyncs: u64,
    pub current_size: usize,
}

impl JitterBufferStats {
    /// Fraction of played-or-skipped sequence numbers that were lost
    pub fn loss_rate(&self) -> f64 {
        let total = self.packets_out + self.packets_lost;
        if total == 0 {
            0.0
        } else {
            self.packets_lost as f64 / total as f64
        }
    }
}

/// Where an arriving packet falls relative to the playout cursor
enum Arrival {
    InWindow,
    Late,
    Discontinuity,
}

struct Inner {
    pending: BTreeMap<u16, RtpPacket>,
    /// Next sequence to play; `None` until the first pull anchors it
    expected: Option<u16>,
    /// SSRC of the stream being played
    ssrc: Option<u32>,
    /// Out-of-window packet waiting for a follow-up
    candidate: Option<RtpPacket>,
    packets_in: u64,
    packets_out: u64,
    packets_lost: u64,
    packets_late: u64,
    packets_dropped: u64,
    resyncs: u64,
}

impl Inner {
    fn classify(&self, packet: &RtpPacket, expected: u16) -> Arrival {
        if self.ssrc.is_some_and(|ssrc| ssrc != packet.ssrc()) {
            return Arrival::Discontinuity;
        }

        let seq = packet.sequence();
        if seq_distance(expected, seq) < JITTER_MAX_DROPOUT {
            Arrival::InWindow
        } else if seq_distance(seq, expected) <= JITTER_MAX_MISORDER {
            Arrival::Late
        } else {
            Arrival::Discontinuity
        }
    }

    /// Hold an out-of-window packet. A packet that directly follows the held
    /// one (same SSRC, next sequence) confirms a restarted stream: pending
    /// packets of the old stream are dropped and the cursor re-anchors.
    fn probation(&mut self, packet: RtpPacket, capacity: usize) {
        let follows = self.candidate.as_ref().is_some_and(|held| {
            held.ssrc() == packet.ssrc() && held.sequence().wrapping_add(1) == packet.sequence()
        });

        let held = match self.candidate.take() {
            Some(held) if follows => held,
            stray => {
                if stray.is_some() {
                    self.packets_late += 1;
                }
                tracing::trace!(seq = packet.sequence(), ssrc = packet.ssrc(), "Out-of-window packet held");
                self.candidate = Some(packet);
                return;
            }
        };

        let stale = self.pending.len();
        self.pending.clear();
        self.expected = None;
        self.ssrc = Some(packet.ssrc());
        self.resyncs += 1;
        tracing::info!(
            seq = held.sequence(),
            ssrc = held.ssrc(),
            stale,
            "Stream restarted, re-anchoring playout"
        );

        if capacity > 1 {
            self.pending.insert(held.sequence(), held);
        } else {
            self.packets_dropped += 1;
        }
        self.pending.insert(packet.sequence(), packet);
    }

    /// Earliest pending sequence in wrap-aware order: the key that follows
    /// the widest hole in the circular sequence space.
    fn earliest(&self) -> Option<u16> {
        let mut keys = self.pending.keys().copied();
        let first = keys.next()?;

        let mut earliest = first;
        let mut widest = 0u16;
        let mut prev = first;
        for key in keys {
            let gap = seq_distance(prev, key);
            if gap > widest {
                widest = gap;
                earliest = key;
            }
            prev = key;
        }

        if seq_distance(prev, first) >= widest {
            earliest = first;
        }
        Some(earliest)
    }

    /// First pending sequence at or after `from`, walking the circle
    fn next_from(&self, from: u16) -> Option<u16> {
        self.pending
            .range(from..)
            .next()
            .or_else(|| self.pending.range(..from).next())
            .map(|(seq, _)| *seq)
    }

    fn emit(&mut self, seq: u16) -> Option<RtpPacket> {
        let packet = self.pending.remove(&seq)?;
        self.packets_out += 1;
        self.expected = Some(seq.wrapping_add(1));
        Some(packet)
    }
}

/// Reordering jitter buffer keyed by RTP sequence number
pub struct JitterBuffer {
    inner: Mutex<Inner>,
    skip_threshold: u16,
    capacity: usize,
}

impl JitterBuffer {
    /// Create a buffer with the given skip threshold and default capacity
    pub fn new(skip_threshold: u16) -> Self {
        Self::with_capacity(skip_threshold, DEFAULT_JITTER_CAPACITY)
    }

    /// Create a buffer holding at most `capacity` pending packets
    pub fn with_capacity(skip_threshold: u16, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                pending: BTreeMap::new(),
                expected: None,
                ssrc: None,
                candidate: None,
                packets_in: 0,
                packets_out: 0,
                packets_lost: 0,
                packets_late: 0,
                packets_dropped: 0,
                resyncs: 0,
            }),
            skip_threshold,
            capacity,
        }
    }

    /// Insert a packet.
    ///
    /// Returns false if it was discarded: either it is just behind the
    /// playout cursor, or it is a new sequence number and the buffer is full.
    /// A duplicate of a pending sequence number replaces the earlier copy.
    /// An out-of-window packet is held until the next one shows whether the
    /// stream restarted.
    pub fn put(&self, packet: RtpPacket) -> bool {
        let seq = packet.sequence();
        let mut inner = self.inner.lock();
        inner.packets_in += 1;

        if let Some(expected) = inner.expected {
            match inner.classify(&packet, expected) {
                Arrival::InWindow => {}
                Arrival::Late => {
                    inner.packets_late += 1;
                    tracing::trace!(seq, expected, "Late packet discarded");
                    return false;
                }
                Arrival::Discontinuity => {
                    inner.probation(packet, self.capacity);
                    return true;
                }
            }
        }

        if inner.pending.len() >= self.capacity && !inner.pending.contains_key(&seq) {
            inner.packets_dropped += 1;
            tracing::debug!(seq, capacity = self.capacity, "Jitter buffer full, packet dropped");
            return false;
        }

        inner.ssrc = Some(packet.ssrc());
        inner.pending.insert(seq, packet);
        true
    }

    /// Pull the next packet in sequence order, or `None` if it is not ready
    pub fn get(&self) -> Option<RtpPacket> {
        self.get_with_loss().packet
    }

    /// Same decision as [`get`](Self::get), also reporting any loss declared
    pub fn get_with_loss(&self) -> Playout {
        let mut inner = self.inner.lock();

        let expected = match inner.expected {
            Some(expected) => expected,
            None => match inner.earliest() {
                Some(first) => {
                    inner.expected = Some(first);
                    first
                }
                None => return Playout::default(),
            },
        };

        if let Some(packet) = inner.emit(expected) {
            return Playout {
                packet: Some(packet),
                lost: 0,
            };
        }

        let next = loop {
            let Some(next) = inner.next_from(expected) else {
                return Playout::default();
            };
            if seq_is_newer(next, expected) {
                break next;
            }
            // Half a sequence space or more away: behind the cursor
            inner.pending.remove(&next);
            inner.packets_late += 1;
        };

        let missing = seq_distance(expected, next);
        if u32::from(missing) + 1 < u32::from(self.skip_threshold) {
            return Playout::default();
        }

        inner.packets_lost += u64::from(missing);
        tracing::debug!(expected, next, lost = missing, "Skipping sequence gap");

        Playout {
            packet: inner.emit(next),
            lost: u64::from(missing),
        }
    }

    /// Drop every pending packet. Counters are kept; the cursor re-anchors on
    /// the next pull.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.pending.clear();
        inner.candidate = None;
        inner.expected = None;
        inner.ssrc = None;
    }

    /// Number of packets waiting to be played
    pub fn size(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Check if nothing is waiting to be played
    pub fn is_empty(&self) -> bool {
        self.inner.lock().pending.is_empty()
    }

    /// Gap size (from the last played packet) at which a hole is skipped
    pub fn skip_threshold(&self) -> u16 {
        self.skip_threshold
    }

    /// Get buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get buffer statistics
    pub fn get_stats(&self) -> JitterBufferStats {
        let inner = self.inner.lock();
        JitterBufferStats {
            packets_in: inner.packets_in,
            packets_out: inner.packets_out,
            packets_lost: inner.packets_lost,
            packets_late: inner.packets_late,
            packets_dropped: inner.packets_dropped,
            resyncs: inner.resyncs,
            current_size: inner.pending.len(),
        }
    }
}

impl Default for JitterBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_SKIP_THRESHOLD)
    }
}

/// Thread-safe handle to a jitter buffer
pub type SharedJitterBuffer = Arc<JitterBuffer>;

/// Create a new shared jitter buffer
pub fn create_shared_jitter_buffer(skip_threshold: u16, capacity: usize) -> SharedJitterBuffer {
    Arc::new(JitterBuffer::with_capacity(skip_threshold, capacity))
}
