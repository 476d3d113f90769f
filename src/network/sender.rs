//! Outbound RTP: packetization and the send loop

use bytes::Bytes;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::bridge::BridgeStats;
use crate::error::{NetworkError, PacketError};
use crate::network::RemotePeer;
use crate::protocol::RtpPacket;

/// Stamps encoded audio frames with RTP headers.
///
/// Each payload is assumed to carry exactly one frame, so the timestamp
/// advances by `samples_per_frame` per packet.
#[derive(Debug, Clone)]
pub struct RtpPacketizer {
    ssrc: u32,
    payload_type: u8,
    sequence: u16,
    timestamp: u32,
    samples_per_frame: u32,
    started: bool,
}

impl RtpPacketizer {
    /// Create a packetizer with a random SSRC, sequence and timestamp base
    /// (RFC 3550 §5.1)
    pub fn new(payload_type: u8, samples_per_frame: u32) -> Result<Self, PacketError> {
        let seed = Uuid::new_v4().as_u128();
        Self::with_initial(
            payload_type,
            samples_per_frame,
            seed as u32,
            (seed >> 32) as u16,
            (seed >> 48) as u32,
        )
    }

    /// Create a packetizer with explicit SSRC, sequence and timestamp bases
    pub fn with_initial(
        payload_type: u8,
        samples_per_frame: u32,
        ssrc: u32,
        sequence: u16,
        timestamp: u32,
    ) -> Result<Self, PacketError> {
        if payload_type > 127 {
            return Err(PacketError::PayloadTypeOutOfRange(payload_type));
        }
        Ok(Self {
            ssrc,
            payload_type,
            sequence,
            timestamp,
            samples_per_frame,
            started: false,
        })
    }

    /// Wrap one frame. The first packet of the stream carries the marker bit.
    pub fn packetize(&mut self, payload: Bytes) -> RtpPacket {
        let packet = RtpPacket::new(
            self.payload_type,
            self.sequence,
            self.timestamp,
            self.ssrc,
            payload,
        )
        .with_marker(!self.started);

        self.started = true;
        self.sequence = self.sequence.wrapping_add(1);
        self.timestamp = self.timestamp.wrapping_add(self.samples_per_frame);
        packet
    }

    /// Get stream SSRC
    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    /// Sequence number of the next packet
    pub fn next_sequence(&self) -> u16 {
        self.sequence
    }

    pub fn next_timestamp(&self) -> u32 {
        self.timestamp
    }
}

/// Handle for feeding encoded platform audio into a session
#[derive(Debug, Clone)]
pub struct OutboundAudio {
    tx: mpsc::Sender<Bytes>,
}

impl OutboundAudio {
    /// Create a handle and the receiving end for the send loop
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Queue one encoded frame, waiting for room. Returns false once the
    /// session has stopped.
    pub async fn send(&self, payload: Bytes) -> bool {
        self.tx.send(payload).await.is_ok()
    }

    /// Queue one encoded frame without waiting. Returns false if the queue is
    /// full or the session has stopped.
    pub fn try_send(&self, payload: Bytes) -> bool {
        self.tx.try_send(payload).is_ok()
    }
}

/// Send side of one bridge session
pub struct RtpSender {
    socket: Arc<UdpSocket>,
    peer: RemotePeer,
    stats: Arc<BridgeStats>,
    packetizer: RtpPacketizer,
}

impl RtpSender {
    pub fn new(
        socket: Arc<UdpSocket>,
        peer: RemotePeer,
        stats: Arc<BridgeStats>,
        packetizer: RtpPacketizer,
    ) -> Self {
        Self {
            socket,
            peer,
            stats,
            packetizer,
        }
    }

    /// Send queued frames until shutdown or until every `OutboundAudio`
    /// handle is dropped. Send errors are logged and the frame is lost.
    pub async fn run(mut self, mut audio: mpsc::Receiver<Bytes>, mut shutdown: watch::Receiver<bool>) {
        tracing::debug!(ssrc = self.packetizer.ssrc(), "Send loop started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let payload = tokio::select! {
                _ = shutdown.changed() => break,
                payload = audio.recv() => match payload {
                    Some(payload) => payload,
                    None => break,
                },
            };

            let Some(peer) = self.peer.get() else {
                tracing::debug!("No remote peer yet, dropping outbound frame");
                continue;
            };

            let packet = self.packetizer.packetize(payload);
            let wire = packet.serialize();
            match self.socket.send_to(&wire, peer).await {
                Ok(_) => self.stats.record_sent(1),
                Err(e) => {
                    let err = NetworkError::SendFailed(e);
                    tracing::warn!(%peer, seq = packet.sequence(), "{}", err);
                }
            }
        }

        tracing::debug!(ssrc = self.packetizer.ssrc(), "Send loop stopped");
    }
}
