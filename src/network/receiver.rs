//! Inbound RTP receive loop
//!
//! Datagram in, `RtpPacket::parse`, jitter buffer `put`. Malformed datagrams
//! are counted and dropped here and never reach the buffer.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::watch;

use crate::audio::SharedJitterBuffer;
use crate::bridge::{BridgeState, BridgeStats};
use crate::error::NetworkError;
use crate::network::RemotePeer;
use crate::protocol::RtpPacket;

/// Receive side of one bridge session
pub struct RtpReceiver {
    socket: Arc<UdpSocket>,
    buffer: SharedJitterBuffer,
    stats: Arc<BridgeStats>,
    peer: RemotePeer,
    max_packet_size: usize,
}

impl RtpReceiver {
    pub fn new(
        socket: Arc<UdpSocket>,
        buffer: SharedJitterBuffer,
        stats: Arc<BridgeStats>,
        peer: RemotePeer,
        max_packet_size: usize,
    ) -> Self {
        Self {
            socket,
            buffer,
            stats,
            peer,
            max_packet_size,
        }
    }

    /// Receive until shutdown is signalled or the socket fails.
    ///
    /// A socket failure marks the session `Failed`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        // One spare byte so an oversized datagram is detectable
        let mut buf = vec![0u8; self.max_packet_size + 1];

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = shutdown.changed() => break,
                result = self.socket.recv_from(&mut buf) => match result {
                    Ok((len, from)) => {
                        if len > self.max_packet_size {
                            self.stats.record_invalid(1);
                            tracing::debug!(len, %from, "Dropping oversized datagram");
                            continue;
                        }
                        self.handle_datagram(&buf[..len], from);
                    }
                    // ICMP port unreachable from an earlier send; the socket is fine
                    Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => {
                        tracing::debug!("Ignoring connection reset on RTP socket");
                    }
                    Err(e) => {
                        let err = NetworkError::ReceiveFailed(e);
                        tracing::error!(session_id = %self.stats.session_id(), "{}", err);
                        if let Err(e) = self.stats.transition(BridgeState::Failed) {
                            tracing::debug!("{}", e);
                        }
                        break;
                    }
                }
            }
        }

        tracing::debug!(session_id = %self.stats.session_id(), "Receive loop stopped");
    }

    fn handle_datagram(&self, data: &[u8], from: SocketAddr) {
        let Some(packet) = RtpPacket::parse(data) else {
            self.stats.record_invalid(1);
            tracing::trace!(len = data.len(), %from, "Dropping malformed datagram");
            return;
        };

        if self.peer.latch(from) {
            tracing::info!(peer = %from, ssrc = packet.ssrc(), "Remote peer latched");
        }

        self.stats.record_received(1);
        if self.stats.state() == BridgeState::Initializing {
            // Loses only to a concurrent teardown, which is fine
            let _ = self.stats.transition(BridgeState::Active);
        }

        tracing::trace!(seq = packet.sequence(), ts = packet.timestamp(), "RTP packet received");
        self.buffer.put(packet);
    }
}
