//! One bridge session: socket, jitter buffer, stats and the three tasks
//! that move media through them.
//!
//! ```text
//!  UDP ──► RtpReceiver ──put──► JitterBuffer ──get (every frame)──► PlayoutSink
//!  UDP ◄── RtpSender ◄── OutboundAudio ◄── platform audio
//! ```

use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::audio::buffer::{create_shared_jitter_buffer, SharedJitterBuffer};
use crate::bridge::{BridgeSnapshot, BridgeState, BridgeStats};
use crate::config::BridgeConfig;
use crate::constants::OUTBOUND_QUEUE_FRAMES;
use crate::error::Result;
use crate::network::{bind_socket, OutboundAudio, RemotePeer, RtpPacketizer, RtpReceiver, RtpSender};
use crate::protocol::RtpPacket;

/// Consumer of in-order packets from the playout clock.
///
/// Decoding, resampling and publishing live behind this trait. It is called
/// from an async task once per frame period and must not block.
pub trait PlayoutSink: Send + 'static {
    fn play(&mut self, packet: RtpPacket);

    /// Called on a tick with nothing ready to play
    fn underrun(&mut self) {}
}

impl PlayoutSink for mpsc::UnboundedSender<RtpPacket> {
    fn play(&mut self, packet: RtpPacket) {
        let _ = self.send(packet);
    }
}

/// A running bridge session
pub struct BridgeSession {
    id: Uuid,
    local_addr: SocketAddr,
    buffer: SharedJitterBuffer,
    stats: Arc<BridgeStats>,
    peer: RemotePeer,
    outbound: OutboundAudio,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl BridgeSession {
    /// Bind the RTP socket and start the receive, playout and send tasks
    pub async fn start<S: PlayoutSink>(config: &BridgeConfig, sink: S) -> Result<Self> {
        config.validate()?;

        let id = Uuid::new_v4();
        let socket = Arc::new(bind_socket(&config.network)?);
        let local_addr = socket.local_addr()?;

        let buffer = create_shared_jitter_buffer(config.jitter.skip_threshold, config.jitter.capacity);
        let stats = Arc::new(BridgeStats::new(id));
        let peer = RemotePeer::new(config.network.remote);

        let samples_per_frame = config
            .audio
            .format
            .samples_for_duration(config.audio.frame_ms);
        let packetizer = RtpPacketizer::new(config.audio.payload_type, samples_per_frame)?;
        let ssrc = packetizer.ssrc();

        let (outbound, audio_rx) = OutboundAudio::channel(OUTBOUND_QUEUE_FRAMES);
        let (shutdown, shutdown_rx) = watch::channel(false);

        let receiver = RtpReceiver::new(
            socket.clone(),
            buffer.clone(),
            stats.clone(),
            peer.clone(),
            config.network.max_packet_size,
        );
        let sender = RtpSender::new(socket, peer.clone(), stats.clone(), packetizer);
        let playout = PlayoutLoop {
            buffer: buffer.clone(),
            stats: stats.clone(),
            sink,
            period: Duration::from_millis(config.audio.frame_ms as u64),
            prefill: config.jitter.prefill_packets,
        };

        let tasks = vec![
            tokio::spawn(receiver.run(shutdown_rx.clone())),
            tokio::spawn(playout.run(shutdown_rx.clone())),
            tokio::spawn(sender.run(audio_rx, shutdown_rx)),
        ];

        tracing::info!(
            session_id = %id,
            local = %local_addr,
            remote = ?config.network.remote,
            ssrc,
            frame_ms = config.audio.frame_ms,
            skip_threshold = config.jitter.skip_threshold,
            "Bridge session started"
        );

        Ok(Self {
            id,
            local_addr,
            buffer,
            stats,
            peer,
            outbound,
            shutdown,
            tasks,
        })
    }

    /// Get session ID
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Address the RTP socket is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Remote RTP address, once configured or latched
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.peer.get()
    }

    /// Get shared stats tracker
    pub fn stats(&self) -> &Arc<BridgeStats> {
        &self.stats
    }

    /// Get shared jitter buffer
    pub fn jitter_buffer(&self) -> &SharedJitterBuffer {
        &self.buffer
    }

    /// Handle for queueing encoded platform audio toward the RTP peer
    pub fn outbound(&self) -> OutboundAudio {
        self.outbound.clone()
    }

    /// Queue one encoded frame toward the RTP peer
    pub async fn send_audio(&self, payload: Bytes) -> bool {
        self.outbound.send(payload).await
    }

    /// Current stats snapshot
    pub fn snapshot(&self) -> BridgeSnapshot {
        self.stats.to_snapshot()
    }

    /// Stop all tasks, release the buffered packets and close the session.
    ///
    /// A session that already failed stays `Failed`.
    pub async fn stop(mut self) -> BridgeSnapshot {
        let _ = self.shutdown.send(true);

        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::warn!(session_id = %self.id, "Session task ended abnormally: {}", e);
            }
        }

        self.buffer.clear();
        if self.stats.state() != BridgeState::Failed {
            if let Err(e) = self.stats.transition(BridgeState::Closed) {
                tracing::debug!(session_id = %self.id, "{}", e);
            }
        }

        let snapshot = self.stats.to_snapshot();
        tracing::info!(
            session_id = %self.id,
            state = %snapshot.state,
            received = snapshot.rtp.packets_received,
            sent = snapshot.rtp.packets_sent,
            lost = snapshot.rtp.packets_lost,
            "Bridge session stopped"
        );
        snapshot
    }
}

impl Drop for BridgeSession {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// Fixed-interval pull from the jitter buffer
struct PlayoutLoop<S> {
    buffer: SharedJitterBuffer,
    stats: Arc<BridgeStats>,
    sink: S,
    period: Duration,
    prefill: usize,
}

impl<S: PlayoutSink> PlayoutLoop<S> {
    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut primed = self.prefill == 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }

            if !primed {
                if self.buffer.size() < self.prefill {
                    continue;
                }
                primed = true;
                tracing::debug!(buffered = self.buffer.size(), "Playout started");
            }

            let playout = self.buffer.get_with_loss();
            if playout.lost > 0 {
                self.stats.record_lost(playout.lost);
            }
            match playout.packet {
                Some(packet) => self.sink.play(packet),
                None => self.sink.underrun(),
            }
        }

        tracing::debug!("Playout loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use tokio::net::UdpSocket;
    use tokio::time::timeout;

    fn test_config(remote: Option<SocketAddr>) -> BridgeConfig {
        let mut config = BridgeConfig::default();
        config.network.bind_address = IpAddr::V4(Ipv4Addr::LOCALHOST);
        config.network.rtp_port = 0;
        config.network.remote = remote;
        config.jitter.prefill_packets = 0;
        config.audio.frame_ms = 5;
        config
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met in time");
    }

    #[tokio::test]
    async fn test_inbound_packets_played_in_order() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut config = test_config(None);
        config.jitter.prefill_packets = 5;
        config.jitter.skip_threshold = 100;

        let (tx, mut rx) = mpsc::unbounded_channel::<RtpPacket>();
        let session = BridgeSession::start(&config, tx).await.unwrap();
        assert_eq!(session.stats().state(), BridgeState::Initializing);

        for seq in [3u16, 1, 5, 2, 4] {
            let packet = RtpPacket::new(0, seq, seq as u32 * 160, 0xABCD, vec![seq as u8]);
            peer.send_to(&packet.serialize(), session.local_addr()).await.unwrap();
        }

        let mut played = Vec::new();
        for _ in 0..5 {
            let packet = timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
            played.push(packet.sequence());
        }
        assert_eq!(played, vec![1, 2, 3, 4, 5]);

        assert_eq!(session.stats().state(), BridgeState::Active);
        assert_eq!(session.stats().rtp_packets_received(), 5);
        assert_eq!(session.remote_addr(), Some(peer.local_addr().unwrap()));

        let snapshot = session.stop().await;
        assert_eq!(snapshot.state, BridgeState::Closed);
        assert_eq!(snapshot.rtp.packets_lost, 0);
    }

    #[tokio::test]
    async fn test_malformed_datagrams_counted() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel::<RtpPacket>();
        let session = BridgeSession::start(&test_config(None), tx).await.unwrap();

        peer.send_to(b"junk", session.local_addr()).await.unwrap();
        let packet = RtpPacket::new(0, 1, 0, 1, vec![1u8]);
        peer.send_to(&packet.serialize(), session.local_addr()).await.unwrap();

        let played = timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
        assert_eq!(played.sequence(), 1);
        assert_eq!(session.stats().rtp_packets_invalid(), 1);
        assert_eq!(session.stats().rtp_packets_received(), 1);

        session.stop().await;
    }

    #[tokio::test]
    async fn test_loss_reaches_stats() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut config = test_config(None);
        config.jitter.skip_threshold = 3;

        let (tx, mut rx) = mpsc::unbounded_channel::<RtpPacket>();
        let session = BridgeSession::start(&config, tx).await.unwrap();

        let first = RtpPacket::new(0, 10, 0, 1, vec![0u8]);
        peer.send_to(&first.serialize(), session.local_addr()).await.unwrap();
        timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();

        let after_gap = RtpPacket::new(0, 13, 0, 1, vec![0u8]);
        peer.send_to(&after_gap.serialize(), session.local_addr()).await.unwrap();
        let played = timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
        assert_eq!(played.sequence(), 13);

        assert_eq!(session.stats().rtp_packets_lost(), 2);
        session.stop().await;
    }

    #[tokio::test]
    async fn test_outbound_audio_sent_as_rtp() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut config = test_config(Some(peer.local_addr().unwrap()));
        config.audio.payload_type = 111;

        let (tx, _rx) = mpsc::unbounded_channel::<RtpPacket>();
        let session = BridgeSession::start(&config, tx).await.unwrap();

        assert!(session.send_audio(Bytes::from_static(b"frame-1")).await);
        assert!(session.send_audio(Bytes::from_static(b"frame-2")).await);

        let mut buf = [0u8; 1500];
        let mut received = Vec::new();
        for _ in 0..2 {
            let (len, from) = timeout(Duration::from_secs(2), peer.recv_from(&mut buf))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(from, session.local_addr());
            received.push(RtpPacket::parse(&buf[..len]).unwrap());
        }

        assert_eq!(&received[0].payload()[..], b"frame-1");
        assert_eq!(received[0].payload_type(), 111);
        assert!(received[0].marker());
        assert_eq!(received[1].sequence(), received[0].sequence().wrapping_add(1));
        // 5ms at 48kHz
        assert_eq!(received[1].timestamp().wrapping_sub(received[0].timestamp()), 240);

        let stats = session.stats().clone();
        wait_until(|| stats.rtp_packets_sent() == 2).await;

        let outbound = session.outbound();
        session.stop().await;
        assert!(!outbound.send(Bytes::from_static(b"late")).await);
    }

    #[tokio::test]
    async fn test_stop_clears_buffer() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut config = test_config(None);
        // Never primed, so packets stay buffered
        config.jitter.prefill_packets = 10;

        let (tx, _rx) = mpsc::unbounded_channel::<RtpPacket>();
        let session = BridgeSession::start(&config, tx).await.unwrap();

        for seq in 0..3u16 {
            let packet = RtpPacket::new(0, seq, 0, 1, vec![0u8]);
            peer.send_to(&packet.serialize(), session.local_addr()).await.unwrap();
        }

        let buffer = session.jitter_buffer().clone();
        wait_until(|| buffer.size() == 3).await;

        let snapshot = session.stop().await;
        assert_eq!(buffer.size(), 0);
        assert_eq!(snapshot.state, BridgeState::Closed);
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let mut config = test_config(None);
        config.jitter.skip_threshold = 0;
        let (tx, _rx) = mpsc::unbounded_channel::<RtpPacket>();
        assert!(BridgeSession::start(&config, tx).await.is_err());
    }
}
