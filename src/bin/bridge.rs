//! RTP Bridge Application
//!
//! Runs one bridge session. Audio pulled from the jitter buffer is echoed back
//! to the RTP peer, which makes the binary usable as a loopback target for a
//! SIP endpoint while the platform side is wired elsewhere.

use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rtp_media_bridge::{
    bridge::{BridgeSession, BridgeState},
    config::BridgeConfig,
    monitor::MonitorServer,
    protocol::RtpPacket,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting RTP media bridge");

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = BridgeConfig::load_or_default(config_path.as_deref())?;

    let (played_tx, mut played_rx) = mpsc::unbounded_channel::<RtpPacket>();
    let session = BridgeSession::start(&config, played_tx).await?;

    tracing::info!("RTP listening on {}", session.local_addr());
    match config.network.remote {
        Some(remote) => tracing::info!("Sending RTP to {}", remote),
        None => tracing::info!("Remote peer will be latched from the first inbound packet"),
    }

    let monitor = config.monitor.enabled.then(|| {
        MonitorServer::new(
            config.monitor.clone(),
            session.stats().clone(),
            session.jitter_buffer().clone(),
        )
        .start_background()
    });

    // Echo played audio back to the peer
    let outbound = session.outbound();
    let echo = tokio::spawn(async move {
        while let Some(packet) = played_rx.recv().await {
            if !outbound.send(packet.payload().clone()).await {
                break;
            }
        }
    });

    let mut stats_interval = tokio::time::interval(Duration::from_secs(5));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown requested");
                break;
            }
            _ = stats_interval.tick() => {
                let snapshot = session.snapshot();
                let jitter = session.jitter_buffer().get_stats();
                tracing::info!(
                    "Bridge {}: {} received, {} sent, {} lost ({:.1}% loss), {} invalid, jitter buffer: {} queued, {} late, {} resyncs",
                    snapshot.state,
                    snapshot.rtp.packets_received,
                    snapshot.rtp.packets_sent,
                    snapshot.rtp.packets_lost,
                    snapshot.rtp.loss_rate * 100.0,
                    snapshot.rtp.packets_invalid,
                    jitter.current_size,
                    jitter.packets_late,
                    jitter.resyncs,
                );

                if snapshot.state == BridgeState::Failed {
                    tracing::error!("Transport failed, shutting down");
                    break;
                }
            }
        }
    }

    let snapshot = session.stop().await;
    echo.abort();
    if let Some(monitor) = monitor {
        monitor.abort();
    }

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
