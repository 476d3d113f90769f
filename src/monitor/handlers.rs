//! HTTP API handlers

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::audio::JitterBufferStats;
use crate::bridge::{BridgeSnapshot, BridgeState};
use crate::monitor::server::AppState;

/// Liveness plus current bridge state
#[derive(Debug, Serialize)]
pub struct Health {
    pub status: BridgeState,
    pub uptime_seconds: f64,
}

pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<Health> {
    Json(Health {
        status: state.stats.state(),
        uptime_seconds: state.stats.uptime_seconds(),
    })
}

pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<BridgeSnapshot> {
    Json(state.stats.to_snapshot())
}

pub async fn get_jitter_stats(State(state): State<Arc<AppState>>) -> Json<JitterBufferStats> {
    Json(state.jitter_buffer.get_stats())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::JitterBuffer;
    use crate::bridge::BridgeStats;
    use crate::protocol::RtpPacket;
    use uuid::Uuid;

    fn app_state() -> Arc<AppState> {
        Arc::new(AppState {
            stats: Arc::new(BridgeStats::new(Uuid::new_v4())),
            jitter_buffer: Arc::new(JitterBuffer::new(4)),
        })
    }

    #[tokio::test]
    async fn test_health_reports_state() {
        let state = app_state();
        state.stats.transition(BridgeState::Active).unwrap();

        let Json(health) = get_health(State(state)).await;
        let json = serde_json::to_value(&health).unwrap();
        assert_eq!(json["status"], "active");
    }

    #[tokio::test]
    async fn test_stats_snapshot() {
        let state = app_state();
        state.stats.record_received(9);
        state.stats.record_lost(1);

        let Json(snapshot) = get_stats(State(state)).await;
        assert_eq!(snapshot.state, BridgeState::Initializing);
        assert_eq!(snapshot.rtp.packets_received, 9);
        assert!((snapshot.rtp.loss_rate - 0.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_jitter_stats() {
        let state = app_state();
        state.jitter_buffer.put(RtpPacket::new(0, 1, 0, 1, vec![0u8]));

        let Json(stats) = get_jitter_stats(State(state)).await;
        assert_eq!(stats.packets_in, 1);
        assert_eq!(stats.current_size, 1);
    }
}
