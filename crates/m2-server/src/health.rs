//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

use crate::gateway::GatewayStats;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Current WebSocket connection count, device included.
    pub connections: usize,
    /// Whether a device is connected.
    pub device_online: bool,
    /// Device messages in the last rate window.
    pub rate: usize,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, stats: &GatewayStats) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections: stats.connections(),
        device_online: stats.device_online(),
        rate: stats.rate(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_ok() {
        let resp = health_check(Instant::now(), &GatewayStats::default());
        assert_eq!(resp.status, "ok");
        assert!(!resp.device_online);
    }

    #[test]
    fn uptime_increases() {
        let start = Instant::now()
            .checked_sub(std::time::Duration::from_secs(60))
            .unwrap();
        let resp = health_check(start, &GatewayStats::default());
        assert!(resp.uptime_secs >= 59);
    }

    #[test]
    fn serialization() {
        let resp = health_check(Instant::now(), &GatewayStats::default());
        let parsed = serde_json::to_value(&resp).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["connections"], 0);
        assert_eq!(parsed["device_online"], false);
        assert_eq!(parsed["rate"], 0);
        assert!(parsed["uptime_secs"].is_number());
    }
}
