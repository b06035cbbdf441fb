/// Liveness tracking for the telemetry feed
use tokio::time::{Duration, Instant};

use crate::models::ConnectionState;

/// How often the telemetry source asks for a liveness check
pub const CHECK_INTERVAL: Duration = Duration::from_secs(2);
/// Silence after which the device is declared offline
pub const TIMEOUT: Duration = Duration::from_secs(10);

/// Tracks when data was last seen and whether the device counts as online.
///
/// Time is passed in by the caller so the pipeline decides what "now" is.
#[derive(Debug, Clone)]
pub struct Watchdog {
    last_seen: Instant,
    state: ConnectionState,
}

impl Watchdog {
    pub fn new(now: Instant) -> Self {
        Self {
            last_seen: now,
            state: ConnectionState::Offline,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Start watching from `now`, e.g. when telemetry mode is entered
    pub fn arm(&mut self, now: Instant) {
        self.last_seen = now;
    }

    /// A data message arrived: the device is alive
    pub fn record_data(&mut self, now: Instant) -> bool {
        self.last_seen = now;
        self.set(ConnectionState::Online)
    }

    /// Explicit status message from the device
    pub fn apply_status(&mut self, online: bool) -> bool {
        self.set(if online {
            ConnectionState::Online
        } else {
            ConnectionState::Offline
        })
    }

    /// Periodic check. Returns true if the device was just declared offline.
    pub fn check(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_seen) > TIMEOUT {
            self.set(ConnectionState::Offline)
        } else {
            false
        }
    }

    /// Telemetry mode was left
    pub fn force_offline(&mut self) -> bool {
        self.set(ConnectionState::Offline)
    }

    fn set(&mut self, state: ConnectionState) -> bool {
        let changed = self.state != state;
        self.state = state;
        changed
    }
}
