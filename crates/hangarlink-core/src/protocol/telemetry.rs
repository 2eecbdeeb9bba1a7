//! Telemetry model
//!
//! Last-known drone/hangar state and distance, each with the instant of its
//! last update. The freshness watchdog clears any field not refreshed within
//! the staleness threshold; clearing also refreshes the timestamp so a stale
//! field is reset once per episode, not every check.

use std::time::{Duration, Instant};

use super::wire::{format_distance, DroneState, HangarState};

/// Read-only copy of the telemetry fields at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TelemetrySnapshot {
    /// Drone flight state, if fresh
    pub drone_state: Option<DroneState>,
    /// Hangar alarm state, if fresh
    pub hangar_state: Option<HangarState>,
    /// Drone distance, if fresh
    pub distance: Option<f64>,
}

impl TelemetrySnapshot {
    /// Distance rendered for display; integral values have no fractional
    /// part. `None` while the field holds the unknown placeholder.
    pub fn distance_text(&self) -> Option<String> {
        self.distance.map(format_distance)
    }
}

/// Mutable telemetry state owned by the session's listener loop
pub struct Telemetry {
    drone_state: Option<DroneState>,
    drone_updated: Instant,
    hangar_state: Option<HangarState>,
    hangar_updated: Instant,
    distance: Option<f64>,
    distance_updated: Instant,
}

impl Telemetry {
    /// Create empty telemetry with all freshness timers starting now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            drone_state: None,
            drone_updated: now,
            hangar_state: None,
            hangar_updated: now,
            distance: None,
            distance_updated: now,
        }
    }

    /// Record a drone state update.
    pub fn set_drone_state(&mut self, state: DroneState, now: Instant) {
        self.drone_state = Some(state);
        self.drone_updated = now;
    }

    /// Record a hangar state update.
    pub fn set_hangar_state(&mut self, state: HangarState, now: Instant) {
        self.hangar_state = Some(state);
        self.hangar_updated = now;
    }

    /// Record a distance update.
    pub fn set_distance(&mut self, distance: f64, now: Instant) {
        self.distance = Some(distance);
        self.distance_updated = now;
    }

    /// Restart all freshness timers (called when the listener loop starts).
    pub fn restart_timers(&mut self, now: Instant) {
        self.drone_updated = now;
        self.hangar_updated = now;
        self.distance_updated = now;
    }

    /// Clear fields whose last update is older than `threshold`.
    ///
    /// Returns `true` when at least one field was cleared.
    pub fn expire_stale(&mut self, threshold: Duration, now: Instant) -> bool {
        let mut expired = false;

        if self.drone_state.is_some() && now.duration_since(self.drone_updated) > threshold {
            tracing::debug!("Drone state stale, clearing");
            self.drone_state = None;
            self.drone_updated = now;
            expired = true;
        }
        if self.hangar_state.is_some() && now.duration_since(self.hangar_updated) > threshold {
            tracing::debug!("Hangar state stale, clearing");
            self.hangar_state = None;
            self.hangar_updated = now;
            expired = true;
        }
        if self.distance.is_some() && now.duration_since(self.distance_updated) > threshold {
            tracing::debug!("Distance stale, clearing");
            self.distance = None;
            self.distance_updated = now;
            expired = true;
        }

        expired
    }

    /// Reset every field to the unknown placeholder.
    pub fn clear(&mut self) {
        self.drone_state = None;
        self.hangar_state = None;
        self.distance = None;
    }

    /// Copy out the current field values.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            drone_state: self.drone_state,
            hangar_state: self.hangar_state,
            distance: self.distance,
        }
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_updates_and_snapshot() {
        let mut telemetry = Telemetry::new();
        let now = Instant::now();
        telemetry.set_drone_state(DroneState::TakingOff, now);
        telemetry.set_distance(12.0, now);

        let snap = telemetry.snapshot();
        assert_eq!(snap.drone_state, Some(DroneState::TakingOff));
        assert_eq!(snap.hangar_state, None);
        assert_eq!(snap.distance, Some(12.0));
        assert_eq!(snap.distance_text().as_deref(), Some("12"));
    }

    #[test]
    fn test_fresh_field_survives_check() {
        let mut telemetry = Telemetry::new();
        let t0 = Instant::now();
        telemetry.set_drone_state(DroneState::Operating, t0);

        let before_threshold = t0 + Duration::from_millis(2999);
        assert!(!telemetry.expire_stale(Duration::from_millis(3000), before_threshold));
        assert_eq!(
            telemetry.snapshot().drone_state,
            Some(DroneState::Operating)
        );
    }

    #[test]
    fn test_stale_field_is_cleared_once() {
        let mut telemetry = Telemetry::new();
        let t0 = Instant::now();
        let threshold = Duration::from_millis(3000);
        telemetry.set_drone_state(DroneState::Landing, t0);

        let past_threshold = t0 + Duration::from_millis(3001);
        assert!(telemetry.expire_stale(threshold, past_threshold));
        assert_eq!(telemetry.snapshot().drone_state, None);

        // The timestamp was refreshed, so the next check does not fire again.
        assert!(!telemetry.expire_stale(threshold, past_threshold + Duration::from_millis(1)));
    }

    #[test]
    fn test_fields_expire_independently() {
        let mut telemetry = Telemetry::new();
        let t0 = Instant::now();
        let threshold = Duration::from_millis(100);
        telemetry.set_drone_state(DroneState::Rest, t0);
        telemetry.set_hangar_state(HangarState::Normal, t0 + Duration::from_millis(90));

        let check = t0 + Duration::from_millis(150);
        assert!(telemetry.expire_stale(threshold, check));
        let snap = telemetry.snapshot();
        assert_eq!(snap.drone_state, None);
        assert_eq!(snap.hangar_state, Some(HangarState::Normal));
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut telemetry = Telemetry::new();
        let now = Instant::now();
        telemetry.set_drone_state(DroneState::Rest, now);
        telemetry.set_hangar_state(HangarState::Alarm, now);
        telemetry.set_distance(1.5, now);
        telemetry.clear();
        assert_eq!(telemetry.snapshot(), TelemetrySnapshot::default());
    }
}
