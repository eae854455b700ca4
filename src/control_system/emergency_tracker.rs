use std::time::{Duration, Instant};

/// Latches emergency mode on any sighting and releases it only after the
/// cooldown has passed with no further sightings.
#[derive(Debug, Clone)]
pub struct EmergencyTracker {
    active: bool,
    last_seen_at: Option<Instant>,
    cooldown: Duration,
}

impl EmergencyTracker {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            active: false,
            last_seen_at: None,
            cooldown,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn last_seen_at(&self) -> Option<Instant> {
        self.last_seen_at
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Records a detection cycle. Any positive count activates the override
    /// and refreshes the cooldown clock, regardless of how many emergency
    /// vehicles were seen. Returns true when this call entered emergency mode.
    pub fn observe(&mut self, emergency_count: u32, now: Instant) -> bool {
        if emergency_count == 0 {
            return false;
        }
        let entered = !self.active;
        self.active = true;
        self.last_seen_at = Some(now);
        entered
    }

    /// Returns true exactly once, on the tick that leaves emergency mode.
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.active {
            return false;
        }
        let quiet_for = self
            .last_seen_at
            .map(|seen| now.saturating_duration_since(seen))
            .unwrap_or(Duration::ZERO);
        if quiet_for > self.cooldown {
            self.active = false;
            true
        } else {
            false
        }
    }
}
