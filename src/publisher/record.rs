use crate::shared_data::TrafficState;
use std::time::{Duration, Instant};

/// What the store last accepted, plus the most recent failed attempt.
#[derive(Debug, Clone, Default)]
pub struct PublishRecord {
    last_published: Option<TrafficState>,
    last_published_at: Option<Instant>,
    last_failure: Option<(TrafficState, Instant)>,
}

impl PublishRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_published(&self) -> Option<&TrafficState> {
        self.last_published.as_ref()
    }

    pub fn last_published_at(&self) -> Option<Instant> {
        self.last_published_at
    }

    /// A state is due when it differs from what the store holds, or when the
    /// store has not heard from us for longer than the heartbeat. A state
    /// that just failed is held back for `retry_backoff`.
    pub fn is_due(
        &self,
        state: &TrafficState,
        now: Instant,
        heartbeat: Duration,
        retry_backoff: Duration,
    ) -> bool {
        if let Some((failed, failed_at)) = &self.last_failure {
            let backing_off = now.saturating_duration_since(*failed_at) < retry_backoff;
            if !state.differs_from(failed) && backing_off {
                return false;
            }
        }

        match (&self.last_published, self.last_published_at) {
            (Some(previous), Some(at)) => {
                state.differs_from(previous) || now.saturating_duration_since(at) > heartbeat
            }
            _ => true,
        }
    }

    pub fn mark_sent(&mut self, state: TrafficState, at: Instant) {
        self.last_published = Some(state);
        self.last_published_at = Some(at);
        self.last_failure = None;
    }

    /// Leaves the published fields untouched so the next eligible tick retries.
    pub fn mark_failed(&mut self, state: TrafficState, at: Instant) {
        self.last_failure = Some((state, at));
    }
}
