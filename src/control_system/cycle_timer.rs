use crate::shared_data::MainLight;
use std::time::{Duration, Instant};

/// Fixed-interval RED/GREEN alternation for the main light.
///
/// `tick` is the only call that can change the phase. All elapsed-time
/// arithmetic saturates, so a timestamp earlier than the phase start reads
/// as zero elapsed and can never cause a flip.
#[derive(Debug, Clone)]
pub struct CycleTimer {
    phase: MainLight,
    phase_started_at: Instant,
    interval: Duration,
}

impl CycleTimer {
    /// Starts in RED at `now`.
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            phase: MainLight::Red,
            phase_started_at: now,
            interval,
        }
    }

    pub fn phase(&self) -> MainLight {
        self.phase
    }

    pub fn phase_started_at(&self) -> Instant {
        self.phase_started_at
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.phase_started_at)
    }

    /// Time left in the current phase, floored at zero.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.interval.saturating_sub(self.elapsed(now))
    }

    /// Flips the phase once the interval has been exceeded. Returns whether
    /// a flip happened. Calling it twice with the same `now` is a no-op the
    /// second time.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.elapsed(now) > self.interval {
            self.phase = self.phase.flipped();
            self.phase_started_at = now;
            true
        } else {
            false
        }
    }

    /// Restarts the current phase at `now` without changing it.
    pub fn reset(&mut self, now: Instant) {
        self.phase_started_at = now;
    }

    /// Restarts the clock at `now` in the given phase.
    pub fn restart(&mut self, now: Instant, phase: MainLight) {
        self.phase = phase;
        self.phase_started_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn starts_red_with_full_interval() {
        let t0 = Instant::now();
        let timer = CycleTimer::new(secs(30.0), t0);
        assert_eq!(timer.phase(), MainLight::Red);
        assert_eq!(timer.remaining(t0), secs(30.0));
    }

    #[test]
    fn flips_only_after_interval_is_exceeded() {
        let t0 = Instant::now();
        let mut timer = CycleTimer::new(secs(30.0), t0);

        assert!(!timer.tick(t0 + secs(30.0)));
        assert_eq!(timer.phase(), MainLight::Red);

        assert!(timer.tick(t0 + secs(31.0)));
        assert_eq!(timer.phase(), MainLight::Green);
        assert_eq!(timer.phase_started_at(), t0 + secs(31.0));
    }

    #[test]
    fn tick_is_idempotent_for_same_timestamp() {
        let t0 = Instant::now();
        let mut timer = CycleTimer::new(secs(5.0), t0);
        let t = t0 + secs(6.0);
        assert!(timer.tick(t));
        assert!(!timer.tick(t));
        assert_eq!(timer.phase(), MainLight::Green);
    }

    #[test]
    fn alternates_strictly_and_counts_flips() {
        let t0 = Instant::now();
        let interval = secs(10.0);
        let mut timer = CycleTimer::new(interval, t0);
        let mut flips = 0;
        let mut expected = MainLight::Red;

        // 100ms ticks for 95 seconds
        for i in 1..=950u32 {
            let now = t0 + Duration::from_millis(100 * i as u64);
            if timer.tick(now) {
                flips += 1;
                expected = expected.flipped();
            }
            assert_eq!(timer.phase(), expected);
        }
        // each flip lands on the first tick strictly past the boundary
        assert_eq!(flips, 9);
    }

    #[test]
    fn skipped_ticks_only_delay_the_flip() {
        let t0 = Instant::now();
        let mut timer = CycleTimer::new(secs(10.0), t0);
        assert!(timer.tick(t0 + secs(45.0)));
        assert_eq!(timer.phase(), MainLight::Green);
        assert_eq!(timer.remaining(t0 + secs(45.0)), secs(10.0));
    }

    #[test]
    fn backward_timestamp_reads_as_zero_elapsed() {
        let t0 = Instant::now() + secs(100.0);
        let mut timer = CycleTimer::new(secs(10.0), t0);
        let earlier = t0 - secs(50.0);
        assert_eq!(timer.elapsed(earlier), Duration::ZERO);
        assert!(!timer.tick(earlier));
        assert_eq!(timer.remaining(earlier), secs(10.0));
    }

    #[test]
    fn remaining_floors_at_zero() {
        let t0 = Instant::now();
        let timer = CycleTimer::new(secs(10.0), t0);
        assert_eq!(timer.remaining(t0 + secs(25.0)), Duration::ZERO);
    }

    #[test]
    fn reset_keeps_phase_and_restarts_clock() {
        let t0 = Instant::now();
        let mut timer = CycleTimer::new(secs(10.0), t0);
        timer.tick(t0 + secs(11.0));
        timer.reset(t0 + secs(15.0));
        assert_eq!(timer.phase(), MainLight::Green);
        assert_eq!(timer.phase_started_at(), t0 + secs(15.0));
        assert!(!timer.tick(t0 + secs(24.0)));
    }

    #[test]
    fn restart_forces_phase() {
        let t0 = Instant::now();
        let mut timer = CycleTimer::new(secs(10.0), t0);
        timer.tick(t0 + secs(11.0));
        timer.restart(t0 + secs(12.0), MainLight::Red);
        assert_eq!(timer.phase(), MainLight::Red);
        assert_eq!(timer.remaining(t0 + secs(12.0)), secs(10.0));
    }
}
