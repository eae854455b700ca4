use super::cycle_timer::CycleTimer;
use super::emergency_tracker::EmergencyTracker;
use super::lane_gate::LaneGatePolicy;
use crate::config::{ControllerConfig, PostEmergencyPhase};
use crate::detection::{tally_detections, Detection, Detector, IngestFilter, VehicleTally};
use crate::publisher::StatePublisher;
use crate::shared_data::{MainLight, Mode, TrafficState};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    pub detection_cycles: u64,
    pub detector_failures: u64,
    pub malformed_detections: u64,
    pub emergency_entries: u64,
    pub phase_flips: u64,
}

impl fmt::Display for LoopStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ticks={} detection_cycles={} detector_failures={} malformed={} emergencies={} flips={}",
            self.ticks,
            self.detection_cycles,
            self.detector_failures,
            self.malformed_detections,
            self.emergency_entries,
            self.phase_flips
        )
    }
}

/// Owns every piece of decision state for one intersection.
///
/// Single threaded and synchronous: `tick` never waits on I/O. Per tick the
/// emergency tracker sees the newest tally first, so a sighting takes effect
/// on the same tick, and the cycle clock is restarted exactly once when the
/// override lifts.
pub struct ControlLoop {
    timer: CycleTimer,
    emergency: EmergencyTracker,
    gate: LaneGatePolicy,
    filter: IngestFilter,
    post_emergency: PostEmergencyPhase,
    tally: VehicleTally,
    /// Set when a detection cycle delivered a tally that `tick` has not seen.
    fresh_tally: bool,
    state: TrafficState,
    stats: LoopStats,
}

impl ControlLoop {
    pub fn new(config: &ControllerConfig, now: Instant) -> Self {
        Self::from_parts(
            CycleTimer::new(config.cycle_interval(), now),
            EmergencyTracker::new(config.emergency_cooldown()),
            LaneGatePolicy::new(config.lane_gate_threshold),
            IngestFilter {
                confidence_threshold: config.confidence_threshold,
                region_of_interest: config.region_of_interest,
            },
        )
        .with_post_emergency_phase(config.post_emergency_phase)
    }

    pub fn from_parts(
        timer: CycleTimer,
        emergency: EmergencyTracker,
        gate: LaneGatePolicy,
        filter: IngestFilter,
    ) -> Self {
        let state = TrafficState::normal(timer.phase(), gate.decide(0), timer.interval());
        Self {
            timer,
            emergency,
            gate,
            filter,
            post_emergency: PostEmergencyPhase::Resume,
            tally: VehicleTally::default(),
            fresh_tally: false,
            state,
            stats: LoopStats::default(),
        }
    }

    pub fn state(&self) -> &TrafficState {
        &self.state
    }

    pub fn tally(&self) -> &VehicleTally {
        &self.tally
    }

    pub fn with_post_emergency_phase(mut self, phase: PostEmergencyPhase) -> Self {
        self.post_emergency = phase;
        self
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    pub fn cycle_timer(&self) -> &CycleTimer {
        &self.timer
    }

    pub fn emergency_tracker(&self) -> &EmergencyTracker {
        &self.emergency
    }

    /// Replaces the tally with the result of one detection cycle.
    pub fn ingest(&mut self, detections: &[Detection]) -> &VehicleTally {
        let report = tally_detections(detections, &self.filter);
        self.stats.detection_cycles += 1;
        if !report.dropped.is_empty() {
            self.stats.malformed_detections += report.dropped.len() as u64;
            for issue in &report.dropped {
                log::warn!("[Control] dropped detection: {}", issue);
            }
        }
        self.set_tally(report.tally);
        &self.tally
    }

    /// Installs an already reduced tally as the newest detection cycle.
    pub fn set_tally(&mut self, tally: VehicleTally) {
        self.tally = tally;
        self.fresh_tally = true;
    }

    /// A failed cycle keeps the previous tally for capacity decisions but
    /// does not count as a fresh emergency sighting.
    pub fn ingest_failure(&mut self, err: &anyhow::Error) {
        self.stats.detector_failures += 1;
        log::warn!(
            "[Control] detection cycle failed, reusing last tally ({} vehicles): {:#}",
            self.tally.total(),
            err
        );
    }

    pub fn tick(&mut self, now: Instant) -> TrafficState {
        self.stats.ticks += 1;

        if self.fresh_tally {
            self.fresh_tally = false;
            if self.tally.has_emergency() && self.emergency.observe(self.tally.emergency_count, now)
            {
                self.stats.emergency_entries += 1;
                log::info!(
                    "[Control] EMERGENCY override: {} emergency vehicle(s) in view, main light forced RED, gate OPEN",
                    self.tally.emergency_count
                );
            }
        }

        if self.emergency.tick(now) {
            match self.post_emergency {
                PostEmergencyPhase::Resume => self.timer.reset(now),
                PostEmergencyPhase::Red => self.timer.restart(now, MainLight::Red),
            }
            log::info!(
                "[Control] Emergency cleared after {:?} without sightings, resuming {:?} with a fresh {:?} cycle",
                self.emergency.cooldown(),
                self.timer.phase(),
                self.timer.interval()
            );
        }

        let state = if self.emergency.is_active() {
            TrafficState::emergency()
        } else {
            if self.timer.tick(now) {
                self.stats.phase_flips += 1;
                log::info!("[Control] Main light switching to {:?}", self.timer.phase());
            }
            TrafficState::normal(
                self.timer.phase(),
                self.gate.decide(self.tally.total()),
                self.timer.remaining(now),
            )
        };

        if state.mode == Mode::Normal
            && self.state.mode == Mode::Normal
            && state.lane_light != self.state.lane_light
        {
            log::info!(
                "[Control] Lane gate {:?} ({} vehicles, threshold {})",
                state.lane_light,
                self.tally.total(),
                self.gate.threshold()
            );
        }

        self.state = state;
        state
    }

    /// Runs one tick and hands the result to the publisher without waiting.
    pub fn tick_and_publish(&mut self, now: Instant, publisher: &StatePublisher) -> TrafficState {
        let state = self.tick(now);
        publisher.publish(&state, now);
        state
    }
}

/// Drives the control loop at the configured tick rate until `cancel`
/// fires, running detection every `frame_skip` ticks. Returns the loop
/// statistics after the publisher has flushed.
pub async fn run_control_loop<D: Detector>(
    mut control: ControlLoop,
    mut detector: D,
    publisher: StatePublisher,
    config: &ControllerConfig,
    cancel: CancellationToken,
) -> LoopStats {
    let tick_interval = config.tick_interval();
    let frame_skip = u64::from(config.frame_skip.max(1));
    let mut ticker = tokio::time::interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut frame: u64 = 0;

    log::info!(
        "[Control] Loop started: tick {:?}, detection every {} ticks, cycle {:?}",
        tick_interval,
        frame_skip,
        config.cycle_interval()
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                frame += 1;
                if frame % frame_skip == 0 {
                    run_detection(&mut control, &mut detector, tick_interval);
                }
                let now = Instant::now();
                let state = control.tick_and_publish(now, &publisher);
                log::debug!("[Control] {}", state.status_line(control.tally().total()));
            }
            _ = cancel.cancelled() => {
                log::info!("[Control] Loop shutting down");
                break;
            }
        }
    }

    let stats = *control.stats();
    let publisher_stats = publisher.stats();
    publisher.shutdown().await;
    log::info!("[Control] {}", stats);
    log::info!("[Publisher] {}", publisher_stats);
    stats
}

fn run_detection<D: Detector>(control: &mut ControlLoop, detector: &mut D, budget: Duration) {
    let started = Instant::now();
    match detector.detect() {
        Ok(detections) => {
            control.ingest(&detections);
        }
        Err(err) => control.ingest_failure(&err),
    }
    let took = started.elapsed();
    if took > budget {
        log::warn!(
            "[Control] detection took {:?}, longer than the {:?} frame interval",
            took,
            budget
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared_data::LaneLight;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    fn control(t0: Instant) -> ControlLoop {
        ControlLoop::from_parts(
            CycleTimer::new(secs(30.0), t0),
            EmergencyTracker::new(secs(10.0)),
            LaneGatePolicy::new(6),
            IngestFilter::default(),
        )
    }

    #[test]
    fn sighting_takes_effect_on_the_same_tick() {
        let t0 = Instant::now();
        let mut control = control(t0);
        control.set_tally(VehicleTally::new(2, 1));
        let state = control.tick(t0 + secs(1.0));
        assert_eq!(state, TrafficState::emergency());
        assert_eq!(control.stats().emergency_entries, 1);
    }

    #[test]
    fn cycle_clock_does_not_advance_during_override() {
        let t0 = Instant::now();
        let mut control = control(t0);
        control.set_tally(VehicleTally::new(0, 1));
        control.tick(t0 + secs(5.0));

        control.set_tally(VehicleTally::new(0, 0));
        for s in 6..=15 {
            let state = control.tick(t0 + secs(s as f64));
            assert_eq!(state.mode, Mode::Emergency);
        }
        assert_eq!(control.cycle_timer().phase_started_at(), t0);

        let state = control.tick(t0 + secs(15.5));
        assert_eq!(state.mode, Mode::Normal);
        assert_eq!(control.cycle_timer().phase_started_at(), t0 + secs(15.5));
        assert_eq!(state.countdown, secs(30.0));
    }

    #[test]
    fn stale_tally_does_not_extend_the_override() {
        let t0 = Instant::now();
        let mut control = control(t0);
        control.set_tally(VehicleTally::new(0, 1));
        control.tick(t0);

        // detector keeps failing, tally still shows the ambulance
        let err = anyhow::anyhow!("camera lost");
        for s in 1..=10 {
            control.ingest_failure(&err);
            control.tick(t0 + secs(s as f64));
        }
        let state = control.tick(t0 + secs(10.5));
        assert_eq!(state.mode, Mode::Normal);
        assert_eq!(control.stats().detector_failures, 10);
    }

    #[test]
    fn failed_cycle_keeps_lane_decision() {
        let t0 = Instant::now();
        let mut control = control(t0);
        control.set_tally(VehicleTally::new(9, 0));
        assert_eq!(control.tick(t0).lane_light, LaneLight::Closed);

        control.ingest_failure(&anyhow::anyhow!("timeout"));
        assert_eq!(control.tick(t0 + secs(0.1)).lane_light, LaneLight::Closed);
    }

    #[test]
    fn ingest_counts_malformed_detections() {
        use crate::detection::BoundingBox;
        let t0 = Instant::now();
        let mut control = control(t0);
        let bbox = BoundingBox::new(5.0, 5.0, 2.0, 2.0);
        let tally = *control.ingest(&[
            Detection::from_label("Car", 0.9, bbox),
            Detection::from_label("Car", -0.1, bbox),
            Detection::from_label("Emergency", 0.8, bbox),
        ]);
        assert_eq!(tally.total(), 2);
        assert_eq!(control.stats().malformed_detections, 1);
        assert_eq!(control.stats().detection_cycles, 1);
    }

    #[test]
    fn normal_mode_mirrors_timer_and_gate() {
        let t0 = Instant::now();
        let mut control = control(t0);
        control.set_tally(VehicleTally::new(3, 0));
        let state = control.tick(t0);
        assert_eq!(state.main_light, MainLight::Red);
        assert_eq!(state.lane_light, LaneLight::Open);
        assert_eq!(state.mode, Mode::Normal);

        let state = control.tick(t0 + secs(31.0));
        assert_eq!(state.main_light, MainLight::Green);
        assert_eq!(control.stats().phase_flips, 1);
    }
}
