use super::types::{BoundingBox, Detection, VehicleClass};
use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

/// Source of detection cycles. Implementations must return within one frame
/// interval; an error means the cycle is skipped and the last tally reused.
pub trait Detector: Send {
    fn detect(&mut self) -> Result<Vec<Detection>>;
}

/// Settings for the synthetic traffic generator.
#[derive(Debug, Clone, Copy)]
pub struct SimulationProfile {
    pub max_vehicles: u32,
    /// Chance that a given vehicle is something other than a car or ambulance.
    pub other_probability: f64,
    /// Chance per cycle that an emergency vehicle starts approaching.
    pub emergency_probability: f64,
    /// Detection cycles an emergency vehicle stays in frame once it appears.
    pub emergency_cycles: u32,
    /// Chance per cycle that an in-frame emergency vehicle is missed.
    pub miss_probability: f64,
    /// Chance per cycle that the detector fails outright.
    pub failure_probability: f64,
}

impl Default for SimulationProfile {
    fn default() -> Self {
        Self {
            max_vehicles: 10,
            other_probability: 0.1,
            emergency_probability: 0.01,
            emergency_cycles: 60,
            miss_probability: 0.2,
            failure_probability: 0.005,
        }
    }
}

/// Generates plausible detections for running the controller without a
/// camera. Vehicle counts drift by at most one per cycle.
pub struct SimulatedDetector {
    rng: StdRng,
    profile: SimulationProfile,
    vehicles: u32,
    emergency_remaining: u32,
}

impl SimulatedDetector {
    pub fn new(seed: u64, profile: SimulationProfile) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            profile,
            vehicles: 0,
            emergency_remaining: 0,
        }
    }

    fn random_box(&mut self) -> BoundingBox {
        BoundingBox::new(
            self.rng.random_range(0.0..640.0),
            self.rng.random_range(0.0..480.0),
            self.rng.random_range(30.0..120.0),
            self.rng.random_range(20.0..90.0),
        )
    }
}

impl Detector for SimulatedDetector {
    fn detect(&mut self) -> Result<Vec<Detection>> {
        if self.rng.random_bool(self.profile.failure_probability) {
            return Err(anyhow!("simulated inference failure"));
        }

        let step: i64 = self.rng.random_range(-1..=1);
        let max = i64::from(self.profile.max_vehicles);
        self.vehicles = (i64::from(self.vehicles) + step).clamp(0, max) as u32;

        if self.emergency_remaining == 0
            && self.rng.random_bool(self.profile.emergency_probability)
        {
            self.emergency_remaining = self.profile.emergency_cycles;
        }

        let mut detections = Vec::with_capacity(self.vehicles as usize + 1);
        for _ in 0..self.vehicles {
            let class = if self.rng.random_bool(self.profile.other_probability) {
                VehicleClass::Other("person".to_string())
            } else {
                VehicleClass::Car
            };
            let confidence = self.rng.random_range(0.3..1.0);
            let bbox = self.random_box();
            detections.push(Detection::new(class, confidence, bbox));
        }

        if self.emergency_remaining > 0 {
            self.emergency_remaining -= 1;
            if !self.rng.random_bool(self.profile.miss_probability) {
                let bbox = self.random_box();
                detections.push(Detection::new(VehicleClass::Emergency, 0.85, bbox));
            }
        }

        Ok(detections)
    }
}

/// Replays a fixed sequence of detection cycles, then reports empty frames.
#[derive(Default)]
pub struct ScriptedDetector {
    cycles: VecDeque<Result<Vec<Detection>>>,
}

impl ScriptedDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_cycle(&mut self, detections: Vec<Detection>) -> &mut Self {
        self.cycles.push_back(Ok(detections));
        self
    }

    pub fn push_failure(&mut self, reason: &str) -> &mut Self {
        self.cycles.push_back(Err(anyhow!(reason.to_string())));
        self
    }

    pub fn remaining(&self) -> usize {
        self.cycles.len()
    }
}

impl Detector for ScriptedDetector {
    fn detect(&mut self) -> Result<Vec<Detection>> {
        self.cycles.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_detector_is_deterministic_per_seed() {
        let profile = SimulationProfile {
            failure_probability: 0.0,
            ..SimulationProfile::default()
        };
        let mut a = SimulatedDetector::new(7, profile);
        let mut b = SimulatedDetector::new(7, profile);
        for _ in 0..20 {
            assert_eq!(a.detect().unwrap(), b.detect().unwrap());
        }
    }

    #[test]
    fn simulated_detector_stays_within_profile() {
        let profile = SimulationProfile {
            max_vehicles: 4,
            emergency_probability: 0.0,
            failure_probability: 0.0,
            ..SimulationProfile::default()
        };
        let mut detector = SimulatedDetector::new(42, profile);
        for _ in 0..200 {
            let detections = detector.detect().unwrap();
            assert!(detections.len() <= 4);
            assert!(detections.iter().all(|d| d.class != VehicleClass::Emergency));
            assert!(detections.iter().all(|d| d.check().is_ok()));
        }
    }

    #[test]
    fn scripted_detector_replays_then_goes_quiet() {
        let bbox = BoundingBox::new(1.0, 1.0, 1.0, 1.0);
        let mut detector = ScriptedDetector::new();
        detector
            .push_cycle(vec![Detection::from_label("Car", 0.9, bbox)])
            .push_failure("camera unplugged");

        assert_eq!(detector.detect().unwrap().len(), 1);
        assert!(detector.detect().is_err());
        assert!(detector.detect().unwrap().is_empty());
        assert_eq!(detector.remaining(), 0);
    }
}
