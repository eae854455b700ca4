use crate::shared_data::LaneLight;

/// Opens the subordinate lane while the intersection is lightly loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneGatePolicy {
    threshold: u32,
}

impl LaneGatePolicy {
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn decide(&self, total_vehicles: u32) -> LaneLight {
        if total_vehicles <= self.threshold {
            LaneLight::Open
        } else {
            LaneLight::Closed
        }
    }
}
