// control_system/mod.rs
pub mod control_loop;
pub mod cycle_timer;
pub mod emergency_tracker;
pub mod lane_gate;

pub use control_loop::{run_control_loop, ControlLoop, LoopStats};
pub use cycle_timer::CycleTimer;
pub use emergency_tracker::EmergencyTracker;
pub use lane_gate::LaneGatePolicy;
