// src/shared_data.rs

use crate::config::{LightEncoding, StoreConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Wall-clock seconds for journal rows. Never used for control timing.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MainLight {
    Red,
    Green,
}

impl MainLight {
    pub fn flipped(self) -> Self {
        match self {
            MainLight::Red => MainLight::Green,
            MainLight::Green => MainLight::Red,
        }
    }

    pub fn encode(self, encoding: LightEncoding) -> &'static str {
        match (encoding, self) {
            (LightEncoding::Bitmask, MainLight::Red) => "100",
            (LightEncoding::Bitmask, MainLight::Green) => "001",
            (LightEncoding::Letter, MainLight::Red) => "R",
            (LightEncoding::Letter, MainLight::Green) => "G",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LaneLight {
    Open,
    Closed,
}

impl LaneLight {
    /// The gate actuator reads 1 for open and 0 for closed.
    pub fn encode(self) -> i64 {
        match self {
            LaneLight::Open => 1,
            LaneLight::Closed => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Normal,
    Emergency,
}

/// The resolved decision for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrafficState {
    pub main_light: MainLight,
    pub lane_light: LaneLight,
    pub mode: Mode,
    /// Time left in the current phase; always zero in emergency mode.
    pub countdown: Duration,
}

impl TrafficState {
    pub fn emergency() -> Self {
        Self {
            main_light: MainLight::Red,
            lane_light: LaneLight::Open,
            mode: Mode::Emergency,
            countdown: Duration::ZERO,
        }
    }

    pub fn normal(main_light: MainLight, lane_light: LaneLight, countdown: Duration) -> Self {
        Self {
            main_light,
            lane_light,
            mode: Mode::Normal,
            countdown,
        }
    }

    /// Whether two states drive the actuators differently. The countdown is
    /// display-only and never triggers a publication on its own.
    pub fn differs_from(&self, other: &TrafficState) -> bool {
        self.main_light != other.main_light
            || self.lane_light != other.lane_light
            || self.mode != other.mode
    }

    pub fn status_line(&self, total_vehicles: u32) -> StatusLine {
        StatusLine {
            state: *self,
            total_vehicles,
        }
    }
}

/// Key/value map handed to the external store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreUpdate {
    pub entries: BTreeMap<String, Value>,
}

impl StoreUpdate {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn from_state(state: &TrafficState, store: &StoreConfig) -> Self {
        let mut update = Self::new();
        update.insert(
            &store.traffic_light_key,
            Value::from(state.main_light.encode(store.light_encoding)),
        );
        update.insert(&store.lane_light_key, Value::from(state.lane_light.encode()));
        update
    }

    pub fn insert(&mut self, key: &str, value: Value) {
        self.entries.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for StoreUpdate {
    fn default() -> Self {
        Self::new()
    }
}

/// One-line dashboard summary of the current decision.
pub struct StatusLine {
    state: TrafficState,
    total_vehicles: u32,
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = &self.state;
        let light = match (state.mode, state.main_light) {
            (Mode::Emergency, _) => "EMERGENCY",
            (Mode::Normal, MainLight::Red) => "RED",
            (Mode::Normal, MainLight::Green) => "GREEN",
        };
        let gate = match (state.mode, state.lane_light) {
            (Mode::Emergency, _) => "OPEN (EMERGENCY)",
            (Mode::Normal, LaneLight::Open) => "OPEN (Low Traffic)",
            (Mode::Normal, LaneLight::Closed) => "CLOSED (High Traffic)",
        };
        write!(f, "Main Light: {} | Switch in: ", light)?;
        if state.countdown.is_zero() {
            write!(f, "--")?;
        } else {
            write!(f, "{:.0}s", state.countdown.as_secs_f64())?;
        }
        write!(f, " | Gate: {} | Vehicles: {}", gate, self.total_vehicles)
    }
}
