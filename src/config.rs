use crate::error::{ConfigError, ConfigResult};
use crate::global_variables::{
    AMQP_URL, ENV_PREFIX, KEY_LANE_LIGHT, KEY_TRAFFIC_LIGHT, QUEUE_TRAFFIC_STATE,
    TRAFFIC_STATE_CSV,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Which external store receives the published traffic state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Amqp,
    Csv,
    Log,
}

/// How the main light is written into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightEncoding {
    /// Three-lamp bitmask string, "100" for red and "001" for green
    Bitmask,
    /// Single letter, "R" or "G"
    Letter,
}

/// Phase the main light takes when an emergency override lifts. The cycle
/// clock restarts either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostEmergencyPhase {
    /// Keep the phase that was active when the override began
    Resume,
    /// Start the fresh cycle in RED
    Red,
}

/// Only detections whose box centre lies inside this rectangle are counted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionOfInterest {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RegionOfInterest {
    pub fn contains(&self, cx: f32, cy: f32) -> bool {
        cx >= self.x && cx <= self.x + self.width && cy >= self.y && cy <= self.y + self.height
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub amqp_url: String,
    pub queue: String,
    pub csv_path: String,
    pub traffic_light_key: String,
    pub lane_light_key: String,
    pub light_encoding: LightEncoding,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Log,
            amqp_url: AMQP_URL.to_string(),
            queue: QUEUE_TRAFFIC_STATE.to_string(),
            csv_path: TRAFFIC_STATE_CSV.to_string(),
            traffic_light_key: KEY_TRAFFIC_LIGHT.to_string(),
            lane_light_key: KEY_LANE_LIGHT.to_string(),
            light_encoding: LightEncoding::Bitmask,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub confidence_threshold: f32,
    /// Ticks between detection cycles
    pub frame_skip: u32,
    pub emergency_cooldown_secs: f64,
    pub cycle_interval_secs: f64,
    /// Gate stays open while the vehicle total is at or below this
    pub lane_gate_threshold: u32,
    pub heartbeat_secs: f64,
    pub tick_interval_ms: u64,
    pub send_timeout_secs: f64,
    pub retry_backoff_ms: u64,
    pub post_emergency_phase: PostEmergencyPhase,
    pub region_of_interest: Option<RegionOfInterest>,
    pub store: StoreConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.4,
            frame_skip: 3,
            emergency_cooldown_secs: 10.0,
            cycle_interval_secs: 30.0,
            lane_gate_threshold: 6,
            heartbeat_secs: 2.0,
            tick_interval_ms: 33,
            send_timeout_secs: 5.0,
            retry_backoff_ms: 500,
            post_emergency_phase: PostEmergencyPhase::Resume,
            region_of_interest: None,
            store: StoreConfig::default(),
        }
    }
}

impl ControllerConfig {
    /// Loads defaults, then the optional JSON file, then `INTERSECTION_*`
    /// environment overrides, and validates the result.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let unreadable = |reason: String| ConfigError::Unreadable {
            path: path.display().to_string(),
            reason,
        };
        let contents = fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
        serde_json::from_str(&contents).map_err(|e| unreadable(e.to_string()))
    }

    /// Applies overrides from `lookup`, which maps a full variable name such
    /// as `INTERSECTION_CYCLE_INTERVAL_SECS` to its value.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |field: &str| {
            let variable = format!("{}{}", ENV_PREFIX, field.to_uppercase());
            lookup(&variable).map(|value| (variable, value))
        };

        override_parsed(get("confidence_threshold"), &mut self.confidence_threshold)?;
        override_parsed(get("frame_skip"), &mut self.frame_skip)?;
        override_parsed(
            get("emergency_cooldown_secs"),
            &mut self.emergency_cooldown_secs,
        )?;
        override_parsed(get("cycle_interval_secs"), &mut self.cycle_interval_secs)?;
        override_parsed(get("lane_gate_threshold"), &mut self.lane_gate_threshold)?;
        override_parsed(get("heartbeat_secs"), &mut self.heartbeat_secs)?;
        override_parsed(get("tick_interval_ms"), &mut self.tick_interval_ms)?;
        override_parsed(get("send_timeout_secs"), &mut self.send_timeout_secs)?;
        override_parsed(get("retry_backoff_ms"), &mut self.retry_backoff_ms)?;

        if let Some((variable, value)) = get("store_backend") {
            self.store.backend = match value.to_lowercase().as_str() {
                "amqp" => StoreBackend::Amqp,
                "csv" => StoreBackend::Csv,
                "log" => StoreBackend::Log,
                _ => return Err(ConfigError::InvalidOverride { variable, value }),
            };
        }
        if let Some((variable, value)) = get("post_emergency_phase") {
            self.post_emergency_phase = match value.to_lowercase().as_str() {
                "resume" => PostEmergencyPhase::Resume,
                "red" => PostEmergencyPhase::Red,
                _ => return Err(ConfigError::InvalidOverride { variable, value }),
            };
        }
        if let Some((_, value)) = get("amqp_url") {
            self.store.amqp_url = value;
        }
        if let Some((_, value)) = get("csv_path") {
            self.store.csv_path = value;
        }
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::out_of_range(
                "confidence_threshold",
                self.confidence_threshold,
                "within [0, 1]",
            ));
        }
        if self.frame_skip == 0 {
            return Err(ConfigError::out_of_range("frame_skip", 0, ">= 1"));
        }
        check_positive_secs("emergency_cooldown_secs", self.emergency_cooldown_secs)?;
        check_positive_secs("cycle_interval_secs", self.cycle_interval_secs)?;
        check_positive_secs("heartbeat_secs", self.heartbeat_secs)?;
        check_positive_secs("send_timeout_secs", self.send_timeout_secs)?;
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::out_of_range("tick_interval_ms", 0, ">= 1"));
        }
        if let Some(roi) = self.region_of_interest {
            if !(roi.width > 0.0 && roi.height > 0.0) {
                return Err(ConfigError::out_of_range(
                    "region_of_interest",
                    format!("{}x{}", roi.width, roi.height),
                    "a non-empty rectangle",
                ));
            }
        }
        if self.store.traffic_light_key.is_empty() || self.store.lane_light_key.is_empty() {
            return Err(ConfigError::out_of_range(
                "store keys",
                "\"\"",
                "non-empty",
            ));
        }
        Ok(())
    }

    pub fn emergency_cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.emergency_cooldown_secs)
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs_f64(self.cycle_interval_secs)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs_f64(self.heartbeat_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.send_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

fn override_parsed<T: std::str::FromStr>(
    entry: Option<(String, String)>,
    target: &mut T,
) -> ConfigResult<()> {
    if let Some((variable, value)) = entry {
        *target = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidOverride { variable, value })?;
    }
    Ok(())
}

fn check_positive_secs(parameter: &str, secs: f64) -> ConfigResult<()> {
    match Duration::try_from_secs_f64(secs) {
        Ok(d) if !d.is_zero() => Ok(()),
        _ => Err(ConfigError::out_of_range(parameter, secs, "a positive number of seconds")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_field_deployment() {
        let config = ControllerConfig::default();
        assert_eq!(config.lane_gate_threshold, 6);
        assert_eq!(config.frame_skip, 3);
        assert_eq!(config.cycle_interval(), Duration::from_secs(30));
        assert_eq!(config.emergency_cooldown(), Duration::from_secs(10));
        assert_eq!(config.heartbeat(), Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_cooldown() {
        let mut config = ControllerConfig::default();
        config.emergency_cooldown_secs = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { ref parameter, .. })
                if parameter == "emergency_cooldown_secs"
        ));

        config.emergency_cooldown_secs = -3.0;
        assert!(config.validate().is_err());

        config.emergency_cooldown_secs = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_confidence_outside_unit_interval() {
        let mut config = ControllerConfig::default();
        config.confidence_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_frame_skip() {
        let mut config = ControllerConfig::default();
        config.frame_skip = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let vars: HashMap<&str, &str> = [
            ("INTERSECTION_CYCLE_INTERVAL_SECS", "45"),
            ("INTERSECTION_LANE_GATE_THRESHOLD", "4"),
            ("INTERSECTION_STORE_BACKEND", "csv"),
        ]
        .into_iter()
        .collect();

        let mut config = ControllerConfig::default();
        config
            .apply_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.cycle_interval_secs, 45.0);
        assert_eq!(config.lane_gate_threshold, 4);
        assert_eq!(config.store.backend, StoreBackend::Csv);
        assert_eq!(config.post_emergency_phase, PostEmergencyPhase::Resume);
    }

    #[test]
    fn unparsable_override_is_an_error() {
        let mut config = ControllerConfig::default();
        let result = config.apply_overrides(|name| {
            (name == "INTERSECTION_FRAME_SKIP").then(|| "three".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidOverride { .. })));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{ "lane_gate_threshold": 8, "store": { "light_encoding": "letter" } }"#;
        let config: ControllerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.lane_gate_threshold, 8);
        assert_eq!(config.cycle_interval_secs, 30.0);
        assert_eq!(config.store.light_encoding, LightEncoding::Letter);
        assert_eq!(config.store.traffic_light_key, KEY_TRAFFIC_LIGHT);
    }

    #[test]
    fn region_of_interest_contains_edges() {
        let roi = RegionOfInterest {
            x: 10.0,
            y: 10.0,
            width: 100.0,
            height: 50.0,
        };
        assert!(roi.contains(10.0, 10.0));
        assert!(roi.contains(110.0, 60.0));
        assert!(!roi.contains(111.0, 30.0));
    }
}
