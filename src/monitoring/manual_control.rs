use crate::config::{LightEncoding, StoreConfig};
use crate::publisher::StateStore;
use crate::shared_data::{LaneLight, StoreUpdate};
use anyhow::Result;
use serde_json::Value;
use std::io::{BufRead, Write};
use std::thread;
use std::time::Duration;

/// Main-light values an operator may force. Wider than the automatic
/// controller's RED/GREEN so the actuator can be tested fully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualLight {
    Red,
    Yellow,
    Green,
    Off,
}

impl ManualLight {
    pub fn encode(self, encoding: LightEncoding) -> &'static str {
        match (encoding, self) {
            (LightEncoding::Bitmask, ManualLight::Red) => "100",
            (LightEncoding::Bitmask, ManualLight::Yellow) => "010",
            (LightEncoding::Bitmask, ManualLight::Green) => "001",
            (LightEncoding::Bitmask, ManualLight::Off) => "000",
            (LightEncoding::Letter, ManualLight::Red) => "R",
            (LightEncoding::Letter, ManualLight::Yellow) => "Y",
            (LightEncoding::Letter, ManualLight::Green) => "G",
            (LightEncoding::Letter, ManualLight::Off) => "O",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ManualLight::Red => "RED",
            ManualLight::Yellow => "YELLOW",
            ManualLight::Green => "GREEN",
            ManualLight::Off => "OFF",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualCommand {
    SetLane(LaneLight),
    SetMain(ManualLight),
    Status,
    Demo,
    Quit,
}

pub fn parse_command(input: &str) -> Option<ManualCommand> {
    let command = input.trim().to_uppercase();
    let parsed = match command.as_str() {
        "0" => ManualCommand::SetLane(LaneLight::Closed),
        "1" => ManualCommand::SetLane(LaneLight::Open),
        "R" => ManualCommand::SetMain(ManualLight::Red),
        "Y" => ManualCommand::SetMain(ManualLight::Yellow),
        "G" => ManualCommand::SetMain(ManualLight::Green),
        "O" => ManualCommand::SetMain(ManualLight::Off),
        "STATUS" => ManualCommand::Status,
        "DEMO" => ManualCommand::Demo,
        "QUIT" | "EXIT" => ManualCommand::Quit,
        _ => return None,
    };
    Some(parsed)
}

/// Operator console writing straight to the store. Nothing reconciles these
/// writes with a running controller, which will overwrite them on its next
/// publication.
pub struct ManualConsole<'a> {
    store: &'a dyn StateStore,
    config: &'a StoreConfig,
    demo_step: Duration,
}

impl<'a> ManualConsole<'a> {
    pub fn new(store: &'a dyn StateStore, config: &'a StoreConfig) -> Self {
        Self {
            store,
            config,
            demo_step: Duration::from_secs(2),
        }
    }

    pub fn with_demo_step(mut self, step: Duration) -> Self {
        self.demo_step = step;
        self
    }

    pub fn set_lane_light(&self, lane: LaneLight) -> Result<String> {
        let mut update = StoreUpdate::new();
        update.insert(&self.config.lane_light_key, Value::from(lane.encode()));
        self.store.publish(&update)?;
        let label = match lane {
            LaneLight::Open => "ON",
            LaneLight::Closed => "OFF",
        };
        Ok(format!("Lane Light: {}", label))
    }

    pub fn set_traffic_light(&self, light: ManualLight) -> Result<String> {
        let mut update = StoreUpdate::new();
        update.insert(
            &self.config.traffic_light_key,
            Value::from(light.encode(self.config.light_encoding)),
        );
        self.store.publish(&update)?;
        Ok(format!("Traffic Light: {}", light.name()))
    }

    pub fn status(&self) -> Result<String> {
        let Some(snapshot) = self.store.snapshot()? else {
            return Ok("Store holds no light values yet".to_string());
        };
        let show = |key: &str| {
            snapshot
                .get(key)
                .map(|v| v.to_string())
                .unwrap_or_else(|| "unset".to_string())
        };
        Ok(format!(
            "Current Status:\n   Lane Light: {}\n   Traffic Light: {}",
            show(&self.config.lane_light_key),
            show(&self.config.traffic_light_key)
        ))
    }

    /// Lane on, then RED, YELLOW, GREEN, then everything off.
    pub fn demo<W: Write>(&self, out: &mut W) -> Result<()> {
        writeln!(out, "Starting demo sequence...")?;
        let steps: [(&str, ManualCommand); 5] = [
            ("Turn on lane lighting", ManualCommand::SetLane(LaneLight::Open)),
            ("Traffic light RED", ManualCommand::SetMain(ManualLight::Red)),
            ("Traffic light YELLOW", ManualCommand::SetMain(ManualLight::Yellow)),
            ("Traffic light GREEN", ManualCommand::SetMain(ManualLight::Green)),
            ("Turn off all lights", ManualCommand::SetMain(ManualLight::Off)),
        ];
        for (i, (label, command)) in steps.iter().enumerate() {
            writeln!(out, "Step {}: {}", i + 1, label)?;
            writeln!(out, "{}", self.apply(*command)?)?;
            thread::sleep(self.demo_step);
        }
        writeln!(out, "{}", self.set_lane_light(LaneLight::Closed)?)?;
        writeln!(out, "Demo sequence complete!")?;
        Ok(())
    }

    fn apply(&self, command: ManualCommand) -> Result<String> {
        match command {
            ManualCommand::SetLane(lane) => self.set_lane_light(lane),
            ManualCommand::SetMain(light) => self.set_traffic_light(light),
            ManualCommand::Status => self.status(),
            ManualCommand::Demo | ManualCommand::Quit => Ok(String::new()),
        }
    }

    pub fn run<R: BufRead, W: Write>(&self, mut input: R, out: &mut W) -> Result<()> {
        print_menu(out)?;
        loop {
            write!(out, "\nEnter command: ")?;
            out.flush()?;
            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                writeln!(out, "Goodbye!")?;
                return Ok(());
            }
            match parse_command(&line) {
                Some(ManualCommand::Quit) => {
                    writeln!(out, "Goodbye!")?;
                    return Ok(());
                }
                Some(ManualCommand::Demo) => {
                    if let Err(e) = self.demo(out) {
                        writeln!(out, "Error: {:#}", e)?;
                    }
                }
                Some(command) => match self.apply(command) {
                    Ok(message) => writeln!(out, "{}", message)?,
                    Err(e) => writeln!(out, "Error: {:#}", e)?,
                },
                None => writeln!(
                    out,
                    "Unknown command. Try: 0, 1, R, Y, G, O, status, demo, or quit"
                )?,
            }
        }
    }
}

fn print_menu<W: Write>(out: &mut W) -> std::io::Result<()> {
    writeln!(out, "Manual Traffic Light Control")?;
    writeln!(out, "Lane Light Commands:")?;
    writeln!(out, "  0 - Turn OFF")?;
    writeln!(out, "  1 - Turn ON")?;
    writeln!(out, "Traffic Light Commands:")?;
    writeln!(out, "  R - Red")?;
    writeln!(out, "  Y - Yellow")?;
    writeln!(out, "  G - Green")?;
    writeln!(out, "  O - Off")?;
    writeln!(out, "Other Commands:")?;
    writeln!(out, "  status - Show current status")?;
    writeln!(out, "  demo   - Run demo sequence")?;
    writeln!(out, "  quit   - Exit")
}
