// monitoring/mod.rs
pub mod manual_control;

pub use manual_control::{parse_command, ManualCommand, ManualConsole, ManualLight};
