//! Collaborator interfaces consumed by the core.
//!
//! The core never talks to a bus or a pin directly. Firmware builds implement
//! these traits over their own drivers; the host build ships console output and
//! scripted peripherals for replays and tests.

pub mod clock;
pub mod console;
pub mod scripted;

use crate::core::feedback::Color;
use crate::sensing::types::{InputSnapshot, RawSample};
use std::time::Duration;

pub use clock::{Clock, ManualClock, SystemClock};
pub use console::{ConsoleDisplay, LogIndicator};
pub use scripted::{
    Frame, RecordingDisplay, RecordingIndicator, Script, ScriptAction, ScriptError, ScriptStep,
    ScriptedBoard, ScriptedInput, ScriptedSensor, REST,
};

/// Accelerometer driver.
pub trait SensorDriver {
    /// Read one sample. A fault means "no new sample this tick".
    fn read(&mut self) -> Result<RawSample, SensorFault>;
}

/// Buttons and rotary encoder.
pub trait InputDevice {
    /// Read the raw (undebounced) level of every input line.
    fn snapshot(&mut self) -> InputSnapshot;
}

/// Text surface. Wrapping and centering are the implementation's concern.
pub trait Display {
    fn render(&mut self, lines: &[String], prompt: Option<&str>);
}

/// RGB indicator. Must return immediately; the implementation owns the
/// switch-off after `duration`.
pub trait Indicator {
    fn show(&mut self, color: Color, duration: Duration);
}

/// Every collaborator the session controller drives, in one owned bundle.
pub struct Peripherals {
    pub sensor: Box<dyn SensorDriver>,
    pub input: Box<dyn InputDevice>,
    pub display: Box<dyn Display>,
    pub indicator: Box<dyn Indicator>,
}

/// Sensor driver failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorFault {
    /// Bus transaction failed.
    Bus(String),
    /// The device has no fresh data yet.
    NotReady,
}

impl std::fmt::Display for SensorFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorFault::Bus(e) => write!(f, "Sensor bus error: {e}"),
            SensorFault::NotReady => write!(f, "Sensor not ready"),
        }
    }
}

impl std::error::Error for SensorFault {}
