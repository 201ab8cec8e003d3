//! Sample and event types shared by the sensing pipeline.
//!
//! Samples are 3-axis accelerations in device units (m/s^2 for the ADXL345
//! family). Events are ephemeral: they are produced once per tick, pushed onto
//! the event bus and consumed once by the chapter state machine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Accelerometer axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Fixed priority order used to break ties between axes.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];
}

/// Direction along an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sign {
    Positive,
    Negative,
}

impl Sign {
    pub(crate) fn of(value: f32) -> Self {
        if value < 0.0 {
            Sign::Negative
        } else {
            Sign::Positive
        }
    }
}

/// Instantaneous 3-axis reading straight from the sensor driver.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RawSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl RawSample {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Whether every component is a finite number.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Clamp every component into `[-range, range]`.
    pub fn clamped(&self, range: f32) -> Self {
        Self {
            x: self.x.clamp(-range, range),
            y: self.y.clamp(-range, range),
            z: self.z.clamp(-range, range),
        }
    }

    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// EMA-smoothed 3-axis vector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FilteredSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl FilteredSample {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn axis(&self, axis: Axis) -> f32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Component-wise difference `self - other`.
    pub fn minus(&self, other: &FilteredSample) -> FilteredSample {
        FilteredSample {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }
}

impl From<RawSample> for FilteredSample {
    fn from(raw: RawSample) -> Self {
        Self {
            x: raw.x,
            y: raw.y,
            z: raw.z,
        }
    }
}

/// At-rest reference captured once by calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline(FilteredSample);

impl Baseline {
    pub(crate) fn new(origin: FilteredSample) -> Self {
        Self(origin)
    }

    pub fn origin(&self) -> FilteredSample {
        self.0
    }

    /// Per-axis deviation of `sample` from this baseline.
    pub fn deviation(&self, sample: &FilteredSample) -> FilteredSample {
        sample.minus(&self.0)
    }
}

/// Discrete motion gesture recognized from filtered samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GestureEvent {
    TiltDetected { axis: Axis, sign: Sign },
    TapDetected,
    SustainedMovementDetected,
}

impl GestureEvent {
    pub(crate) fn tilt(axis: Axis, value: f32) -> Self {
        GestureEvent::TiltDetected {
            axis,
            sign: Sign::of(value),
        }
    }
}

/// Physical buttons on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonId {
    Left,
    Right,
    /// Push switch on the rotary encoder shaft.
    Encoder,
}

impl ButtonId {
    pub const ALL: [ButtonId; 3] = [ButtonId::Left, ButtonId::Right, ButtonId::Encoder];
}

impl fmt::Display for ButtonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ButtonId::Left => write!(f, "left"),
            ButtonId::Right => write!(f, "right"),
            ButtonId::Encoder => write!(f, "encoder"),
        }
    }
}

/// Debounced button / encoder event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputEvent {
    ButtonPressed(ButtonId),
    ButtonReleased(ButtonId),
    /// Net detents turned since the previous poll; positive is clockwise.
    EncoderRotated(i32),
    /// Both hold buttons have been down together for `elapsed`.
    BothHeld(Duration),
}

/// Anything the chapter state machine can react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    Gesture(GestureEvent),
    Input(InputEvent),
}

impl From<GestureEvent> for Event {
    fn from(e: GestureEvent) -> Self {
        Event::Gesture(e)
    }
}

impl From<InputEvent> for Event {
    fn from(e: InputEvent) -> Self {
        Event::Input(e)
    }
}

/// An event stamped by the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedEvent {
    /// Monotonic time since boot.
    pub at: Duration,
    /// Bus sequence number, strictly increasing.
    pub seq: u64,
    pub event: Event,
}

/// Snapshot of every input line, as read by an input device in one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InputSnapshot {
    pub left: bool,
    pub right: bool,
    pub encoder_button: bool,
    /// Raw encoder counter (pulses, not detents).
    pub encoder_position: i32,
}

impl InputSnapshot {
    pub fn is_down(&self, button: ButtonId) -> bool {
        match button {
            ButtonId::Left => self.left,
            ButtonId::Right => self.right,
            ButtonId::Encoder => self.encoder_button,
        }
    }
}
