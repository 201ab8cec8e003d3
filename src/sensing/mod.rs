//! Signal conditioning: raw sensor and switch readings in, discrete events out.

pub mod filter;
pub mod gesture;
pub mod input;
pub mod types;

pub use filter::{CalibrationError, CalibrationReport, FilterConfig, SignalFilter};
pub use gesture::{GestureClassifier, GestureConfig};
pub use input::{Debouncer, InputAggregator, InputConfig};
pub use types::{
    Axis, Baseline, ButtonId, Event, FilteredSample, GestureEvent, InputEvent, InputSnapshot,
    RawSample, Sign, TimedEvent,
};
