//! Fogline - input sensing and chapter state machine for a handheld
//! narrative device.
//!
//! The player advances through ten story chapters by tilting and shaking the
//! device, tapping it, and using two buttons and a rotary encoder. Everything
//! runs on one cooperative tick loop; hardware is reached only through the
//! collaborator traits in [`device`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Session Controller                     │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐                           │
//! │  │   Signal    │──▶│   Gesture   │──┐                        │
//! │  │   Filter    │   │ Classifier  │  │   ┌─────────────┐      │
//! │  └─────────────┘   └─────────────┘  ├──▶│  Event Bus  │      │
//! │  ┌─────────────┐                    │   └──────┬──────┘      │
//! │  │    Input    │────────────────────┘          ▼             │
//! │  │ Aggregator  │                      ┌─────────────────┐    │
//! │  └─────────────┘                      │ Chapter Machine │    │
//! │                                       └────────┬────────┘    │
//! │         ┌──────────────┬───────────────────────┤             │
//! │         ▼              ▼                       ▼             │
//! │  ┌─────────────┐ ┌─────────────┐       ┌─────────────┐       │
//! │  │  Feedback   │ │   Display   │       │ Score Board │       │
//! │  └─────────────┘ └─────────────┘       └─────────────┘       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use fogline::core::{FogStory, SessionController};
//! use fogline::device::{ConsoleDisplay, LogIndicator, Peripherals, Script, ScriptedBoard, SystemClock};
//! use fogline::Config;
//! use std::rc::Rc;
//! use std::sync::atomic::AtomicBool;
//!
//! let clock = Rc::new(SystemClock::new());
//! let board = ScriptedBoard::new(Script::new(), clock.clone());
//! let peripherals = Peripherals {
//!     sensor: Box::new(board.sensor()),
//!     input: Box::new(board.input()),
//!     display: Box::new(ConsoleDisplay::new()),
//!     indicator: Box::new(LogIndicator),
//! };
//!
//! let mut session = SessionController::new(Config::default(), peripherals, Box::new(clock), Box::new(FogStory));
//! session.run(&AtomicBool::new(true), None);
//! ```

pub mod config;
pub mod core;
pub mod device;
pub mod report;
pub mod scores;
pub mod sensing;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError};
pub use core::{
    ChapterId, ChapterMachine, ChapterSource, Difficulty, EventBus, FogStory, Outcome,
    SessionController, SessionPhase,
};
pub use report::{ReportError, SessionReport};
pub use scores::{ScoreBoard, ScoreKeeper};
pub use sensing::{Event, GestureEvent, InputEvent, TimedEvent};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
