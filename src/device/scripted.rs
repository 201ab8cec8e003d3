//! Scripted peripherals for replays and tests.
//!
//! A [`Script`] is a time-ordered list of level changes: accelerometer
//! readings, button presses/releases, encoder turns and injected sensor
//! faults. Levels hold until the next change, like the real hardware. Scripts
//! are written as JSON lines:
//!
//! ```text
//! {"at_ms": 0,    "accel": [0.0, 0.0, 9.8]}
//! {"at_ms": 1500, "press": "right"}
//! {"at_ms": 1600, "release": "right"}
//! {"at_ms": 2000, "rotate": 1}
//! {"at_ms": 2500, "fault": 3}
//! ```

use super::{Clock, Display, Indicator, InputDevice, SensorDriver, SensorFault};
use crate::core::feedback::Color;
use crate::sensing::types::{ButtonId, InputSnapshot, RawSample};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

/// Device at rest, flat on a table.
pub const REST: RawSample = RawSample {
    x: 0.0,
    y: 0.0,
    z: 9.8,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptAction {
    Accel([f32; 3]),
    Press(ButtonId),
    Release(ButtonId),
    /// Raw encoder pulses, signed.
    Rotate(i32),
    /// The next `n` sensor reads fail.
    Fault(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScriptStep {
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: ScriptAction,
}

#[derive(Debug)]
pub enum ScriptError {
    IoError(String),
    ParseError { line: usize, message: String },
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptError::IoError(e) => write!(f, "IO error: {e}"),
            ScriptError::ParseError { line, message } => {
                write!(f, "Parse error on line {line}: {message}")
            }
        }
    }
}

impl std::error::Error for ScriptError {}

/// Time-ordered input script.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    steps: Vec<ScriptStep>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse JSON lines. Blank lines and lines starting with `#` are skipped.
    pub fn parse(content: &str) -> Result<Self, ScriptError> {
        let mut script = Script::new();
        for (i, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let step: ScriptStep =
                serde_json::from_str(line).map_err(|e| ScriptError::ParseError {
                    line: i + 1,
                    message: e.to_string(),
                })?;
            script.steps.push(step);
        }
        script.sort();
        Ok(script)
    }

    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ScriptError::IoError(e.to_string()))?;
        Self::parse(&content)
    }

    pub fn to_json_lines(&self) -> Result<String, ScriptError> {
        let mut out = String::new();
        for step in &self.steps {
            let line = serde_json::to_string(step).map_err(|e| ScriptError::ParseError {
                line: 0,
                message: e.to_string(),
            })?;
            out.push_str(&line);
            out.push('\n');
        }
        Ok(out)
    }

    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }

    /// Time of the last step.
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.steps.last().map_or(0, |s| s.at_ms))
    }

    fn sort(&mut self) {
        self.steps.sort_by_key(|s| s.at_ms);
    }

    pub fn push(mut self, at_ms: u64, action: ScriptAction) -> Self {
        self.steps.push(ScriptStep { at_ms, action });
        self.sort();
        self
    }

    pub fn accel(self, at_ms: u64, x: f32, y: f32, z: f32) -> Self {
        self.push(at_ms, ScriptAction::Accel([x, y, z]))
    }

    /// Press at `at_ms`, release `hold_ms` later.
    pub fn click(self, at_ms: u64, button: ButtonId, hold_ms: u64) -> Self {
        self.push(at_ms, ScriptAction::Press(button))
            .push(at_ms + hold_ms, ScriptAction::Release(button))
    }

    pub fn press(self, at_ms: u64, button: ButtonId) -> Self {
        self.push(at_ms, ScriptAction::Press(button))
    }

    pub fn release(self, at_ms: u64, button: ButtonId) -> Self {
        self.push(at_ms, ScriptAction::Release(button))
    }

    pub fn rotate(self, at_ms: u64, pulses: i32) -> Self {
        self.push(at_ms, ScriptAction::Rotate(pulses))
    }

    pub fn fault(self, at_ms: u64, reads: u32) -> Self {
        self.push(at_ms, ScriptAction::Fault(reads))
    }
}

#[derive(Debug)]
struct BoardState {
    pending: VecDeque<ScriptStep>,
    accel: RawSample,
    inputs: InputSnapshot,
    faults: u32,
}

impl BoardState {
    /// Apply every step due at or before `now`.
    fn catch_up(&mut self, now: Duration) {
        let now_ms = now.as_millis() as u64;
        while self.pending.front().is_some_and(|s| s.at_ms <= now_ms) {
            let Some(step) = self.pending.pop_front() else {
                break;
            };
            match step.action {
                ScriptAction::Accel([x, y, z]) => self.accel = RawSample::new(x, y, z),
                ScriptAction::Press(button) => self.set(button, true),
                ScriptAction::Release(button) => self.set(button, false),
                ScriptAction::Rotate(pulses) => {
                    self.inputs.encoder_position = self.inputs.encoder_position.wrapping_add(pulses)
                }
                ScriptAction::Fault(reads) => self.faults += reads,
            }
        }
    }

    fn set(&mut self, button: ButtonId, down: bool) {
        match button {
            ButtonId::Left => self.inputs.left = down,
            ButtonId::Right => self.inputs.right = down,
            ButtonId::Encoder => self.inputs.encoder_button = down,
        }
    }
}

/// Replays a [`Script`] against a shared clock.
#[derive(Clone)]
pub struct ScriptedBoard {
    clock: Rc<dyn Clock>,
    state: Rc<RefCell<BoardState>>,
}

impl ScriptedBoard {
    pub fn new(script: Script, clock: Rc<dyn Clock>) -> Self {
        let state = BoardState {
            pending: script.steps.into(),
            accel: REST,
            inputs: InputSnapshot::default(),
            faults: 0,
        };
        Self {
            clock,
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub fn sensor(&self) -> ScriptedSensor {
        ScriptedSensor(self.clone())
    }

    pub fn input(&self) -> ScriptedInput {
        ScriptedInput(self.clone())
    }

    /// Every step has been applied.
    pub fn is_finished(&self) -> bool {
        self.state.borrow().pending.is_empty()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut BoardState) -> T) -> T {
        let mut state = self.state.borrow_mut();
        state.catch_up(self.clock.now());
        f(&mut state)
    }
}

pub struct ScriptedSensor(ScriptedBoard);

impl SensorDriver for ScriptedSensor {
    fn read(&mut self) -> Result<RawSample, SensorFault> {
        self.0.with_state(|state| {
            if state.faults > 0 {
                state.faults -= 1;
                return Err(SensorFault::Bus("scripted fault".to_string()));
            }
            Ok(state.accel)
        })
    }
}

pub struct ScriptedInput(ScriptedBoard);

impl InputDevice for ScriptedInput {
    fn snapshot(&mut self) -> InputSnapshot {
        self.0.with_state(|state| state.inputs)
    }
}

/// One rendered display frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub lines: Vec<String>,
    pub prompt: Option<String>,
}

impl Frame {
    pub fn contains(&self, text: &str) -> bool {
        self.lines.iter().any(|l| l.contains(text))
            || self.prompt.as_deref().is_some_and(|p| p.contains(text))
    }
}

/// Display that keeps every frame. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingDisplay {
    frames: Rc<RefCell<Vec<Frame>>>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.frames.borrow().clone()
    }

    pub fn last(&self) -> Option<Frame> {
        self.frames.borrow().last().cloned()
    }

    pub fn shown(&self, text: &str) -> bool {
        self.frames.borrow().iter().any(|f| f.contains(text))
    }
}

impl Display for RecordingDisplay {
    fn render(&mut self, lines: &[String], prompt: Option<&str>) {
        self.frames.borrow_mut().push(Frame {
            lines: lines.to_vec(),
            prompt: prompt.map(str::to_string),
        });
    }
}

/// Indicator that keeps every `show` call. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingIndicator {
    shows: Rc<RefCell<Vec<(Color, Duration)>>>,
}

impl RecordingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shows(&self) -> Vec<(Color, Duration)> {
        self.shows.borrow().clone()
    }

    pub fn colors(&self) -> Vec<Color> {
        self.shows.borrow().iter().map(|(c, _)| *c).collect()
    }
}

impl Indicator for RecordingIndicator {
    fn show(&mut self, color: Color, duration: Duration) {
        self.shows.borrow_mut().push((color, duration));
    }
}
