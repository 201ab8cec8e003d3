//! Debounced buttons and rotary encoder.

use crate::sensing::types::{ButtonId, InputEvent, InputSnapshot};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Input timing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// A raw level must hold this long before it becomes the debounced level.
    #[serde(with = "crate::config::millis")]
    pub debounce_window: Duration,
    /// Minimum spacing between two counted steps of a rhythm sequence.
    #[serde(with = "crate::config::millis")]
    pub rhythm_repeat_gate: Duration,
    /// Raw encoder pulses per mechanical detent.
    pub pulses_per_detent: i32,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            debounce_window: Duration::from_millis(15),
            rhythm_repeat_gate: Duration::from_millis(150),
            pulses_per_detent: 1,
        }
    }
}

/// Two-state debounce filter for one line.
#[derive(Debug, Clone, Default)]
pub struct Debouncer {
    stable: bool,
    candidate: bool,
    since: Duration,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw reading. Returns the new debounced level on a transition.
    pub fn update(&mut self, raw: bool, now: Duration, window: Duration) -> Option<bool> {
        if raw != self.candidate {
            self.candidate = raw;
            self.since = now;
        }

        if self.candidate != self.stable && now.saturating_sub(self.since) >= window {
            self.stable = self.candidate;
            return Some(self.stable);
        }

        None
    }

    pub fn is_down(&self) -> bool {
        self.stable
    }
}

/// Turns raw input snapshots into debounced events.
#[derive(Debug, Clone)]
pub struct InputAggregator {
    config: InputConfig,
    buttons: [Debouncer; 3],
    last_position: Option<i32>,
    pulse_carry: i32,
    both_since: Option<Duration>,
    both_reported: Option<Duration>,
}

impl InputAggregator {
    pub fn new(config: InputConfig) -> Self {
        Self {
            config,
            buttons: Default::default(),
            last_position: None,
            pulse_carry: 0,
            both_since: None,
            both_reported: None,
        }
    }

    pub fn config(&self) -> &InputConfig {
        &self.config
    }

    /// Debounced level of `button`.
    pub fn is_down(&self, button: ButtonId) -> bool {
        self.buttons[index(button)].is_down()
    }

    /// Process one poll. Events come out in a fixed order: button edges
    /// (left, right, encoder), then rotation, then the both-held report.
    pub fn poll(&mut self, snapshot: &InputSnapshot, now: Duration) -> Vec<InputEvent> {
        let mut events = Vec::new();
        let window = self.config.debounce_window;

        for button in ButtonId::ALL {
            let debouncer = &mut self.buttons[index(button)];
            match debouncer.update(snapshot.is_down(button), now, window) {
                Some(true) => events.push(InputEvent::ButtonPressed(button)),
                Some(false) => events.push(InputEvent::ButtonReleased(button)),
                None => {}
            }
        }

        if let Some(detents) = self.encoder_detents(snapshot.encoder_position) {
            events.push(InputEvent::EncoderRotated(detents));
        }

        if let Some(elapsed) = self.both_held(now) {
            events.push(InputEvent::BothHeld(elapsed));
        }

        events
    }

    fn encoder_detents(&mut self, position: i32) -> Option<i32> {
        let last = match self.last_position.replace(position) {
            Some(last) => last,
            None => return None,
        };

        // |carry| < per_detent, so the remainder always fits back in i32
        let per_detent = i64::from(self.config.pulses_per_detent.max(1));
        let pulses = i64::from(self.pulse_carry) + i64::from(position.wrapping_sub(last));
        let detents = pulses / per_detent;
        self.pulse_carry = (pulses - detents * per_detent) as i32;

        let detents = detents.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
        (detents != 0).then_some(detents)
    }

    fn both_held(&mut self, now: Duration) -> Option<Duration> {
        if !(self.is_down(ButtonId::Left) && self.is_down(ButtonId::Right)) {
            self.both_since = None;
            self.both_reported = None;
            return None;
        }

        let since = *self.both_since.get_or_insert(now);
        let elapsed = now.saturating_sub(since);
        match self.both_reported {
            Some(reported) if elapsed <= reported => None,
            _ => {
                self.both_reported = Some(elapsed);
                Some(elapsed)
            }
        }
    }
}

fn index(button: ButtonId) -> usize {
    match button {
        ButtonId::Left => 0,
        ButtonId::Right => 1,
        ButtonId::Encoder => 2,
    }
}
