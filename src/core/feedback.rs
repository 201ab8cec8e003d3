//! Outcome to indicator mapping.

use crate::core::chapter::Outcome;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 8-bit RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    pub const BOOT: Color = Color(255, 255, 0);
    pub const SUCCESS: Color = Color(0, 0, 255);
    pub const FAILURE: Color = Color(255, 0, 0);
    pub const OFF: Color = Color(0, 0, 0);
}

/// Visual cue classes. Chapters never pick colors themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cue {
    Boot,
    Success,
    Failure,
    Off,
}

impl From<&Outcome> for Cue {
    fn from(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Advance(_) | Outcome::SessionComplete(_) => Cue::Success,
            Outcome::Restart(_) => Cue::Failure,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    #[serde(with = "crate::config::millis")]
    pub duration: Duration,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(3),
        }
    }
}

/// What to show on the indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feedback {
    pub color: Color,
    pub duration: Duration,
}

impl Feedback {
    pub fn for_cue(cue: Cue, config: &FeedbackConfig) -> Self {
        let color = match cue {
            Cue::Boot => Color::BOOT,
            Cue::Success => Color::SUCCESS,
            Cue::Failure => Color::FAILURE,
            Cue::Off => Color::OFF,
        };
        let duration = if cue == Cue::Off {
            Duration::ZERO
        } else {
            config.duration
        };
        Self { color, duration }
    }
}

/// Pure mapping from a chapter outcome to indicator feedback.
pub fn feedback_for(outcome: &Outcome, config: &FeedbackConfig) -> Feedback {
    Feedback::for_cue(Cue::from(outcome), config)
}
