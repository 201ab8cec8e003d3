//! Terminal display and log-backed indicator for host runs.

use super::{Display, Indicator};
use crate::core::feedback::Color;
use std::time::Duration;
use tracing::info;

/// Prints each distinct frame to stdout.
#[derive(Debug, Default)]
pub struct ConsoleDisplay {
    last: Option<(Vec<String>, Option<String>)>,
}

impl ConsoleDisplay {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Display for ConsoleDisplay {
    fn render(&mut self, lines: &[String], prompt: Option<&str>) {
        let frame = (lines.to_vec(), prompt.map(str::to_string));
        if self.last.as_ref() == Some(&frame) {
            return;
        }

        println!("┌────────────────────────────────┐");
        for line in lines {
            println!("│ {:<30} │", line);
        }
        if let Some(prompt) = prompt {
            println!("│ {:<30} │", format!("> {prompt}"));
        }
        println!("└────────────────────────────────┘");

        self.last = Some(frame);
    }
}

/// Reports indicator changes through the log.
#[derive(Debug, Default)]
pub struct LogIndicator;

impl Indicator for LogIndicator {
    fn show(&mut self, color: Color, duration: Duration) {
        let Color(r, g, b) = color;
        info!("Indicator rgb({r}, {g}, {b}) for {:?}", duration);
    }
}
