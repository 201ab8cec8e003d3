//! Cursor menus: difficulty selection and initials entry.

use crate::sensing::types::{ButtonId, Event, InputEvent};

/// Wrap-around index over `len` options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    index: usize,
    len: usize,
}

impl Cursor {
    pub fn new(len: usize) -> Self {
        Self { index: 0, len }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn move_by(&mut self, delta: i32) {
        self.index = wrap(self.index, delta, self.len);
    }

    /// Apply a navigation event. Left/right step by one, the encoder by its
    /// detents. Returns whether the cursor moved.
    pub fn navigate(&mut self, event: &Event) -> bool {
        let before = self.index;
        match event {
            Event::Input(InputEvent::ButtonPressed(ButtonId::Left)) => self.move_by(-1),
            Event::Input(InputEvent::ButtonPressed(ButtonId::Right)) => self.move_by(1),
            Event::Input(InputEvent::EncoderRotated(delta)) => self.move_by(*delta),
            _ => {}
        }
        self.index != before
    }
}

/// `(index + delta) mod len`, never negative.
pub fn wrap(index: usize, delta: i32, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let len = len as i64;
    (index as i64 + delta as i64).rem_euclid(len) as usize
}

/// Whether `event` is the commit gesture shared by every menu.
pub fn is_commit(event: &Event) -> bool {
    matches!(
        event,
        Event::Input(InputEvent::ButtonPressed(ButtonId::Encoder))
    )
}

const LETTERS: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Result of feeding one event to [`InitialsEntry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStep {
    Unchanged,
    Edited,
    Confirmed(String),
}

/// Three-letter initials editor.
///
/// The encoder changes the letter under the cursor, left/right move the
/// cursor, the encoder button confirms.
#[derive(Debug, Clone)]
pub struct InitialsEntry {
    letters: [usize; 3],
    position: Cursor,
}

impl Default for InitialsEntry {
    fn default() -> Self {
        Self {
            letters: [0; 3],
            position: Cursor::new(3),
        }
    }
}

impl InitialsEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initials(&self) -> String {
        self.letters.iter().map(|&i| LETTERS[i] as char).collect()
    }

    pub fn handle(&mut self, event: &Event) -> EntryStep {
        match event {
            Event::Input(InputEvent::EncoderRotated(delta)) => {
                let slot = &mut self.letters[self.position.index()];
                *slot = wrap(*slot, *delta, LETTERS.len());
                EntryStep::Edited
            }
            Event::Input(InputEvent::ButtonPressed(ButtonId::Left | ButtonId::Right)) => {
                if self.position.navigate(event) {
                    EntryStep::Edited
                } else {
                    EntryStep::Unchanged
                }
            }
            e if is_commit(e) => EntryStep::Confirmed(self.initials()),
            _ => EntryStep::Unchanged,
        }
    }

    /// Display line with the cursor bracketed, e.g. `[A] B  C `.
    pub fn render_line(&self) -> String {
        self.letters
            .iter()
            .enumerate()
            .map(|(i, &letter)| {
                let c = LETTERS[letter] as char;
                if i == self.position.index() {
                    format!("[{c}]")
                } else {
                    format!(" {c} ")
                }
            })
            .collect()
    }
}
