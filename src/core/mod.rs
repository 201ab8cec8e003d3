//! Game core: the event bus, the chapter state machine and the session loop.
//!
//! This module contains:
//! - The bounded event bus between sensing and the chapter machine
//! - Challenge patterns and the single-chapter state machine
//! - The built-in story and difficulty tables
//! - The session controller that drives one tick at a time

pub mod bus;
pub mod chapter;
pub mod difficulty;
pub mod feedback;
pub mod menu;
pub mod pattern;
pub mod session;
pub mod story;

// Re-export commonly used types
pub use bus::{EventBus, DEFAULT_BUS_CAPACITY};
pub use chapter::{
    Budget, ChallengeSpec, ChapterId, ChapterMachine, ChapterSpec, ChapterState, Hint, Outcome,
    Phase, Step,
};
pub use difficulty::{Difficulty, DifficultyProfile, DifficultyTable, HintVerbosity};
pub use feedback::{feedback_for, Color, Cue, Feedback, FeedbackConfig};
pub use menu::{Cursor, EntryStep, InitialsEntry};
pub use pattern::{EventPredicate, Pattern, Progress, Verdict};
pub use session::{SessionController, SessionPhase};
pub use story::{ChapterSource, FogStory};
