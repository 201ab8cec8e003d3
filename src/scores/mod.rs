//! Leaderboard persistence collaborator.

pub mod board;

pub use board::{format_time, ScoreBoard, ScoreEntry, ScoreError, ScoreKeeper, TOP_SCORES};
