//! Top-3 completion times backed by a line-oriented text file.
//!
//! One record per line, `INITIALS,SECONDS`, fastest first. Malformed lines are
//! skipped on load.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Number of entries kept.
pub const TOP_SCORES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub initials: String,
    pub seconds: u64,
}

/// Ranking collaborator consumed by the session controller.
pub trait ScoreKeeper {
    /// Rank (1-based) a completion of `seconds` would earn, if any.
    fn rank_for(&self, seconds: u64) -> Option<u8>;

    /// Record a completion. Returns the rank it earned; slower-than-board
    /// times are not stored.
    fn record(&mut self, initials: &str, seconds: u64) -> Result<Option<u8>, ScoreError>;

    /// Entries fastest first.
    fn top_scores(&self) -> Vec<ScoreEntry>;
}

#[derive(Debug)]
pub enum ScoreError {
    IoError(String),
    InvalidInitials(String),
}

impl std::fmt::Display for ScoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoreError::IoError(e) => write!(f, "IO error: {e}"),
            ScoreError::InvalidInitials(s) => write!(f, "Invalid initials: {s:?}"),
        }
    }
}

impl std::error::Error for ScoreError {}

/// `MM:SS`; minutes keep counting past 99.
pub fn format_time(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[derive(Debug, Clone, Default)]
pub struct ScoreBoard {
    path: Option<PathBuf>,
    entries: Vec<ScoreEntry>,
}

impl ScoreBoard {
    /// Board that is never written to disk.
    pub fn in_memory(entries: Vec<ScoreEntry>) -> Self {
        let mut board = Self {
            path: None,
            entries,
        };
        board.normalize();
        board
    }

    /// Load from `path`. A missing file is an empty board.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ScoreError> {
        let path = path.into();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| ScoreError::IoError(e.to_string()))?;
            Self::parse(&content)
        } else {
            debug!("No score file at {}, starting fresh", path.display());
            Vec::new()
        };

        let mut board = Self {
            path: Some(path),
            entries,
        };
        board.normalize();
        Ok(board)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn parse(content: &str) -> Vec<ScoreEntry> {
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(|line| {
                let (initials, seconds) = line.split_once(',')?;
                let seconds = seconds.trim().parse().ok()?;
                Some(ScoreEntry {
                    initials: initials.trim().to_string(),
                    seconds,
                })
            })
            .collect()
    }

    pub fn to_text(&self) -> String {
        entries_text(&self.entries)
    }

    fn normalize(&mut self) {
        normalize(&mut self.entries);
    }

    fn qualifies(&self, seconds: u64) -> bool {
        match self.entries.last() {
            Some(slowest) if self.entries.len() >= TOP_SCORES => seconds < slowest.seconds,
            _ => true,
        }
    }

    /// Persist `entries`. The board itself is untouched.
    fn save(&self, entries: &[ScoreEntry]) -> Result<(), ScoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ScoreError::IoError(e.to_string()))?;
        }
        std::fs::write(path, entries_text(entries)).map_err(|e| ScoreError::IoError(e.to_string()))
    }
}

fn normalize(entries: &mut Vec<ScoreEntry>) {
    entries.sort_by_key(|e| e.seconds);
    entries.truncate(TOP_SCORES);
}

fn entries_text(entries: &[ScoreEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{},{}\n", e.initials, e.seconds))
        .collect()
}

impl ScoreKeeper for ScoreBoard {
    fn rank_for(&self, seconds: u64) -> Option<u8> {
        if !self.qualifies(seconds) {
            return None;
        }
        let faster = self.entries.iter().filter(|e| e.seconds < seconds).count();
        u8::try_from(faster + 1).ok()
    }

    fn record(&mut self, initials: &str, seconds: u64) -> Result<Option<u8>, ScoreError> {
        let initials = initials.trim();
        if initials.is_empty() || !initials.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ScoreError::InvalidInitials(initials.to_string()));
        }

        let Some(rank) = self.rank_for(seconds) else {
            return Ok(None);
        };

        let mut entries = self.entries.clone();
        entries.push(ScoreEntry {
            initials: initials.to_uppercase(),
            seconds,
        });
        normalize(&mut entries);
        self.save(&entries)?;
        self.entries = entries;
        info!("Recorded {} at {} (rank {})", initials, format_time(seconds), rank);
        Ok(Some(rank))
    }

    fn top_scores(&self) -> Vec<ScoreEntry> {
        self.entries.clone()
    }
}
