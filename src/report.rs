//! Per-session report.

use crate::core::chapter::ChapterId;
use crate::core::difficulty::Difficulty;
use crate::sensing::filter::CalibrationReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Attempt statistics for one chapter across the whole session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterRecord {
    pub chapter: ChapterId,
    /// Times the chapter was entered (first entry plus every restart into it).
    pub entries: u32,
    pub failed_attempts: u32,
    pub restarts: u32,
    pub cleared: bool,
}

impl ChapterRecord {
    fn new(chapter: ChapterId) -> Self {
        Self {
            chapter,
            entries: 0,
            failed_attempts: 0,
            restarts: 0,
            cleared: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub difficulty: Option<Difficulty>,
    pub calibration: Option<CalibrationReport>,
    pub chapters: Vec<ChapterRecord>,
    pub total_seconds: Option<u64>,
    pub rank: Option<u8>,
    pub initials: Option<String>,
    /// Why the leaderboard could not record this completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_error: Option<String>,
    pub dropped_events: u64,
}

impl Default for SessionReport {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionReport {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            started_at: Utc::now(),
            difficulty: None,
            calibration: None,
            chapters: Vec::new(),
            total_seconds: None,
            rank: None,
            initials: None,
            score_error: None,
            dropped_events: 0,
        }
    }

    fn chapter_mut(&mut self, chapter: ChapterId) -> &mut ChapterRecord {
        let index = match self.chapters.iter().position(|c| c.chapter == chapter) {
            Some(index) => index,
            None => {
                self.chapters.push(ChapterRecord::new(chapter));
                self.chapters.len() - 1
            }
        };
        &mut self.chapters[index]
    }

    pub fn chapter(&self, chapter: ChapterId) -> Option<&ChapterRecord> {
        self.chapters.iter().find(|c| c.chapter == chapter)
    }

    pub fn record_entry(&mut self, chapter: ChapterId) {
        self.chapter_mut(chapter).entries += 1;
    }

    pub fn record_failure(&mut self, chapter: ChapterId) {
        self.chapter_mut(chapter).failed_attempts += 1;
    }

    pub fn record_restart(&mut self, chapter: ChapterId) {
        self.chapter_mut(chapter).restarts += 1;
    }

    pub fn record_cleared(&mut self, chapter: ChapterId) {
        self.chapter_mut(chapter).cleared = true;
    }

    pub fn to_json(&self) -> Result<String, ReportError> {
        serde_json::to_string_pretty(self).map_err(|e| ReportError::SerializeError(e.to_string()))
    }

    /// Write `<dir>/<session_id>.json`.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, ReportError> {
        std::fs::create_dir_all(dir).map_err(|e| ReportError::IoError(e.to_string()))?;
        let path = dir.join(format!("{}.json", self.session_id));
        std::fs::write(&path, self.to_json()?).map_err(|e| ReportError::IoError(e.to_string()))?;
        Ok(path)
    }
}

#[derive(Debug)]
pub enum ReportError {
    IoError(String),
    SerializeError(String),
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportError::IoError(e) => write!(f, "IO error: {e}"),
            ReportError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ReportError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chapter_records_accumulate() {
        let mut report = SessionReport::new();
        let one = ChapterId::new(1);
        report.record_entry(one);
        report.record_failure(one);
        report.record_restart(one);
        report.record_entry(one);
        report.record_cleared(one);

        let record = report.chapter(one).unwrap();
        assert_eq!(record.entries, 2);
        assert_eq!(record.failed_attempts, 1);
        assert_eq!(record.restarts, 1);
        assert!(record.cleared);
        assert!(report.chapter(ChapterId::new(2)).is_none());
    }

    #[test]
    fn test_save_as_json() {
        let dir = std::env::temp_dir().join(format!("fogline-report-{}", Uuid::new_v4()));
        let mut report = SessionReport::new();
        report.difficulty = Some(Difficulty::Hard);
        report.total_seconds = Some(125);

        let path = report.save(&dir).unwrap();
        let parsed: SessionReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.session_id, report.session_id);
        assert_eq!(parsed.difficulty, Some(Difficulty::Hard));
        assert_eq!(parsed.total_seconds, Some(125));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
