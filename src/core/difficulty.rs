//! Difficulty profiles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Menu order.
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{other}' (expected easy, medium or hard)")),
        }
    }
}

/// How much help a failed or stalled attempt surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HintVerbosity {
    Full,
    Brief,
    Silent,
}

/// Parameters applied uniformly to every challenge of a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyProfile {
    pub timeout_multiplier: f32,
    pub retry_budget: u8,
    pub hint_verbosity: HintVerbosity,
}

/// The three fixed profiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DifficultyTable {
    pub easy: DifficultyProfile,
    pub medium: DifficultyProfile,
    pub hard: DifficultyProfile,
}

impl Default for DifficultyTable {
    fn default() -> Self {
        Self {
            easy: DifficultyProfile {
                timeout_multiplier: 1.5,
                retry_budget: 2,
                hint_verbosity: HintVerbosity::Full,
            },
            medium: DifficultyProfile {
                timeout_multiplier: 1.0,
                retry_budget: 1,
                hint_verbosity: HintVerbosity::Brief,
            },
            hard: DifficultyProfile {
                timeout_multiplier: 0.5,
                retry_budget: 1,
                hint_verbosity: HintVerbosity::Silent,
            },
        }
    }
}

impl DifficultyTable {
    pub fn profile(&self, difficulty: Difficulty) -> DifficultyProfile {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_difficulty() {
        assert_eq!("Hard".parse::<Difficulty>(), Ok(Difficulty::Hard));
        assert_eq!(" easy ".parse::<Difficulty>(), Ok(Difficulty::Easy));
        assert!("nightmare".parse::<Difficulty>().is_err());
    }

    #[test]
    fn test_default_profiles() {
        let table = DifficultyTable::default();
        assert_eq!(table.profile(Difficulty::Easy).retry_budget, 2);
        assert_eq!(table.profile(Difficulty::Hard).timeout_multiplier, 0.5);
        assert_eq!(
            table.profile(Difficulty::Medium).hint_verbosity,
            HintVerbosity::Brief
        );
    }
}
