//! Check severity levels.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The severity level of a QC check.
///
/// Levels only drive report ordering and downstream triage; they never change
/// control flow. They are ordered by severity: Error > Warning > Info.
///
/// # Examples
///
/// ```rust
/// use term_qc::core::Level;
///
/// assert!(Level::Error > Level::Warning);
/// assert_eq!(Level::Error.rank(), 1);
/// assert_eq!("info".parse::<Level>().unwrap(), Level::Info);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Informational level - descriptive output, nothing to fix
    Info = 0,
    /// Warning level - should be reviewed before the data is used
    #[default]
    Warning = 1,
    /// Error level - the data must not be used as is
    Error = 2,
}

impl Level {
    /// All levels, most severe first.
    pub const ALL: [Level; 3] = [Level::Error, Level::Warning, Level::Info];

    /// Returns the string representation of the level.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
        }
    }

    /// Returns the report rank of the level: 1 for error, 2 for warning,
    /// 3 for info.
    ///
    /// The rank is exported next to the label so that external consumers can
    /// sort rows without knowing the labels.
    pub fn rank(&self) -> u8 {
        match self {
            Level::Error => 1,
            Level::Warning => 2,
            Level::Info => 3,
        }
    }

    /// Checks if this level is at least as severe as another level.
    pub fn is_at_least(&self, other: Level) -> bool {
        *self >= other
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error" => Ok(Level::Error),
            "warning" => Ok(Level::Warning),
            "info" => Ok(Level::Info),
            other => Err(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Error > Level::Warning);
        assert!(Level::Warning > Level::Info);
        assert!(Level::Error > Level::Info);
    }

    #[test]
    fn test_rank_follows_severity() {
        assert_eq!(Level::Error.rank(), 1);
        assert_eq!(Level::Warning.rank(), 2);
        assert_eq!(Level::Info.rank(), 3);
        for pair in Level::ALL.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
        }
    }

    #[test]
    fn test_level_parse() {
        assert_eq!("error".parse::<Level>(), Ok(Level::Error));
        assert_eq!("warning".parse::<Level>(), Ok(Level::Warning));
        assert_eq!("Error".parse::<Level>(), Err("Error".to_string()));
    }

    #[test]
    fn test_level_is_at_least() {
        assert!(Level::Error.is_at_least(Level::Warning));
        assert!(Level::Warning.is_at_least(Level::Warning));
        assert!(!Level::Info.is_at_least(Level::Error));
    }

    #[test]
    fn test_level_serde() {
        let json = serde_json::to_string(&Level::Error).unwrap();
        assert_eq!(json, "\"error\"");

        let level: Level = serde_json::from_str("\"warning\"").unwrap();
        assert_eq!(level, Level::Warning);
    }
}
