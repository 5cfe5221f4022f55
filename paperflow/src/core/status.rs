//! Stage identity and status enums.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four processing steps every source document goes through.
///
/// The declaration order is the execution order: a stage always consumes
/// the output of the stage(s) before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    /// Reads the PDF through the document tool and drafts a structured payload.
    Read,
    /// Reviews the read draft and emits the corrected structured payload.
    Review,
    /// Researches related work on the web, free-text output.
    Research,
    /// Composes the final article from the review and research outputs.
    Compose,
}

impl StageName {
    /// All stages in execution order.
    pub const ALL: [Self; 4] = [Self::Read, Self::Review, Self::Research, Self::Compose];

    /// Returns the stable snake-case name of the stage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Review => "review",
            Self::Research => "research",
            Self::Compose => "compose",
        }
    }

    /// Key of the agent profile bound to this stage in `agents.yaml`.
    #[must_use]
    pub const fn agent_key(&self) -> &'static str {
        match self {
            Self::Read => "reader",
            Self::Review => "reviewer",
            Self::Research => "researcher",
            Self::Compose => "composer",
        }
    }

    /// Position of the stage in the pipeline (0-based).
    #[must_use]
    pub const fn index(&self) -> usize {
        match self {
            Self::Read => 0,
            Self::Review => 1,
            Self::Research => 2,
            Self::Compose => 3,
        }
    }

    /// Returns the stage that runs after this one, if any.
    #[must_use]
    pub const fn next(&self) -> Option<Self> {
        match self {
            Self::Read => Some(Self::Review),
            Self::Review => Some(Self::Research),
            Self::Research => Some(Self::Compose),
            Self::Compose => None,
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "read" => Ok(Self::Read),
            "review" => Ok(Self::Review),
            "research" => Ok(Self::Research),
            "compose" => Ok(Self::Compose),
            other => Err(format!("unknown stage: {other}")),
        }
    }
}

/// The execution status of a stage for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage has not been attempted yet.
    #[default]
    Pending,
    /// Stage is currently running.
    Running,
    /// Stage completed successfully.
    Ok,
    /// Stage failed.
    Fail,
    /// Stage was never attempted because an earlier stage failed.
    Skip,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Ok => write!(f, "ok"),
            Self::Fail => write!(f, "fail"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ok | Self::Fail | Self::Skip)
    }

    /// Returns true if the status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_name_display() {
        assert_eq!(StageName::Read.to_string(), "read");
        assert_eq!(StageName::Review.to_string(), "review");
        assert_eq!(StageName::Research.to_string(), "research");
        assert_eq!(StageName::Compose.to_string(), "compose");
    }

    #[test]
    fn test_stage_order() {
        let mut stage = StageName::Read;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            assert!(next > stage);
            seen.push(next);
            stage = next;
        }
        assert_eq!(seen, StageName::ALL.to_vec());
        assert_eq!(StageName::Compose.index(), 3);
    }

    #[test]
    fn test_stage_name_from_str() {
        assert_eq!("Review".parse::<StageName>(), Ok(StageName::Review));
        assert!("publish".parse::<StageName>().is_err());
    }

    #[test]
    fn test_stage_status_is_terminal() {
        assert!(StageStatus::Ok.is_terminal());
        assert!(StageStatus::Skip.is_terminal());
        assert!(StageStatus::Fail.is_terminal());
        assert!(!StageStatus::Pending.is_terminal());
        assert!(!StageStatus::Running.is_terminal());
    }

    #[test]
    fn test_stage_name_serialize() {
        let json = serde_json::to_string(&StageName::Research).unwrap();
        assert_eq!(json, r#""research""#);

        let deserialized: StageName = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, StageName::Research);
    }
}
