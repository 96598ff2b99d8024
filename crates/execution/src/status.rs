//! Invocation-level state tracking.

use serde::{Deserialize, Serialize};

/// The overall state of one workflow invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// Actively running nodes.
    Running,
    /// Every executed node succeeded (or was skipped).
    Completed,
    /// A node failed and no fallback branch recovered it.
    Failed,
    /// The caller's cancellation signal fired.
    Cancelled,
    /// The invocation exceeded its wall-clock budget.
    Timeout,
}

impl ExecutionState {
    /// Returns `true` if the invocation has reached a final state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Returns `true` if the invocation completed successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns `true` if the invocation ended in a failure state.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Timeout)
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

impl std::str::FromStr for ExecutionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            "timeout" => Ok(Self::Timeout),
            other => Err(format!("unknown execution state: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn terminal_states() {
        assert!(!ExecutionState::Running.is_terminal());
        assert!(ExecutionState::Completed.is_terminal());
        assert!(ExecutionState::Failed.is_terminal());
        assert!(ExecutionState::Cancelled.is_terminal());
        assert!(ExecutionState::Timeout.is_terminal());
    }

    #[test]
    fn success_and_failure() {
        assert!(ExecutionState::Completed.is_success());
        assert!(ExecutionState::Failed.is_failure());
        assert!(ExecutionState::Timeout.is_failure());
        assert!(!ExecutionState::Cancelled.is_failure());
    }

    #[test]
    fn display_matches_wire_form() {
        assert_eq!(ExecutionState::Timeout.to_string(), "timeout");
        assert_eq!(
            serde_json::to_string(&ExecutionState::Timeout).unwrap(),
            "\"timeout\""
        );
    }

    #[test]
    fn from_str_roundtrip() {
        for state in [
            ExecutionState::Running,
            ExecutionState::Completed,
            ExecutionState::Failed,
            ExecutionState::Cancelled,
            ExecutionState::Timeout,
        ] {
            let parsed: ExecutionState = state.to_string().parse().unwrap();
            assert_eq!(parsed, state);
        }
        assert!("paused".parse::<ExecutionState>().is_err());
    }
}
