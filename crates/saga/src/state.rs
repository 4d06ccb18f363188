//! Transfer orchestration state machine.

use serde::{Deserialize, Serialize};

/// The state of a transfer orchestration.
///
/// State transitions:
/// ```text
/// Start ──► Verifying ──┬──► Executing ──┬──► NotifyingSuccess ──► Done
///                       │                └──► NotifyingFailure ──► Done
///                       └──► NotifyingFailure ──► Done
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TransferState {
    /// Orchestration has not started yet.
    #[default]
    Start,

    /// Customer lookup and risk check are in flight.
    Verifying,

    /// Charge and payment legs (and any compensation) are in flight.
    Executing,

    /// Reporting a successful transfer.
    NotifyingSuccess,

    /// Reporting a failed transfer.
    NotifyingFailure,

    /// Orchestration finished (terminal state).
    Done,
}

impl TransferState {
    /// Returns true if moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: TransferState) -> bool {
        use TransferState::*;
        matches!(
            (self, next),
            (Start, Verifying)
                | (Verifying, Executing)
                | (Verifying, NotifyingFailure)
                | (Executing, NotifyingSuccess)
                | (Executing, NotifyingFailure)
                | (NotifyingSuccess, Done)
                | (NotifyingFailure, Done)
        )
    }

    /// Returns true if ledger mutations may be issued in this state.
    pub fn allows_ledger_mutation(&self) -> bool {
        matches!(self, TransferState::Executing)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Done)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferState::Start => "Start",
            TransferState::Verifying => "Verifying",
            TransferState::Executing => "Executing",
            TransferState::NotifyingSuccess => "NotifyingSuccess",
            TransferState::NotifyingFailure => "NotifyingFailure",
            TransferState::Done => "Done",
        }
    }
}

impl std::fmt::Display for TransferState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TransferState::*;

    const ALL: [TransferState; 6] = [
        Start,
        Verifying,
        Executing,
        NotifyingSuccess,
        NotifyingFailure,
        Done,
    ];

    #[test]
    fn test_default_state_is_start() {
        assert_eq!(TransferState::default(), Start);
    }

    #[test]
    fn test_legal_transitions() {
        assert!(Start.can_transition_to(Verifying));
        assert!(Verifying.can_transition_to(Executing));
        assert!(Verifying.can_transition_to(NotifyingFailure));
        assert!(Executing.can_transition_to(NotifyingSuccess));
        assert!(Executing.can_transition_to(NotifyingFailure));
        assert!(NotifyingSuccess.can_transition_to(Done));
        assert!(NotifyingFailure.can_transition_to(Done));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!Start.can_transition_to(Executing));
        assert!(!Verifying.can_transition_to(NotifyingSuccess));
        assert!(!Executing.can_transition_to(Done));
        for state in ALL {
            assert!(!Done.can_transition_to(state));
        }
    }

    #[test]
    fn test_only_executing_allows_ledger_mutation() {
        for state in ALL {
            assert_eq!(state.allows_ledger_mutation(), state == Executing);
        }
    }

    #[test]
    fn test_terminal_states() {
        for state in ALL {
            assert_eq!(state.is_terminal(), state == Done);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Start.to_string(), "Start");
        assert_eq!(NotifyingSuccess.to_string(), "NotifyingSuccess");
        assert_eq!(Done.to_string(), "Done");
    }

    #[test]
    fn test_serialization() {
        let state = Executing;
        let json = serde_json::to_string(&state).unwrap();
        let deserialized: TransferState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, deserialized);
    }
}
