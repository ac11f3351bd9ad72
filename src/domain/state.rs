use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{Result, SynchroError};

/// Per-attempt trade state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeState {
    Idle,
    FetchingSignatures,
    Selecting,
    ComputingAmounts,
    EstimatingGas,
    /// Wallet has been asked to sign and broadcast
    Submitting,
    Confirmed,
    /// User declined in the wallet
    Rejected,
    Failed,
}

impl TradeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeState::Idle => "IDLE",
            TradeState::FetchingSignatures => "FETCHING_SIGNATURES",
            TradeState::Selecting => "SELECTING",
            TradeState::ComputingAmounts => "COMPUTING_AMOUNTS",
            TradeState::EstimatingGas => "ESTIMATING_GAS",
            TradeState::Submitting => "SUBMITTING",
            TradeState::Confirmed => "CONFIRMED",
            TradeState::Rejected => "REJECTED",
            TradeState::Failed => "FAILED",
        }
    }

    /// Check if this state can transition to another state
    pub fn can_transition_to(&self, target: TradeState) -> bool {
        use TradeState::*;

        match (self, target) {
            (Idle, FetchingSignatures) => true,
            (FetchingSignatures, Selecting) => true,
            (Selecting, ComputingAmounts) => true,
            (ComputingAmounts, EstimatingGas) => true,
            (EstimatingGas, Submitting) => true,
            (Submitting, Confirmed) | (Submitting, Rejected) => true,

            // Any non-terminal state may abort
            (from, Failed) => !from.is_terminal(),

            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TradeState::Confirmed | TradeState::Rejected | TradeState::Failed
        )
    }
}

impl fmt::Display for TradeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tracks one trade attempt through the state machine
#[derive(Debug, Clone)]
pub struct TradeAttempt {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    state: TradeState,
    history: Vec<TradeState>,
}

impl TradeAttempt {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            state: TradeState::Idle,
            history: vec![TradeState::Idle],
        }
    }

    pub fn state(&self) -> TradeState {
        self.state
    }

    pub fn history(&self) -> &[TradeState] {
        &self.history
    }

    /// Move to `target`, refusing edges the state machine does not allow
    pub fn advance(&mut self, target: TradeState) -> Result<()> {
        if !self.state.can_transition_to(target) {
            return Err(SynchroError::InvalidStateTransition {
                from: self.state.to_string(),
                to: target.to_string(),
            });
        }
        tracing::debug!(attempt = %self.id, "{} -> {}", self.state, target);
        self.state = target;
        self.history.push(target);
        Ok(())
    }
}

impl Default for TradeAttempt {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_visits_every_state() {
        let mut attempt = TradeAttempt::new();
        for state in [
            TradeState::FetchingSignatures,
            TradeState::Selecting,
            TradeState::ComputingAmounts,
            TradeState::EstimatingGas,
            TradeState::Submitting,
            TradeState::Confirmed,
        ] {
            attempt.advance(state).unwrap();
        }
        assert_eq!(attempt.history().len(), 7);
        assert!(attempt.state().is_terminal());
    }

    #[test]
    fn states_cannot_be_skipped() {
        let mut attempt = TradeAttempt::new();
        attempt.advance(TradeState::FetchingSignatures).unwrap();
        assert!(attempt.advance(TradeState::EstimatingGas).is_err());
        assert!(attempt.advance(TradeState::Submitting).is_err());
        assert_eq!(attempt.state(), TradeState::FetchingSignatures);
    }

    #[test]
    fn rejection_only_follows_submission() {
        assert!(!TradeState::EstimatingGas.can_transition_to(TradeState::Rejected));
        assert!(TradeState::Submitting.can_transition_to(TradeState::Rejected));
        assert!(!TradeState::Failed.can_transition_to(TradeState::Failed));
    }
}
