//! Countdown agreement lifecycle.
//!
//! The ledger is the only authority on an agreement's phase. These types
//! describe the automaton as observed from a status snapshot, so callers can
//! tell ahead of time whether `withdraw` has a chance of succeeding.

use serde::{Deserialize, Serialize};

use crate::agreement::AgreementStatus;

/// Phases of an agreement as seen through its status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CountdownPhase {
    /// Stake held; no countdown running. Simple agreements never leave this phase.
    Active,
    /// Countdown started, deadline not yet reached.
    CountdownStarted,
    /// Deadline passed; the stake can be retrieved.
    Withdrawable,
    /// Terminal - stake retrieved.
    Withdrawn,
}

impl CountdownPhase {
    /// Check if this is a terminal phase.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Withdrawn)
    }

    /// Get valid transitions from the current phase.
    pub fn valid_transitions(&self) -> &'static [CountdownPhase] {
        match self {
            Self::Active => &[Self::CountdownStarted],
            Self::CountdownStarted => &[Self::Withdrawable],
            Self::Withdrawable => &[Self::Withdrawn],
            Self::Withdrawn => &[],
        }
    }

    /// Check if transition to target phase is valid.
    pub fn can_transition_to(&self, target: CountdownPhase) -> bool {
        self.valid_transitions().contains(&target)
    }

    /// Derive the phase from a status snapshot at unix time `now`.
    pub fn observe(status: &AgreementStatus, now: u64) -> Self {
        let deadline = match status.countdown.and_then(|c| c.deadline) {
            Some(deadline) => deadline,
            None => return Self::Active,
        };

        if now < deadline {
            Self::CountdownStarted
        } else if status.has_stake() {
            Self::Withdrawable
        } else {
            Self::Withdrawn
        }
    }

    /// Whether `request_withdraw` can move the agreement forward from here.
    pub fn accepts_withdraw_request(&self) -> bool {
        self.can_transition_to(Self::CountdownStarted)
    }

    /// Whether `withdraw` can move the agreement forward from here.
    pub fn accepts_withdraw(&self) -> bool {
        self.can_transition_to(Self::Withdrawn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::agreement::CountdownStatus;

    fn status(stake: &str, countdown: Option<CountdownStatus>) -> AgreementStatus {
        AgreementStatus {
            staker: Address::ZERO,
            counterparty: Address::ZERO,
            current_stake: stake.to_string(),
            cost_ratio: "0.3".to_string(),
            countdown,
        }
    }

    fn started(deadline: u64) -> Option<CountdownStatus> {
        Some(CountdownStatus {
            length: 100,
            deadline: Some(deadline),
        })
    }

    #[test]
    fn transitions() {
        let phase = CountdownPhase::Active;
        assert!(phase.can_transition_to(CountdownPhase::CountdownStarted));
        assert!(!phase.can_transition_to(CountdownPhase::Withdrawn));
        assert!(CountdownPhase::Withdrawable.can_transition_to(CountdownPhase::Withdrawn));
        assert!(CountdownPhase::Withdrawn.valid_transitions().is_empty());
    }

    #[test]
    fn terminal_phases() {
        assert!(CountdownPhase::Withdrawn.is_terminal());
        assert!(!CountdownPhase::Withdrawable.is_terminal());
    }

    #[test]
    fn simple_agreement_is_always_active() {
        assert_eq!(CountdownPhase::observe(&status("5", None), u64::MAX), CountdownPhase::Active);
    }

    #[test]
    fn phase_follows_the_deadline() {
        let s = status("5", started(1_000));
        assert_eq!(CountdownPhase::observe(&s, 999), CountdownPhase::CountdownStarted);
        assert_eq!(CountdownPhase::observe(&s, 1_000), CountdownPhase::Withdrawable);

        let emptied = status("0", started(1_000));
        assert_eq!(CountdownPhase::observe(&emptied, 2_000), CountdownPhase::Withdrawn);
    }

    #[test]
    fn not_started_countdown_is_active() {
        let s = status(
            "5",
            Some(CountdownStatus {
                length: 100,
                deadline: None,
            }),
        );
        let phase = CountdownPhase::observe(&s, 0);
        assert_eq!(phase, CountdownPhase::Active);
        assert!(phase.accepts_withdraw_request());
        assert!(!phase.accepts_withdraw());
    }
}
