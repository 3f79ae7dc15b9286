//! Remote state-transition table
//!
//! The remote side is authoritative: every target state maps to one remote
//! mutation, and draft dossiers get a silent pass-to-instruction step
//! inserted first because the remote schema has no direct edge from draft to
//! a terminal state. Attempts that the remote side considers illegal (e.g.
//! re-accepting an accepted dossier) are still issued; the remote rejection
//! message is surfaced verbatim.

use crate::error::{Error, Result};
use crate::models::DossierStatus;

use super::client::TransitionKind;

/// One remote mutation of a (possibly compound) transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub kind: TransitionKind,
    /// Remote notifications are suppressed on intermediate steps only
    pub disable_notification: bool,
}

const fn kind_for_target(target: DossierStatus) -> Option<TransitionKind> {
    match target {
        DossierStatus::Draft => None,
        DossierStatus::OnGoing => Some(TransitionKind::PassToInstruction),
        DossierStatus::Accepted => Some(TransitionKind::Accept),
        DossierStatus::Refused => Some(TransitionKind::Refuse),
        DossierStatus::WithoutContinuation => Some(TransitionKind::ClassifyWithoutContinuation),
    }
}

/// Compute the remote mutation sequence from `from` to `target`.
///
/// Errors only when no remote mutation exists for the target (draft);
/// whether the transition is legal from `from` is the remote side's call.
pub fn steps_to(from: DossierStatus, target: DossierStatus) -> Result<Vec<Step>> {
    let Some(kind) = kind_for_target(target) else {
        return Err(Error::InvalidInput(
            "no remote transition leads back to draft".to_string(),
        ));
    };

    let mut steps = Vec::with_capacity(2);
    if from == DossierStatus::Draft && kind != TransitionKind::PassToInstruction {
        steps.push(Step {
            kind: TransitionKind::PassToInstruction,
            disable_notification: true,
        });
    }
    steps.push(Step {
        kind,
        disable_notification: false,
    });

    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use DossierStatus::{Accepted, Draft, OnGoing, Refused, WithoutContinuation};

    #[test]
    fn draft_to_on_going_is_a_single_notified_step() {
        let steps = steps_to(Draft, OnGoing).unwrap();
        assert_eq!(
            steps,
            vec![Step {
                kind: TransitionKind::PassToInstruction,
                disable_notification: false,
            }]
        );
    }

    #[test]
    fn draft_to_accepted_inserts_silent_instruction_step() {
        let steps = steps_to(Draft, Accepted).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].kind, TransitionKind::PassToInstruction);
        assert!(steps[0].disable_notification);
        assert_eq!(steps[1].kind, TransitionKind::Accept);
        assert!(!steps[1].disable_notification);
    }

    #[test]
    fn draft_to_without_continuation_inserts_silent_instruction_step() {
        let steps = steps_to(Draft, WithoutContinuation).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].kind, TransitionKind::PassToInstruction);
        assert!(steps[0].disable_notification);
        assert_eq!(
            steps[1].kind,
            TransitionKind::ClassifyWithoutContinuation
        );
    }

    #[test]
    fn on_going_transitions_are_direct() {
        for (target, kind) in [
            (Accepted, TransitionKind::Accept),
            (Refused, TransitionKind::Refuse),
            (
                WithoutContinuation,
                TransitionKind::ClassifyWithoutContinuation,
            ),
        ] {
            let steps = steps_to(OnGoing, target).unwrap();
            assert_eq!(steps.len(), 1);
            assert_eq!(steps[0].kind, kind);
            assert!(!steps[0].disable_notification);
        }
    }

    #[test]
    fn on_going_to_on_going_is_attempted_and_left_to_remote() {
        // The remote side rejects with "already on_going"; we still issue it.
        let steps = steps_to(OnGoing, OnGoing).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].kind, TransitionKind::PassToInstruction);
    }

    #[test]
    fn terminal_to_without_continuation_is_attempted_and_left_to_remote() {
        for from in [Accepted, Refused, WithoutContinuation] {
            let steps = steps_to(from, WithoutContinuation).unwrap();
            assert_eq!(steps.len(), 1);
            assert_eq!(
                steps[0].kind,
                TransitionKind::ClassifyWithoutContinuation
            );
        }
    }

    #[test]
    fn no_transition_targets_draft() {
        assert!(steps_to(OnGoing, Draft).is_err());
    }
}
