//! Session state machine
//!
//! The lifecycle of one edit session as an explicit tagged state. Every
//! mutation of the lifecycle goes through [`transition`], so a concurrent
//! save or a remote update over local edits is an illegal transition
//! rather than a flag check scattered through the controller.

use crate::error::StateError;

/// Lifecycle state of an edit session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Constructed, nothing loaded yet
    #[default]
    Idle,
    /// A load is in flight
    Loading,
    /// Record shown and editable
    Ready {
        /// Unsaved local edits
        dirty: bool,
    },
    /// A save (including its validation step) is in flight
    Saving,
    /// A delete is in flight
    Deleting,
    /// Record deleted; the session only navigates away from here
    Deleted,
    /// Last load failed
    Failed,
}

/// Events driving the session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEvent {
    /// Load or reload requested
    Load,
    /// Load completed
    Loaded,
    /// Load failed
    LoadFailed,
    /// User edited the record
    Edit,
    /// Edits discarded or persisted out of band
    MarkPristine,
    /// Save requested
    Save,
    /// Local validation rejected the save
    Invalid,
    /// Save completed
    Saved,
    /// Save failed
    SaveFailed,
    /// Delete requested
    Delete,
    /// Delete completed
    DeleteDone,
    /// Delete failed or was declined
    DeleteFailed,
    /// Newer copy pushed by the server
    RemoteUpdate,
}

impl SessionState {
    /// A load is in flight
    #[inline]
    #[must_use]
    pub fn is_loading(self) -> bool {
        matches!(self, SessionState::Loading)
    }

    /// A save is in flight
    #[inline]
    #[must_use]
    pub fn is_saving(self) -> bool {
        matches!(self, SessionState::Saving)
    }

    /// Unsaved local edits exist
    #[inline]
    #[must_use]
    pub fn is_dirty(self) -> bool {
        matches!(self, SessionState::Ready { dirty: true })
    }

    /// Any collaborator call is in flight
    #[inline]
    #[must_use]
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            SessionState::Loading | SessionState::Saving | SessionState::Deleting
        )
    }

    /// Whether this state accepts `event`
    #[inline]
    #[must_use]
    pub fn accepts(self, event: SessionEvent) -> bool {
        next_state(self, event).is_some()
    }
}

/// Compute the state reached from `from` on `event`
///
/// # Errors
/// `StateError::IllegalTransition` when `from` does not accept `event`.
pub fn transition(from: SessionState, event: SessionEvent) -> Result<SessionState, StateError> {
    let next = next_state(from, event).ok_or(StateError::IllegalTransition { from, event })?;
    tracing::trace!(?from, ?event, ?next, "session transition");
    Ok(next)
}

/// Events accepted in `from`
#[must_use]
pub fn allowed_events(from: SessionState) -> Vec<SessionEvent> {
    ALL_EVENTS
        .iter()
        .copied()
        .filter(|e| from.accepts(*e))
        .collect()
}

const ALL_EVENTS: [SessionEvent; 13] = [
    SessionEvent::Load,
    SessionEvent::Loaded,
    SessionEvent::LoadFailed,
    SessionEvent::Edit,
    SessionEvent::MarkPristine,
    SessionEvent::Save,
    SessionEvent::Invalid,
    SessionEvent::Saved,
    SessionEvent::SaveFailed,
    SessionEvent::Delete,
    SessionEvent::DeleteDone,
    SessionEvent::DeleteFailed,
    SessionEvent::RemoteUpdate,
];

fn next_state(from: SessionState, event: SessionEvent) -> Option<SessionState> {
    use SessionEvent as E;
    use SessionState as S;
    match (from, event) {
        (S::Idle | S::Ready { .. } | S::Failed, E::Load) => Some(S::Loading),
        (S::Loading, E::Loaded) => Some(S::Ready { dirty: false }),
        (S::Loading, E::LoadFailed) => Some(S::Failed),

        (S::Ready { .. }, E::Edit) => Some(S::Ready { dirty: true }),
        (S::Ready { .. }, E::MarkPristine) => Some(S::Ready { dirty: false }),
        (S::Ready { dirty: false }, E::RemoteUpdate) => Some(S::Ready { dirty: false }),

        (S::Ready { .. }, E::Save) => Some(S::Saving),
        (S::Saving, E::Invalid | E::SaveFailed) => Some(S::Ready { dirty: true }),
        (S::Saving, E::Saved) => Some(S::Ready { dirty: false }),

        (S::Ready { .. }, E::Delete) => Some(S::Deleting),
        (S::Deleting, E::DeleteDone) => Some(S::Deleted),
        (S::Deleting, E::DeleteFailed) => Some(S::Ready { dirty: true }),

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn load_cycle() {
        let s = transition(SessionState::Idle, SessionEvent::Load).unwrap();
        assert!(s.is_loading());
        let s = transition(s, SessionEvent::Loaded).unwrap();
        assert_eq!(s, SessionState::Ready { dirty: false });
    }

    #[test]
    fn concurrent_save_is_illegal() {
        let saving = transition(SessionState::Ready { dirty: true }, SessionEvent::Save).unwrap();
        let err = transition(saving, SessionEvent::Save).unwrap_err();
        assert_eq!(
            err,
            StateError::IllegalTransition {
                from: SessionState::Saving,
                event: SessionEvent::Save
            }
        );
        assert!(transition(SessionState::Loading, SessionEvent::Save).is_err());
    }

    #[test]
    fn failed_save_restores_dirty() {
        let s = transition(SessionState::Saving, SessionEvent::SaveFailed).unwrap();
        assert!(s.is_dirty());
        let s = transition(SessionState::Saving, SessionEvent::Invalid).unwrap();
        assert!(s.is_dirty());
    }

    #[test]
    fn remote_update_only_when_clean() {
        assert!(SessionState::Ready { dirty: false }.accepts(SessionEvent::RemoteUpdate));
        assert!(!SessionState::Ready { dirty: true }.accepts(SessionEvent::RemoteUpdate));
        assert!(!SessionState::Saving.accepts(SessionEvent::RemoteUpdate));
    }

    #[test]
    fn deleted_is_terminal() {
        assert!(allowed_events(SessionState::Deleted).is_empty());
    }

    #[test]
    fn failed_load_can_be_retried() {
        assert_eq!(allowed_events(SessionState::Failed), vec![SessionEvent::Load]);
    }

    fn any_state() -> impl Strategy<Value = SessionState> {
        prop_oneof![
            Just(SessionState::Idle),
            Just(SessionState::Loading),
            Just(SessionState::Ready { dirty: false }),
            Just(SessionState::Ready { dirty: true }),
            Just(SessionState::Saving),
            Just(SessionState::Deleting),
            Just(SessionState::Deleted),
            Just(SessionState::Failed),
        ]
    }

    fn any_event() -> impl Strategy<Value = SessionEvent> {
        proptest::sample::select(ALL_EVENTS.to_vec())
    }

    proptest! {
        #[test]
        fn prop_transition_agrees_with_allowed_events(from in any_state(), event in any_event()) {
            let res = transition(from, event);
            prop_assert_eq!(res.is_ok(), allowed_events(from).contains(&event));
        }

        #[test]
        fn prop_busy_states_reject_save_and_load(from in any_state()) {
            if from.is_busy() {
                prop_assert!(!from.accepts(SessionEvent::Save));
                prop_assert!(!from.accepts(SessionEvent::Load));
            }
        }
    }
}
