//! Session state store.
//!
//! A single state machine describing the quiz session the UI is showing.
//! State changes only through [`SessionStore::dispatch`]; readers take
//! snapshots or subscribe to a `tokio::sync::watch` channel that yields on
//! every applied change.
//!
//! ```text
//! idle --StartLoading--> loading --Hydrate(step)--> active --Hydrate(result)--> finished
//!                           |                        |  ^
//!                           |                        +--+ Hydrate(step)
//!                           +--Hydrate(result)--> finished
//! any --SetError--> error          error|finished|active|loading --Reset--> idle
//! ```

use std::fmt;

use tokio::sync::watch;

use crate::model::{PollResult, ResultProfile, SessionId, StepView};

/// Coarse session status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    Idle,
    Loading,
    Active,
    Finished,
    Error,
}

impl SessionStatus {
    /// Position in the forward lifecycle. `Error` ranks last because it can be
    /// entered from anywhere and only `Reset` leaves it.
    pub fn rank(self) -> u8 {
        match self {
            SessionStatus::Idle => 0,
            SessionStatus::Loading => 1,
            SessionStatus::Active => 2,
            SessionStatus::Finished => 3,
            SessionStatus::Error => 4,
        }
    }

    /// No hydration is accepted in a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Finished | SessionStatus::Error)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Loading => "loading",
            SessionStatus::Active => "active",
            SessionStatus::Finished => "finished",
            SessionStatus::Error => "error",
        };
        f.write_str(label)
    }
}

/// What the UI should currently render.
#[derive(Debug, Clone, PartialEq)]
pub enum CurrentView {
    Step(StepView),
    Result(ResultProfile),
}

/// Error surfaced to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionError {
    pub message: String,
    pub code: Option<String>,
}

/// Snapshot of the session as the UI sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub status: SessionStatus,
    pub session_id: Option<SessionId>,
    pub current_view: Option<CurrentView>,
    pub answered_count: u32,
    pub target_count: u32,
    /// Question count used when the backend does not announce one.
    pub default_target: u32,
    pub error: Option<SessionError>,
    /// Incremented by every reset; distinguishes session lifecycles.
    pub lifecycle: u64,
}

impl SessionState {
    pub fn new(target_count: u32) -> Self {
        Self {
            status: SessionStatus::Idle,
            session_id: None,
            current_view: None,
            answered_count: 0,
            target_count,
            default_target: target_count,
            error: None,
            lifecycle: 0,
        }
    }

    /// Questions the client has already seen in this session.
    pub fn known_questions(&self) -> u32 {
        let showing_question = matches!(
            &self.current_view,
            Some(CurrentView::Step(StepView::Question(_)))
        );
        self.answered_count + u32::from(showing_question)
    }

    /// Apply `action`, returning whether anything changed.
    pub fn apply(&mut self, action: Action) -> bool {
        match action {
            Action::StartLoading {
                session_id,
                target_count,
            } => {
                if self.status != SessionStatus::Idle {
                    return false;
                }
                self.status = SessionStatus::Loading;
                self.session_id = Some(session_id);
                self.target_count = target_count.unwrap_or(self.default_target);
                true
            }
            Action::Hydrate {
                session_id,
                result,
                answered,
            } => {
                if self.status.is_terminal() || self.status == SessionStatus::Idle {
                    return false;
                }
                if self.session_id.as_ref() != Some(&session_id) {
                    tracing::debug!(stale = %session_id, "ignoring hydrate for superseded session");
                    return false;
                }
                match result {
                    PollResult::Processing { .. } => false,
                    PollResult::ActiveStep { step } => {
                        if answered && self.status == SessionStatus::Active {
                            self.answered_count += 1;
                        }
                        self.status = SessionStatus::Active;
                        self.current_view = Some(CurrentView::Step(step));
                        true
                    }
                    PollResult::Finished { result } => {
                        if answered && self.status == SessionStatus::Active {
                            self.answered_count += 1;
                        }
                        self.status = SessionStatus::Finished;
                        self.current_view = Some(CurrentView::Result(result));
                        true
                    }
                }
            }
            Action::SetError { message, code } => {
                self.status = SessionStatus::Error;
                self.error = Some(SessionError { message, code });
                true
            }
            Action::Reset => {
                if self.status == SessionStatus::Idle {
                    return false;
                }
                *self = SessionState {
                    lifecycle: self.lifecycle + 1,
                    ..SessionState::new(self.default_target)
                };
                true
            }
        }
    }
}

/// Store actions.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    StartLoading {
        session_id: SessionId,
        target_count: Option<u32>,
    },
    Hydrate {
        session_id: SessionId,
        result: PollResult,
        /// The step was fetched after submitting an answer.
        answered: bool,
    },
    SetError {
        message: String,
        code: Option<String>,
    },
    Reset,
}

/// Receiver side of a store subscription.
pub type SessionWatcher = watch::Receiver<SessionState>;

/// Owner of the one [`SessionState`] of a client.
pub struct SessionStore {
    sender: watch::Sender<SessionState>,
}

impl SessionStore {
    pub fn new(target_count: u32) -> Self {
        let (sender, _rx) = watch::channel(SessionState::new(target_count));
        Self { sender }
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> SessionWatcher {
        self.sender.subscribe()
    }

    /// Clone of the current state.
    pub fn snapshot(&self) -> SessionState {
        self.sender.borrow().clone()
    }

    /// Apply an action; subscribers are woken only if the state changed.
    pub fn dispatch(&self, action: Action) -> bool {
        let label = action_label(&action);
        self.sender.send_if_modified(|state| {
            let from = state.status;
            let changed = state.apply(action);
            if changed {
                tracing::debug!(action = label, %from, to = %state.status, "session state updated");
            } else {
                tracing::trace!(action = label, status = %from, "action ignored");
            }
            changed
        })
    }
}

fn action_label(action: &Action) -> &'static str {
    match action {
        Action::StartLoading { .. } => "start_loading",
        Action::Hydrate { .. } => "hydrate",
        Action::SetError { .. } => "set_error",
        Action::Reset => "reset",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::question_step;
    use crate::model::Synopsis;

    fn id(s: &str) -> SessionId {
        SessionId::from(s)
    }

    fn start(s: &str) -> Action {
        Action::StartLoading {
            session_id: id(s),
            target_count: None,
        }
    }

    fn hydrate(s: &str, result: PollResult, answered: bool) -> Action {
        Action::Hydrate {
            session_id: id(s),
            result,
            answered,
        }
    }

    fn finished() -> PollResult {
        PollResult::Finished {
            result: ResultProfile {
                title: "Grandmaster".into(),
                description: String::new(),
                image_url: None,
                traits: vec![],
            },
        }
    }

    fn synopsis() -> PollResult {
        PollResult::ActiveStep {
            step: StepView::Synopsis(Synopsis {
                title: "Chess".into(),
                summary: String::new(),
            }),
        }
    }

    fn error() -> Action {
        Action::SetError {
            message: "boom".into(),
            code: None,
        }
    }

    #[test]
    fn happy_path() {
        let mut state = SessionState::new(10);
        assert!(state.apply(start("q-1")));
        assert_eq!(state.status, SessionStatus::Loading);

        assert!(state.apply(hydrate("q-1", synopsis(), false)));
        assert_eq!(state.status, SessionStatus::Active);
        assert_eq!(state.known_questions(), 0);

        assert!(state.apply(hydrate("q-1", question_step("Q1"), false)));
        assert_eq!(state.answered_count, 0);
        assert_eq!(state.known_questions(), 1);

        assert!(state.apply(hydrate("q-1", question_step("Q2"), true)));
        assert_eq!(state.answered_count, 1);
        assert_eq!(state.known_questions(), 2);

        assert!(state.apply(hydrate("q-1", finished(), true)));
        assert_eq!(state.status, SessionStatus::Finished);
        assert_eq!(state.answered_count, 2);
        assert!(matches!(state.current_view, Some(CurrentView::Result(_))));
    }

    #[test]
    fn loading_can_finish_directly() {
        let mut state = SessionState::new(10);
        state.apply(start("q-1"));
        assert!(state.apply(hydrate("q-1", finished(), false)));
        assert_eq!(state.status, SessionStatus::Finished);
    }

    #[test]
    fn processing_is_a_no_op() {
        let mut state = SessionState::new(10);
        state.apply(start("q-1"));
        let processing = PollResult::Processing {
            session_id: id("q-1"),
        };
        assert!(!state.apply(hydrate("q-1", processing, false)));
        assert_eq!(state.status, SessionStatus::Loading);
    }

    #[test]
    fn stale_session_is_ignored() {
        let mut state = SessionState::new(10);
        state.apply(start("q-1"));
        state.apply(Action::Reset);
        state.apply(start("q-2"));

        let before = state.clone();
        assert!(!state.apply(hydrate("q-1", question_step("old"), false)));
        assert_eq!(state, before);
    }

    #[test]
    fn terminal_states_reject_hydration() {
        let mut state = SessionState::new(10);
        state.apply(start("q-1"));
        state.apply(hydrate("q-1", finished(), false));
        assert!(!state.apply(hydrate("q-1", question_step("late"), false)));
        assert_eq!(state.status, SessionStatus::Finished);

        let mut state = SessionState::new(10);
        state.apply(start("q-1"));
        state.apply(error());
        assert!(!state.apply(hydrate("q-1", question_step("late"), false)));
        assert_eq!(state.status, SessionStatus::Error);
        assert_eq!(state.error.as_ref().unwrap().message, "boom");
    }

    #[test]
    fn idle_rejects_hydration_and_restart_requires_reset() {
        let mut state = SessionState::new(10);
        assert!(!state.apply(hydrate("q-1", question_step("Q1"), false)));
        state.apply(start("q-1"));
        assert!(!state.apply(start("q-2")));
        assert_eq!(state.session_id, Some(id("q-1")));
    }

    #[test]
    fn reset_clears_everything_and_bumps_lifecycle() {
        let mut state = SessionState::new(10);
        state.apply(Action::StartLoading {
            session_id: id("q-1"),
            target_count: Some(7),
        });
        assert_eq!(state.target_count, 7);
        state.apply(hydrate("q-1", question_step("Q1"), false));
        state.apply(hydrate("q-1", question_step("Q2"), true));
        state.apply(error());

        assert!(state.apply(Action::Reset));
        assert_eq!(state.status, SessionStatus::Idle);
        assert_eq!(state.session_id, None);
        assert_eq!(state.current_view, None);
        assert_eq!(state.answered_count, 0);
        assert_eq!(state.error, None);
        assert_eq!(state.target_count, 10);
        assert_eq!(state.lifecycle, 1);

        assert!(!state.apply(Action::Reset));
        assert_eq!(state.lifecycle, 1);

        // The next session falls back to the configured count.
        assert!(state.apply(start("q-2")));
        assert_eq!(state.target_count, 10);
    }

    /// Exhaustively walk short action sequences: the status rank may only go
    /// down through `Reset`.
    #[test]
    fn status_never_regresses_without_reset() {
        let actions = vec![
            start("q-1"),
            start("q-2"),
            hydrate("q-1", synopsis(), false),
            hydrate("q-1", question_step("Q"), true),
            hydrate("q-1", finished(), false),
            hydrate("q-2", question_step("stale"), false),
            hydrate(
                "q-1",
                PollResult::Processing {
                    session_id: id("q-1"),
                },
                false,
            ),
            error(),
            Action::Reset,
        ];

        fn walk(state: &SessionState, actions: &[Action], depth: usize) {
            if depth == 0 {
                return;
            }
            for action in actions {
                let mut next = state.clone();
                next.apply(action.clone());
                if *action != Action::Reset {
                    assert!(
                        next.status.rank() >= state.status.rank(),
                        "{:?} regressed {} -> {}",
                        action,
                        state.status,
                        next.status
                    );
                    assert_eq!(next.lifecycle, state.lifecycle);
                }
                walk(&next, actions, depth - 1);
            }
        }

        walk(&SessionState::new(10), &actions, 5);
    }

    #[tokio::test]
    async fn subscribers_see_changes_only() {
        let store = SessionStore::new(10);
        let mut watcher = store.subscribe();

        assert!(store.dispatch(start("q-1")));
        watcher.changed().await.unwrap();
        assert_eq!(watcher.borrow_and_update().status, SessionStatus::Loading);

        assert!(!store.dispatch(start("q-9")));
        assert!(!watcher.has_changed().unwrap());

        store.dispatch(hydrate("q-1", question_step("Q1"), false));
        watcher.changed().await.unwrap();
        assert_eq!(store.snapshot().status, SessionStatus::Active);
    }
}
