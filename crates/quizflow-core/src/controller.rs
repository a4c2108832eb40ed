//! Quiz controller.
//!
//! Owns the session store and sequences the backend calls behind every UI
//! action: starting a quiz, polling for the next step, answering, resetting.
//! One [`CancellationToken`] exists per logical operation; starting or
//! resetting cancels the previous one. Status polls for the session are
//! serialized through the poll gate, so a new poll never starts while an
//! earlier one is still in flight.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::error::ApiError;
use crate::model::{Feedback, FeedbackRating, PollResult, SessionId};
use crate::poller::{self, PollConfig};
use crate::store::{Action, SessionStatus, SessionStore};
use crate::traits::QuizBackend;

/// Observer invoked with every successful status response.
pub type TickObserver = Arc<dyn Fn(&PollResult) + Send + Sync>;

/// Drives one quiz session on behalf of the UI.
pub struct QuizController<B: ?Sized> {
    backend: Arc<B>,
    store: Arc<SessionStore>,
    poll: PollConfig,
    poll_gate: tokio::sync::Mutex<()>,
    operation: Mutex<CancellationToken>,
    last_start: Mutex<Option<(String, Option<String>)>>,
    on_tick: Option<TickObserver>,
}

impl<B: QuizBackend + ?Sized> QuizController<B> {
    pub fn new(backend: Arc<B>, store: Arc<SessionStore>, poll: PollConfig) -> Self {
        Self {
            backend,
            store,
            poll,
            poll_gate: tokio::sync::Mutex::new(()),
            operation: Mutex::new(CancellationToken::new()),
            last_start: Mutex::new(None),
            on_tick: None,
        }
    }

    /// Observe raw status responses (progress indicators).
    pub fn with_tick_observer(mut self, observer: TickObserver) -> Self {
        self.on_tick = Some(observer);
        self
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Start a new quiz, abandoning whatever session was in progress.
    #[instrument(skip(self, token))]
    pub async fn start(&self, category: &str, token: Option<&str>) -> Result<(), ApiError> {
        let cancel = self.begin_operation();
        *lock(&self.last_start) = Some((category.to_string(), token.map(str::to_string)));

        let started = match self.backend.start_quiz(category, token, &cancel).await {
            Ok(started) => started,
            Err(err) => return Err(self.fail(err, &cancel)),
        };

        tracing::info!(session = %started.session_id, "quiz started");
        self.claim_session(
            Action::StartLoading {
                session_id: started.session_id.clone(),
                target_count: started.target_count,
            },
            &cancel,
        )?;

        match started.initial_step {
            Some(step) => {
                self.store.dispatch(Action::Hydrate {
                    session_id: started.session_id,
                    result: PollResult::ActiveStep { step },
                    answered: false,
                });
                Ok(())
            }
            None => self.poll_next(&started.session_id, false, &cancel).await,
        }
    }

    /// Fetch the next step of the current session without answering.
    pub async fn advance(&self) -> Result<(), ApiError> {
        let cancel = self.current_operation();
        let session_id = self.live_session()?;
        self.poll_next(&session_id, false, &cancel).await
    }

    /// Submit an answer for the current question and fetch the next step.
    ///
    /// A failed submission is returned to the caller and leaves the store as
    /// it was, so the answer can simply be submitted again.
    #[instrument(skip(self))]
    pub async fn answer(&self, answer_id: &str) -> Result<(), ApiError> {
        let cancel = self.current_operation();
        let session_id = self.live_session()?;

        if let Err(err) = self
            .backend
            .submit_answer(&session_id, answer_id, &cancel)
            .await
        {
            tracing::warn!(session = %session_id, error = %err, "answer submission failed");
            return Err(err);
        }

        self.poll_next(&session_id, true, &cancel).await
    }

    /// Start over with the category and token of the last `start`.
    pub async fn retry(&self) -> Result<(), ApiError> {
        let last = lock(&self.last_start).clone();
        match last {
            Some((category, token)) => self.start(&category, token.as_deref()).await,
            None => Err(ApiError::NoActiveSession),
        }
    }

    /// Cancel any outstanding work and return the store to `idle`.
    pub fn reset(&self) {
        self.begin_operation();
    }

    /// Rate the current (normally finished) quiz.
    pub async fn send_feedback(
        &self,
        rating: FeedbackRating,
        comment: Option<String>,
    ) -> Result<(), ApiError> {
        let cancel = self.current_operation();
        let session_id = self
            .store
            .snapshot()
            .session_id
            .ok_or(ApiError::NoActiveSession)?;
        let feedback = Feedback { rating, comment };
        self.backend
            .submit_feedback(&session_id, &feedback, &cancel)
            .await
    }

    /// Show a finished result fetched by id, e.g. from a shared link.
    #[instrument(skip(self), fields(session = %session_id))]
    pub async fn load_result(&self, session_id: SessionId) -> Result<(), ApiError> {
        let cancel = self.begin_operation();
        *lock(&self.last_start) = None;
        self.claim_session(
            Action::StartLoading {
                session_id: session_id.clone(),
                target_count: None,
            },
            &cancel,
        )?;

        match self.backend.fetch_result(&session_id, &cancel).await {
            Ok(result) => {
                self.store.dispatch(Action::Hydrate {
                    session_id,
                    result: PollResult::Finished { result },
                    answered: false,
                });
                Ok(())
            }
            Err(err) => Err(self.fail(err, &cancel)),
        }
    }

    async fn poll_next(
        &self,
        session_id: &SessionId,
        answered: bool,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        let _gate = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ApiError::Canceled),
            guard = self.poll_gate.lock() => guard,
        };

        let options = self.poll.options(self.store.snapshot().known_questions());
        let on_tick = self.on_tick.clone();
        let outcome = poller::poll(self.backend.as_ref(), session_id, &options, cancel, |tick| {
            if let Some(observer) = &on_tick {
                observer(tick);
            }
        })
        .await;

        match outcome {
            Ok(result) => {
                self.store.dispatch(Action::Hydrate {
                    session_id: session_id.clone(),
                    result,
                    answered,
                });
                Ok(())
            }
            Err(err) => Err(self.fail(err, cancel)),
        }
    }

    /// Record a terminal failure in the store unless the operation was
    /// canceled or superseded.
    fn fail(&self, err: ApiError, cancel: &CancellationToken) -> ApiError {
        if err.is_canceled() || cancel.is_cancelled() {
            tracing::debug!(error = %err, "operation canceled");
            return err;
        }
        tracing::error!(code = err.code(), error = %err, "quiz session failed");
        self.store.dispatch(Action::SetError {
            message: err.user_message(),
            code: Some(err.code().to_string()),
        });
        err
    }

    fn live_session(&self) -> Result<SessionId, ApiError> {
        let state = self.store.snapshot();
        match (state.status, state.session_id) {
            (SessionStatus::Loading | SessionStatus::Active, Some(id)) => Ok(id),
            _ => Err(ApiError::NoActiveSession),
        }
    }

    /// Cancel the outstanding operation and reset the store.
    fn begin_operation(&self) -> CancellationToken {
        let mut current = lock(&self.operation);
        current.cancel();
        *current = CancellationToken::new();
        self.store.dispatch(Action::Reset);
        current.clone()
    }

    /// Move the store into `loading` for `cancel`'s operation.
    ///
    /// Runs under the operation lock, so a newer operation cannot reset the
    /// store between the cancellation check and the dispatch.
    fn claim_session(&self, action: Action, cancel: &CancellationToken) -> Result<(), ApiError> {
        let _current = lock(&self.operation);
        if cancel.is_cancelled() || !self.store.dispatch(action) {
            return Err(ApiError::Canceled);
        }
        Ok(())
    }

    fn current_operation(&self) -> CancellationToken {
        lock(&self.operation).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
