//! Scripted in-memory backend for testing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;
use crate::model::{
    AnswerOption, Feedback, PollResult, Question, ResultProfile, SessionId, StartedQuiz, StepView,
};
use crate::traits::QuizBackend;

/// A quiz backend that replays scripted responses.
///
/// Status calls pop from a queue; once the queue is empty every call reports
/// `Processing`. Each call waits for the configured latency (observing
/// cancellation) and records what it was asked.
pub struct ScriptedBackend {
    start_responses: Mutex<VecDeque<Result<StartedQuiz, ApiError>>>,
    statuses: Mutex<VecDeque<Result<PollResult, ApiError>>>,
    answer_responses: Mutex<VecDeque<Result<(), ApiError>>>,
    results: Mutex<VecDeque<Result<ResultProfile, ApiError>>>,
    latency: Duration,
    status_calls: AtomicU32,
    in_flight: AtomicU32,
    max_in_flight: AtomicU32,
    known_counts: Mutex<Vec<u32>>,
    answers: Mutex<Vec<(SessionId, String)>>,
    feedback: Mutex<Vec<(SessionId, Feedback)>>,
    categories: Mutex<Vec<(String, Option<String>)>>,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            start_responses: Mutex::new(VecDeque::new()),
            statuses: Mutex::new(VecDeque::new()),
            answer_responses: Mutex::new(VecDeque::new()),
            results: Mutex::new(VecDeque::new()),
            latency: Duration::ZERO,
            status_calls: AtomicU32::new(0),
            in_flight: AtomicU32::new(0),
            max_in_flight: AtomicU32::new(0),
            known_counts: Mutex::new(Vec::new()),
            answers: Mutex::new(Vec::new()),
            feedback: Mutex::new(Vec::new()),
            categories: Mutex::new(Vec::new()),
        }
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn push_start(&self, response: Result<StartedQuiz, ApiError>) {
        lock(&self.start_responses).push_back(response);
    }

    pub fn push_status(&self, response: Result<PollResult, ApiError>) {
        lock(&self.statuses).push_back(response);
    }

    pub fn push_processing(&self, session_id: &str) {
        self.push_status(Ok(PollResult::Processing {
            session_id: SessionId::from(session_id),
        }));
    }

    pub fn push_answer(&self, response: Result<(), ApiError>) {
        lock(&self.answer_responses).push_back(response);
    }

    pub fn push_result(&self, response: Result<ResultProfile, ApiError>) {
        lock(&self.results).push_back(response);
    }

    /// Number of status calls issued so far.
    pub fn status_calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }

    /// Number of calls currently waiting on their latency.
    pub fn in_flight(&self) -> u32 {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous status calls observed.
    pub fn max_in_flight(&self) -> u32 {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// `known_questions` values sent with each status call.
    pub fn known_counts(&self) -> Vec<u32> {
        lock(&self.known_counts).clone()
    }

    pub fn answers(&self) -> Vec<(SessionId, String)> {
        lock(&self.answers).clone()
    }

    pub fn feedback(&self) -> Vec<(SessionId, Feedback)> {
        lock(&self.feedback).clone()
    }

    /// `(category, token)` pairs passed to `start_quiz`.
    pub fn started(&self) -> Vec<(String, Option<String>)> {
        lock(&self.categories).clone()
    }

    async fn wait(&self, cancel: &CancellationToken) -> Result<(), ApiError> {
        if cancel.is_cancelled() {
            return Err(ApiError::Canceled);
        }
        if self.latency.is_zero() {
            return Ok(());
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ApiError::Canceled),
            _ = tokio::time::sleep(self.latency) => Ok(()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Decrements the in-flight counter even when the call future is dropped.
struct InFlight<'a>(&'a AtomicU32);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicU32, max: &AtomicU32) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(now, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl QuizBackend for ScriptedBackend {
    async fn start_quiz(
        &self,
        category: &str,
        token: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<StartedQuiz, ApiError> {
        lock(&self.categories).push((category.to_string(), token.map(str::to_string)));
        self.wait(cancel).await?;
        let next = lock(&self.start_responses).pop_front();
        next.unwrap_or_else(|| {
            Err(ApiError::InvalidStartResponse(
                "no scripted start response".into(),
            ))
        })
    }

    async fn quiz_status(
        &self,
        session_id: &SessionId,
        known_questions: u32,
        _timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<PollResult, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.known_counts).push(known_questions);
        let _guard = InFlight::enter(&self.in_flight, &self.max_in_flight);
        self.wait(cancel).await?;
        let next = lock(&self.statuses).pop_front();
        next.unwrap_or_else(|| {
            Ok(PollResult::Processing {
                session_id: session_id.clone(),
            })
        })
    }

    async fn submit_answer(
        &self,
        session_id: &SessionId,
        answer_id: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        self.wait(cancel).await?;
        let response = lock(&self.answer_responses).pop_front().unwrap_or(Ok(()));
        if response.is_ok() {
            lock(&self.answers).push((session_id.clone(), answer_id.to_string()));
        }
        response
    }

    async fn submit_feedback(
        &self,
        session_id: &SessionId,
        feedback: &Feedback,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        self.wait(cancel).await?;
        lock(&self.feedback).push((session_id.clone(), feedback.clone()));
        Ok(())
    }

    async fn fetch_result(
        &self,
        session_id: &SessionId,
        cancel: &CancellationToken,
    ) -> Result<ResultProfile, ApiError> {
        self.wait(cancel).await?;
        let next = lock(&self.results).pop_front();
        next.unwrap_or_else(|| {
            Err(ApiError::Http {
                status: 404,
                code: Some("result_not_found".into()),
                message: format!("no result for {session_id}"),
                details: None,
            })
        })
    }
}

/// An `ActiveStep` carrying a two-option question with the given text.
pub fn question_step(text: &str) -> PollResult {
    PollResult::ActiveStep {
        step: StepView::Question(Question {
            text: text.to_string(),
            options: vec![
                AnswerOption {
                    id: Some("a".into()),
                    text: "Yes".into(),
                    image_url: None,
                },
                AnswerOption {
                    id: Some("b".into()),
                    text: "No".into(),
                    image_url: None,
                },
            ],
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_then_reports_processing() {
        let backend = ScriptedBackend::new();
        backend.push_status(Ok(question_step("first")));
        let id = SessionId::from("q-1");
        let cancel = CancellationToken::new();

        let first = backend
            .quiz_status(&id, 0, Duration::from_secs(5), &cancel)
            .await
            .unwrap();
        assert!(first.is_actionable());

        let second = backend
            .quiz_status(&id, 1, Duration::from_secs(5), &cancel)
            .await
            .unwrap();
        assert_eq!(second, PollResult::Processing { session_id: id });
        assert_eq!(backend.status_calls(), 2);
        assert_eq!(backend.known_counts(), vec![0, 1]);
    }

    #[tokio::test]
    async fn canceled_token_short_circuits() {
        let backend = ScriptedBackend::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = backend
            .submit_answer(&SessionId::from("q-1"), "a", &cancel)
            .await
            .unwrap_err();
        assert!(err.is_canceled());
        assert!(backend.answers().is_empty());
    }
}
