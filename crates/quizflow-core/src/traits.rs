//! Core trait definition for quiz backends.
//!
//! The `quizflow-client` crate implements this trait over HTTP; the
//! [`crate::mock::ScriptedBackend`] implements it in memory for tests.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;
use crate::model::{Feedback, PollResult, ResultProfile, SessionId, StartedQuiz};

/// The operations the quiz progression client needs from the backend.
///
/// Every call takes the cancellation token of the logical operation it belongs
/// to. Implementations must return [`ApiError::Canceled`] promptly once the
/// token fires and must not issue further requests afterwards.
#[async_trait]
pub trait QuizBackend: Send + Sync {
    /// Create a new quiz job for `category`.
    ///
    /// `token` is the anti-abuse challenge token collected by the UI, if any.
    async fn start_quiz(
        &self,
        category: &str,
        token: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<StartedQuiz, ApiError>;

    /// Query the job status once.
    ///
    /// `known_questions` is the number of questions the client has already
    /// seen; `timeout` bounds this single call.
    async fn quiz_status(
        &self,
        session_id: &SessionId,
        known_questions: u32,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<PollResult, ApiError>;

    /// Submit the answer chosen for the current question.
    async fn submit_answer(
        &self,
        session_id: &SessionId,
        answer_id: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError>;

    /// Submit feedback about a finished quiz.
    async fn submit_feedback(
        &self,
        session_id: &SessionId,
        feedback: &Feedback,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError>;

    /// Fetch a finished result by id (shared links, cold loads).
    async fn fetch_result(
        &self,
        session_id: &SessionId,
        cancel: &CancellationToken,
    ) -> Result<ResultProfile, ApiError>;
}
