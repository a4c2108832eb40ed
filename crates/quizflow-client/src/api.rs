//! Quiz REST API backend.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use quizflow_core::error::ApiError;
use quizflow_core::model::{
    Feedback, PollResult, Question, ResultProfile, SessionId, StartedQuiz, StepView, Synopsis,
};
use quizflow_core::traits::QuizBackend;

use crate::transport::{HttpTransport, Request};

/// Default timeout for `POST /quiz/start`; creating a quiz can be slow.
pub const DEFAULT_START_TIMEOUT: Duration = Duration::from_secs(60);

/// Body field carrying the anti-abuse challenge token.
const TURNSTILE_FIELD: &str = "cf-turnstile-response";

/// The quiz service reached over HTTP.
pub struct HttpQuizApi {
    transport: HttpTransport,
    start_timeout: Duration,
}

impl HttpQuizApi {
    pub fn new(transport: HttpTransport) -> Self {
        Self {
            transport,
            start_timeout: DEFAULT_START_TIMEOUT,
        }
    }

    pub fn with_start_timeout(mut self, timeout: Duration) -> Self {
        self.start_timeout = timeout;
        self
    }

    pub fn transport(&self) -> &HttpTransport {
        &self.transport
    }
}

#[derive(Deserialize)]
struct StartResponse {
    #[serde(default, alias = "quizId")]
    quiz_id: Option<String>,
    #[serde(default)]
    question: Option<Question>,
    #[serde(default)]
    synopsis: Option<Synopsis>,
    #[serde(default)]
    current_state: Option<Value>,
    #[serde(default)]
    max_questions: Option<u32>,
}

impl StartResponse {
    fn into_started(self) -> Result<StartedQuiz, ApiError> {
        let session_id = self
            .quiz_id
            .filter(|id| !id.trim().is_empty())
            .map(SessionId::from)
            .ok_or_else(|| {
                ApiError::InvalidStartResponse("response did not include a quiz id".into())
            })?;

        let initial_step = match (self.question, self.synopsis, self.current_state) {
            (Some(question), _, _) => Some(StepView::Question(question)),
            (None, Some(synopsis), _) => Some(StepView::Synopsis(synopsis)),
            (None, None, Some(state)) => match serde_json::from_value::<StepView>(state) {
                Ok(step) => Some(step),
                Err(e) => {
                    tracing::debug!(error = %e, "ignoring unrecognized current_state");
                    None
                }
            },
            (None, None, None) => None,
        };

        Ok(StartedQuiz {
            session_id,
            initial_step,
            target_count: self.max_questions,
        })
    }
}

#[derive(Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum StatusResponse {
    Processing {
        #[serde(default, alias = "quizId")]
        quiz_id: Option<String>,
    },
    Active {
        #[serde(default, rename = "type")]
        kind: Option<String>,
        data: Value,
    },
    Finished {
        data: ResultProfile,
    },
}

impl StatusResponse {
    fn into_poll_result(self, session_id: &SessionId) -> Result<PollResult, ApiError> {
        match self {
            StatusResponse::Processing { quiz_id } => Ok(PollResult::Processing {
                session_id: quiz_id
                    .map(SessionId::from)
                    .unwrap_or_else(|| session_id.clone()),
            }),
            StatusResponse::Active { kind, data } => {
                let step = match kind.as_deref() {
                    Some("synopsis") => serde_json::from_value(data).map(StepView::Synopsis),
                    _ => serde_json::from_value(data).map(StepView::Question),
                }
                .map_err(|e| ApiError::InvalidResponse(format!("malformed step: {e}")))?;
                Ok(PollResult::ActiveStep { step })
            }
            StatusResponse::Finished { data } => Ok(PollResult::Finished { result: data }),
        }
    }
}

#[async_trait]
impl QuizBackend for HttpQuizApi {
    #[instrument(skip(self, token, cancel))]
    async fn start_quiz(
        &self,
        category: &str,
        token: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<StartedQuiz, ApiError> {
        let mut body = json!({ "category": category });
        if let Some(token) = token {
            body[TURNSTILE_FIELD] = Value::String(token.to_string());
        }

        let response: StartResponse = self
            .transport
            .request(
                Request::post("/quiz/start")
                    .json(body)
                    .timeout(self.start_timeout),
                cancel,
            )
            .await?;
        response.into_started()
    }

    #[instrument(skip(self, timeout, cancel), fields(session = %session_id))]
    async fn quiz_status(
        &self,
        session_id: &SessionId,
        known_questions: u32,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<PollResult, ApiError> {
        let response: StatusResponse = self
            .transport
            .request(
                Request::get(format!("/quiz/status/{session_id}"))
                    .query("known_questions_count", known_questions)
                    .timeout(timeout),
                cancel,
            )
            .await?;
        response.into_poll_result(session_id)
    }

    #[instrument(skip(self, cancel), fields(session = %session_id))]
    async fn submit_answer(
        &self,
        session_id: &SessionId,
        answer_id: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        let _ack: Value = self
            .transport
            .request(
                Request::post(format!("/quiz/{session_id}/answer"))
                    .json(json!({ "answer_id": answer_id })),
                cancel,
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self, feedback, cancel), fields(session = %session_id, rating = %feedback.rating))]
    async fn submit_feedback(
        &self,
        session_id: &SessionId,
        feedback: &Feedback,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        let body = serde_json::to_value(feedback)
            .map_err(|e| ApiError::InvalidResponse(format!("unserializable feedback: {e}")))?;
        let _ack: Value = self
            .transport
            .request(
                Request::post(format!("/quiz/{session_id}/feedback")).json(body),
                cancel,
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self, cancel), fields(session = %session_id))]
    async fn fetch_result(
        &self,
        session_id: &SessionId,
        cancel: &CancellationToken,
    ) -> Result<ResultProfile, ApiError> {
        self.transport
            .request(Request::get(format!("/result/{session_id}")), cancel)
            .await
    }
}
