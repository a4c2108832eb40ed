//! Core data model types for quizflow.
//!
//! These are the types that flow between the backend client, the status
//! poller, and the session store: session identifiers, the content shown at
//! each step, and the final result profile.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Opaque identifier of one backend quiz job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Content displayed for one step of the quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepView {
    /// Introductory synopsis shown before the first question.
    Synopsis(Synopsis),
    /// A question awaiting an answer.
    Question(Question),
}

impl StepView {
    pub fn as_question(&self) -> Option<&Question> {
        match self {
            StepView::Question(q) => Some(q),
            StepView::Synopsis(_) => None,
        }
    }
}

/// Quiz synopsis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synopsis {
    pub title: String,
    #[serde(default, alias = "description")]
    pub summary: String,
}

/// A single quiz question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// The question prompt.
    #[serde(alias = "question_text")]
    pub text: String,
    /// Possible answers, in display order.
    #[serde(default)]
    pub options: Vec<AnswerOption>,
}

impl Question {
    /// Answer id to submit for the option at `index`.
    ///
    /// Falls back to the zero-based index when the backend did not assign
    /// option ids.
    pub fn answer_id(&self, index: usize) -> Option<String> {
        self.options.get(index).map(|option| {
            option
                .id
                .clone()
                .unwrap_or_else(|| index.to_string())
        })
    }
}

/// One selectable answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawAnswerOption")]
pub struct AnswerOption {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Options arrive either as bare strings or as objects.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawAnswerOption {
    Text(String),
    Full {
        #[serde(default)]
        id: Option<String>,
        #[serde(alias = "label")]
        text: String,
        #[serde(default)]
        image_url: Option<String>,
    },
}

impl From<RawAnswerOption> for AnswerOption {
    fn from(raw: RawAnswerOption) -> Self {
        match raw {
            RawAnswerOption::Text(text) => AnswerOption {
                id: None,
                text,
                image_url: None,
            },
            RawAnswerOption::Full {
                id,
                text,
                image_url,
            } => AnswerOption {
                id,
                text,
                image_url,
            },
        }
    }
}

/// Terminal result of a quiz (the "profile" the user ends up with).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultProfile {
    #[serde(alias = "profile_title")]
    pub title: String,
    #[serde(default, alias = "summary")]
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub traits: Vec<String>,
}

/// Outcome of one status check.
#[derive(Debug, Clone, PartialEq)]
pub enum PollResult {
    /// The job is still working; nothing new to show.
    Processing { session_id: SessionId },
    /// A new step is ready.
    ActiveStep { step: StepView },
    /// The quiz is complete.
    Finished { result: ResultProfile },
}

impl PollResult {
    /// Whether the poll loop should hand this result to its caller.
    pub fn is_actionable(&self) -> bool {
        match self {
            PollResult::Processing { .. } => false,
            PollResult::ActiveStep { .. } | PollResult::Finished { .. } => true,
        }
    }
}

/// A freshly created quiz job.
#[derive(Debug, Clone, PartialEq)]
pub struct StartedQuiz {
    pub session_id: SessionId,
    /// First content to show, when the backend returned it inline.
    pub initial_step: Option<StepView>,
    /// Number of questions the backend plans to ask, if announced.
    pub target_count: Option<u32>,
}

/// Thumbs up / thumbs down rating of a finished quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackRating {
    Up,
    Down,
}

impl fmt::Display for FeedbackRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedbackRating::Up => write!(f, "up"),
            FeedbackRating::Down => write!(f, "down"),
        }
    }
}

impl FromStr for FeedbackRating {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "up" | "+" | "good" => Ok(FeedbackRating::Up),
            "down" | "-" | "bad" => Ok(FeedbackRating::Down),
            other => Err(format!("unknown rating: {other} (expected up or down)")),
        }
    }
}

/// Feedback submitted about a finished quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub rating: FeedbackRating,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_view_tagged_by_type() {
        let synopsis: StepView = serde_json::from_value(serde_json::json!({
            "type": "synopsis",
            "title": "Chess openings"
        }))
        .unwrap();
        assert_eq!(
            synopsis,
            StepView::Synopsis(Synopsis {
                title: "Chess openings".into(),
                summary: String::new(),
            })
        );

        let question: StepView = serde_json::from_value(serde_json::json!({
            "type": "question",
            "question_text": "Favourite piece?",
            "options": ["Knight", {"id": "b", "label": "Bishop"}]
        }))
        .unwrap();
        let q = question.as_question().unwrap();
        assert_eq!(q.text, "Favourite piece?");
        assert_eq!(q.options.len(), 2);
        assert_eq!(q.options[0].text, "Knight");
        assert_eq!(q.options[1].id.as_deref(), Some("b"));
    }

    #[test]
    fn answer_id_falls_back_to_index() {
        let q = Question {
            text: "?".into(),
            options: vec![
                AnswerOption {
                    id: None,
                    text: "a".into(),
                    image_url: None,
                },
                AnswerOption {
                    id: Some("opt-b".into()),
                    text: "b".into(),
                    image_url: None,
                },
            ],
        };
        assert_eq!(q.answer_id(0).as_deref(), Some("0"));
        assert_eq!(q.answer_id(1).as_deref(), Some("opt-b"));
        assert_eq!(q.answer_id(2), None);
    }

    #[test]
    fn rating_parsing() {
        assert_eq!("UP".parse::<FeedbackRating>(), Ok(FeedbackRating::Up));
        assert_eq!("down".parse::<FeedbackRating>(), Ok(FeedbackRating::Down));
        assert!("meh".parse::<FeedbackRating>().is_err());
    }

    #[test]
    fn session_id_is_transparent() {
        let id = SessionId::from("q-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"q-1\"");
        assert_eq!(id.to_string(), "q-1");
    }
}
