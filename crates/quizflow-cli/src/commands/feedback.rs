//! The `quizflow feedback` command.

use std::path::PathBuf;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use quizflow_client::{create_backend, load_config_from};
use quizflow_core::model::{Feedback, FeedbackRating, SessionId};
use quizflow_core::QuizBackend;

use super::describe;

pub async fn execute(
    id: String,
    rating: FeedbackRating,
    comment: Option<String>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let backend = create_backend(&config)?;
    let session_id = SessionId::from(id);

    let feedback = Feedback {
        rating,
        comment: comment.filter(|c| !c.trim().is_empty()),
    };
    backend
        .submit_feedback(&session_id, &feedback, &CancellationToken::new())
        .await
        .map_err(|e| describe(&e))?;

    println!("Thanks! Recorded a thumbs {rating} for {session_id}.");
    Ok(())
}
