//! The `quizflow result` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use comfy_table::{Cell, ContentArrangement, Table};

use quizflow_client::{create_backend, load_config_from};
use quizflow_core::model::{ResultProfile, SessionId};
use quizflow_core::store::CurrentView;
use quizflow_core::{QuizController, SessionStore};

use super::describe;

pub async fn execute(id: String, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let backend = Arc::new(create_backend(&config)?);
    let store = Arc::new(SessionStore::new(config.target_questions));
    let controller = QuizController::new(backend, Arc::clone(&store), config.poll.clone());

    let session_id = SessionId::from(id);
    controller
        .load_result(session_id.clone())
        .await
        .map_err(|e| describe(&e))?;

    match store.snapshot().current_view {
        Some(CurrentView::Result(profile)) => {
            print_profile(&session_id, &profile);
            Ok(())
        }
        other => anyhow::bail!("no result to show (got {other:?})"),
    }
}

/// Print a result profile as a table.
pub fn print_profile(session_id: &SessionId, profile: &ResultProfile) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["You are", profile.title.as_str()]);

    if !profile.description.is_empty() {
        table.add_row(vec![Cell::new("About"), Cell::new(&profile.description)]);
    }
    if !profile.traits.is_empty() {
        table.add_row(vec![
            Cell::new("Traits"),
            Cell::new(profile.traits.join(", ")),
        ]);
    }
    if let Some(url) = &profile.image_url {
        table.add_row(vec![Cell::new("Image"), Cell::new(url)]);
    }
    table.add_row(vec![Cell::new("Share id"), Cell::new(session_id)]);

    println!("{table}");
}
