//! The `quizflow status` command.

use std::path::PathBuf;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use quizflow_client::{create_backend, load_config_from};
use quizflow_core::model::{PollResult, SessionId, StepView};
use quizflow_core::poll;

use super::describe;
use super::result::print_profile;

pub async fn execute(id: String, known: u32, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let backend = create_backend(&config)?;
    let session_id = SessionId::from(id);
    let options = config.poll.options(known);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    eprint!("Polling {session_id}");
    let outcome = poll(&backend, &session_id, &options, &cancel, |_| eprint!(".")).await;
    eprintln!();

    match outcome.map_err(|e| describe(&e))? {
        PollResult::ActiveStep {
            step: StepView::Synopsis(synopsis),
        } => {
            println!("synopsis: {}", synopsis.title);
            if !synopsis.summary.is_empty() {
                println!("{}", synopsis.summary);
            }
        }
        PollResult::ActiveStep {
            step: StepView::Question(question),
        } => {
            println!("question: {}", question.text);
            for (i, option) in question.options.iter().enumerate() {
                println!("  {}. {}", i + 1, option.text);
            }
        }
        PollResult::Finished { result } => print_profile(&session_id, &result),
        PollResult::Processing { .. } => println!("processing"),
    }

    Ok(())
}
