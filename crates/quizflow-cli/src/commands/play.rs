//! The `quizflow play` command.

use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use quizflow_client::{create_backend, load_config_from, HttpQuizApi};
use quizflow_core::controller::TickObserver;
use quizflow_core::model::{PollResult, Question, StepView, Synopsis};
use quizflow_core::store::{CurrentView, SessionError, SessionState, SessionWatcher};
use quizflow_core::{ApiError, QuizController, SessionStatus, SessionStore};

use super::result::print_profile;

type Controller = QuizController<HttpQuizApi>;
type Input = Lines<BufReader<Stdin>>;

/// What the player asked for at a prompt.
enum Next {
    Advance,
    Answer(String),
    Retry,
    Quit,
}

pub async fn execute(
    category: String,
    token: Option<String>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let backend = Arc::new(create_backend(&config)?);
    let store = Arc::new(SessionStore::new(config.target_questions));

    let ticks: TickObserver = Arc::new(|tick: &PollResult| {
        if !tick.is_actionable() {
            eprint!(".");
        }
    });
    let controller = QuizController::new(backend, Arc::clone(&store), config.poll.clone())
        .with_tick_observer(ticks);

    let progress = tokio::spawn(report_progress(store.subscribe()));
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    let outcome = play(&controller, &category, token.as_deref(), &mut input).await;
    progress.abort();
    outcome
}

async fn play(
    controller: &Controller,
    category: &str,
    token: Option<&str>,
    input: &mut Input,
) -> Result<()> {
    let mut outcome = interruptible(controller, controller.start(category, token)).await;

    loop {
        match outcome {
            None => {
                eprintln!("\nInterrupted.");
                return Ok(());
            }
            // The session survived the failure (e.g. a rejected answer).
            Some(Err(err)) if controller.store().snapshot().status != SessionStatus::Error => {
                eprintln!("{}", err.user_message());
            }
            Some(_) => {}
        }

        let state = controller.store().snapshot();
        let next = match state.status {
            SessionStatus::Finished => {
                if let (Some(id), Some(CurrentView::Result(profile))) =
                    (&state.session_id, &state.current_view)
                {
                    println!();
                    print_profile(id, profile);
                    println!("Rate this quiz: quizflow feedback {id} --rating up|down");
                }
                return Ok(());
            }
            SessionStatus::Error => {
                let error = state.error.clone().unwrap_or_else(|| SessionError {
                    message: "Something went wrong.".into(),
                    code: None,
                });
                println!("\n{}", error.message);
                match prompt(input, "Type r to retry or q to quit").await? {
                    Some(line) if line.eq_ignore_ascii_case("r") => Next::Retry,
                    _ => {
                        let code = error.code.as_deref().unwrap_or("error");
                        anyhow::bail!("{} [{code}]", error.message);
                    }
                }
            }
            SessionStatus::Active => match &state.current_view {
                Some(CurrentView::Step(StepView::Synopsis(synopsis))) => {
                    show_synopsis(synopsis);
                    match prompt(input, "Press Enter to begin, q to quit").await? {
                        Some(line) if line.eq_ignore_ascii_case("q") => Next::Quit,
                        Some(_) => Next::Advance,
                        None => Next::Quit,
                    }
                }
                Some(CurrentView::Step(StepView::Question(question))) => {
                    show_question(&state, question);
                    choose(input, question).await?
                }
                _ => Next::Advance,
            },
            SessionStatus::Loading => Next::Advance,
            SessionStatus::Idle => return Ok(()),
        };

        outcome = match next {
            Next::Advance => interruptible(controller, controller.advance()).await,
            Next::Answer(id) => interruptible(controller, controller.answer(&id)).await,
            Next::Retry => interruptible(controller, controller.retry()).await,
            Next::Quit => {
                controller.reset();
                return Ok(());
            }
        };
    }
}

/// Run `operation`, resetting the session if Ctrl-C arrives first.
async fn interruptible(
    controller: &Controller,
    operation: impl Future<Output = Result<(), ApiError>>,
) -> Option<Result<(), ApiError>> {
    tokio::select! {
        outcome = operation => Some(outcome),
        _ = tokio::signal::ctrl_c() => {
            controller.reset();
            None
        }
    }
}

/// Read one trimmed line. `None` on end of input or Ctrl-C.
async fn prompt(input: &mut Input, message: &str) -> Result<Option<String>> {
    print!("{message}: ");
    std::io::stdout().flush()?;
    tokio::select! {
        line = input.next_line() => Ok(line?.map(|l| l.trim().to_string())),
        _ = tokio::signal::ctrl_c() => {
            println!();
            Ok(None)
        }
    }
}

async fn choose(input: &mut Input, question: &Question) -> Result<Next> {
    let count = question.options.len();
    if count == 0 {
        return Ok(Next::Advance);
    }
    loop {
        let Some(line) = prompt(input, &format!("Your answer [1-{count}], q to quit")).await?
        else {
            return Ok(Next::Quit);
        };
        if line.eq_ignore_ascii_case("q") {
            return Ok(Next::Quit);
        }
        let picked = line
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|index| question.answer_id(index));
        match picked {
            Some(id) => return Ok(Next::Answer(id)),
            None => println!("Please enter a number between 1 and {count}."),
        }
    }
}

fn show_synopsis(synopsis: &Synopsis) {
    println!("\n{}", synopsis.title);
    if !synopsis.summary.is_empty() {
        println!("{}", synopsis.summary);
    }
}

fn show_question(state: &SessionState, question: &Question) {
    println!(
        "\nQuestion {} of {}",
        state.answered_count + 1,
        state.target_count
    );
    println!("{}", question.text);
    for (i, option) in question.options.iter().enumerate() {
        println!("  {}. {}", i + 1, option.text);
    }
}

/// Narrate status transitions on stderr while operations run.
async fn report_progress(mut watcher: SessionWatcher) {
    let mut last = watcher.borrow().status;
    while watcher.changed().await.is_ok() {
        let status = watcher.borrow_and_update().status;
        if status == last {
            continue;
        }
        tracing::debug!(%status, "session status changed");
        if status == SessionStatus::Loading {
            eprint!("Generating your quiz");
        } else if last == SessionStatus::Loading {
            eprintln!();
        }
        last = status;
    }
}
