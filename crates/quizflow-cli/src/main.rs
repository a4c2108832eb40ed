//! quizflow CLI — take personality quizzes from the terminal.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use quizflow_core::model::FeedbackRating;

mod commands;

#[derive(Parser)]
#[command(name = "quizflow", version, about = "Terminal client for AI-generated quizzes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take a quiz interactively
    Play {
        /// Quiz topic, e.g. "Chess"
        #[arg(long)]
        category: String,

        /// Anti-abuse challenge token forwarded to the backend
        #[arg(long)]
        token: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show the result of a finished quiz
    Result {
        /// Quiz session id
        id: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Rate a finished quiz
    Feedback {
        /// Quiz session id
        id: String,

        /// up or down
        #[arg(long)]
        rating: FeedbackRating,

        /// Optional free-text comment
        #[arg(long)]
        comment: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Poll a quiz session once and print what it is showing
    Status {
        /// Quiz session id
        id: String,

        /// Questions already seen by the client
        #[arg(long, default_value = "0")]
        known: u32,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create a starter quizflow.toml
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("quizflow=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Play {
            category,
            token,
            config,
        } => commands::play::execute(category, token, config).await,
        Commands::Result { id, config } => commands::result::execute(id, config).await,
        Commands::Feedback {
            id,
            rating,
            comment,
            config,
        } => commands::feedback::execute(id, rating, comment, config).await,
        Commands::Status { id, known, config } => {
            commands::status::execute(id, known, config).await
        }
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
