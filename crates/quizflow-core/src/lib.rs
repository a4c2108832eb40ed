//! quizflow-core — quiz session model, status poller, and session store.
//!
//! This crate defines the data model, the `QuizBackend` trait, the bounded
//! status-polling algorithm, and the session state machine the UI reads from.
//! HTTP lives in `quizflow-client`.

pub mod controller;
pub mod error;
pub mod mock;
pub mod model;
pub mod poller;
pub mod store;
pub mod traits;

pub use controller::QuizController;
pub use error::ApiError;
pub use model::{PollResult, SessionId, StepView};
pub use poller::{poll, PollConfig, PollOptions};
pub use store::{Action, SessionState, SessionStatus, SessionStore};
pub use traits::QuizBackend;
