//! quizflow-client — HTTP access to the quiz service.
//!
//! Implements the `QuizBackend` trait over the quiz REST API and loads the
//! client configuration that decides where and how to reach it.

pub mod api;
pub mod config;
mod error;
pub mod transport;

pub use api::HttpQuizApi;
pub use config::{create_backend, load_config, load_config_from, ClientConfig};
pub use transport::{HttpTransport, Request};
