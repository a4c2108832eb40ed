pub mod feedback;
pub mod init;
pub mod play;
pub mod result;
pub mod status;

use quizflow_core::ApiError;

/// Turn a backend error into a message for the terminal.
pub(crate) fn describe(err: &ApiError) -> anyhow::Error {
    anyhow::anyhow!("{} [{}]", err.user_message(), err.code())
}
