use std::path::PathBuf;
use std::time::Duration;

use paia_core::Exchange;

/// A single child-process invocation, passed as an argument vector.
/// Nothing here goes through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    pub cwd: PathBuf,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl ExecRequest {
    /// Program and arguments joined for log lines. Not meant to be re-parsed.
    pub fn display_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Captured output of a finished child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("{variable} environment variable required")]
    MissingCredential { variable: String },

    #[error("invalid API response: {message}")]
    InvalidResponse { message: String },

    #[error("{program} failed: {message}")]
    SubprocessFailure { program: String, message: String },

    #[error("request to assistant API failed: {message}")]
    Transport { message: String },
}

/// Carries one outbound instruction to the external assistant.
pub trait AssistantAdapter {
    fn name(&self) -> &'static str;

    /// Sends `outbound` with whatever of `prior` the strategy re-injects and
    /// returns the assistant's text.
    fn invoke(&self, outbound: &str, prior: &[Exchange]) -> Result<String, AdapterError>;
}

impl<A: AssistantAdapter + ?Sized> AssistantAdapter for Box<A> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn invoke(&self, outbound: &str, prior: &[Exchange]) -> Result<String, AdapterError> {
        (**self).invoke(outbound, prior)
    }
}
