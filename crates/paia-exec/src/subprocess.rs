use std::path::PathBuf;
use std::time::Duration;

use paia_core::CliConfig;
use paia_core::Exchange;
use tracing::info;
use tracing::warn;

use crate::contracts::AdapterError;
use crate::contracts::AssistantAdapter;
use crate::contracts::ExecRequest;
use crate::prompt::build_contextual_prompt;
use crate::prompt::preview;
use crate::runner::CommandRunner;

/// Settings shared by the strategies that shell out to the assistant CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliInvocation {
    pub program: PathBuf,
    pub cwd: PathBuf,
    pub print_flag: String,
    pub continue_flag: String,
}

impl CliInvocation {
    pub fn from_config(config: &CliConfig, cwd: PathBuf) -> Self {
        Self {
            program: config.program.clone(),
            cwd,
            print_flag: config.print_flag.clone(),
            continue_flag: config.continue_flag.clone(),
        }
    }

    /// `<program> [--continue] --print <prompt>`; the prompt is one argv entry.
    pub fn request(
        &self,
        prompt: String,
        continue_session: bool,
        timeout: Duration,
    ) -> ExecRequest {
        let mut args = Vec::with_capacity(3);
        if continue_session {
            args.push(self.continue_flag.clone());
        }
        args.push(self.print_flag.clone());
        args.push(prompt);
        ExecRequest {
            cwd: self.cwd.clone(),
            program: self.program.clone(),
            args,
            timeout,
        }
    }
}

/// Runs one CLI call and returns its trimmed stdout. Anything the CLI
/// wrote to stderr on success is logged as a warning.
pub(crate) fn run_cli<R: CommandRunner>(
    runner: &R,
    request: &ExecRequest,
) -> Result<String, AdapterError> {
    info!("Executing: {}", preview(&request.display_line(), 100));
    let output = runner.run(request)?;
    if !output.stderr.is_empty() {
        warn!("{} stderr: {}", request.program.display(), preview(&output.stderr, 200));
    }
    Ok(output.stdout.trim().to_string())
}

/// Context-managed strategy: replays recent exchanges as text in a single
/// non-interactive CLI call.
pub struct SubprocessAdapter<R> {
    cli: CliInvocation,
    runner: R,
    timeout: Duration,
    history_window: usize,
}

impl<R: CommandRunner> SubprocessAdapter<R> {
    pub fn new(cli: CliInvocation, runner: R, timeout: Duration, history_window: usize) -> Self {
        Self {
            cli,
            runner,
            timeout,
            history_window,
        }
    }

    pub fn from_config(config: &CliConfig, cwd: PathBuf, runner: R) -> Self {
        Self::new(
            CliInvocation::from_config(config, cwd),
            runner,
            Duration::from_secs(config.timeout_secs),
            config.history_window,
        )
    }
}

impl<R: CommandRunner> AssistantAdapter for SubprocessAdapter<R> {
    fn name(&self) -> &'static str {
        "subprocess"
    }

    fn invoke(&self, outbound: &str, prior: &[Exchange]) -> Result<String, AdapterError> {
        let prompt = build_contextual_prompt(prior, outbound, self.history_window);
        let request = self.cli.request(prompt, false, self.timeout);
        run_cli(&self.runner, &request)
    }
}
