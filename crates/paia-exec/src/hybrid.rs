use std::time::Duration;

use paia_core::CliConfig;
use paia_core::Exchange;
use paia_core::HybridConfig;
use tracing::info;
use tracing::warn;

use crate::contracts::AdapterError;
use crate::contracts::AssistantAdapter;
use crate::prompt::build_analysis_prompt;
use crate::prompt::build_search_prompt;
use crate::prompt::nothing_found_message;
use crate::prompt::ERROR_MARKER;
use crate::runner::CommandRunner;
use crate::subprocess::run_cli;
use crate::subprocess::CliInvocation;

/// Two-phase strategy: ask the CLI to run a search function, then ask it to
/// act on what the search returned.
///
/// Both calls use the CLI's own continuation flag, so prior exchanges held
/// by this program are never replayed.
pub struct HybridAdapter<R> {
    cli: CliInvocation,
    runner: R,
    marker: String,
    search_timeout: Duration,
    analysis_timeout: Duration,
}

impl<R: CommandRunner> HybridAdapter<R> {
    pub fn new(
        cli: CliInvocation,
        runner: R,
        marker: impl Into<String>,
        search_timeout: Duration,
        analysis_timeout: Duration,
    ) -> Self {
        Self {
            cli,
            runner,
            marker: marker.into(),
            search_timeout,
            analysis_timeout,
        }
    }

    pub fn from_config(
        cli_config: &CliConfig,
        hybrid: &HybridConfig,
        cli: CliInvocation,
        runner: R,
    ) -> Self {
        Self::new(
            cli,
            runner,
            hybrid.marker.clone(),
            Duration::from_secs(cli_config.search_timeout_secs),
            Duration::from_secs(cli_config.timeout_secs),
        )
    }

    /// Phase one. A failed call is folded into an error string, which the
    /// caller treats the same as an error marker in the output.
    fn search(&self, function_call: &str) -> String {
        info!("Executing MCP function: {function_call}");
        let request = self
            .cli
            .request(build_search_prompt(function_call), true, self.search_timeout);
        match run_cli(&self.runner, &request) {
            Ok(found) => found,
            Err(err) => {
                warn!("MCP function error: {err}");
                format!("{ERROR_MARKER} executing {function_call}: {err}")
            }
        }
    }
}

impl<R: CommandRunner> AssistantAdapter for HybridAdapter<R> {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    /// `outbound` is the search function call to run in phase one.
    fn invoke(&self, outbound: &str, _prior: &[Exchange]) -> Result<String, AdapterError> {
        let found = self.search(outbound);
        if found.is_empty() || found.contains(ERROR_MARKER) {
            let message = nothing_found_message(&self.marker);
            info!("{message}");
            return Ok(message);
        }

        info!("Found {} instructions, processing...", self.marker);
        let request = self.cli.request(
            build_analysis_prompt(&self.marker, &found),
            true,
            self.analysis_timeout,
        );
        run_cli(&self.runner, &request)
    }
}
