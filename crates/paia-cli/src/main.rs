use std::path::PathBuf;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use paia_core::Config;
use paia_core::JsonSessionStore;
use paia_core::SessionRepository;
use paia_core::Strategy;
use paia_exec::AssistantAdapter;
use paia_exec::AutomationDriver;
use paia_exec::CliInvocation;
use paia_exec::DirectApiAdapter;
use paia_exec::HybridAdapter;
use paia_exec::ProcessRunner;
use paia_exec::SubprocessAdapter;
use tracing::warn;

mod logging;

#[derive(Debug, Parser)]
#[command(
    name = "paia",
    version,
    about = "Relays @paia note instructions to an assistant and keeps session context"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Perform one automation run
    Run {
        #[command(flatten)]
        common: CommonArgs,
        /// Instruction to send instead of the strategy's default
        #[arg(long)]
        instruction: Option<String>,
    },
    /// Print the stored session for a strategy
    Session {
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Debug, Args)]
struct CommonArgs {
    /// direct_api, subprocess or hybrid; defaults to the configured strategy
    #[arg(long)]
    strategy: Option<Strategy>,
    /// Config file (default: <config dir>/paia/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

impl CommonArgs {
    fn resolve(&self) -> Result<(Config, Strategy), Box<dyn std::error::Error>> {
        let config = Config::load(self.config.as_deref())?;
        let strategy = self.strategy.unwrap_or(config.strategy);
        Ok((config, strategy))
    }
}

fn main() {
    if let Err(err) = run(Cli::parse()) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Run {
            common,
            instruction,
        } => {
            let (config, strategy) = common.resolve()?;
            let _guard = logging::init(&config.log_path(strategy)?)?;
            let instruction = instruction.unwrap_or_else(|| config.default_instruction(strategy));
            run_automation(&config, strategy, &instruction)
        }
        Command::Session { common } => {
            let (config, strategy) = common.resolve()?;
            let _guard = logging::init(&config.log_path(strategy)?)?;
            show_session(&config, strategy)
        }
    }
}

fn run_automation(
    config: &Config,
    strategy: Strategy,
    instruction: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(adapter) = build_adapter(config, strategy)? else {
        println!(
            "API-based automation requires {}",
            config.api.api_key_env
        );
        println!("Set it, or run with --strategy subprocess to use the local CLI instead");
        return Ok(());
    };
    let store = JsonSessionStore::new(config.context_path(strategy)?, strategy.exchange_shape());
    let mut driver = AutomationDriver::new(adapter, store);

    match driver.run(instruction) {
        Ok(outcome) => {
            println!("=== AUTOMATION RESULT ===");
            println!("{}", outcome.output);
            Ok(())
        }
        Err(err) if strategy.exits_nonzero_on_failure() => Err(err.into()),
        Err(err) => {
            warn!("{strategy} automation failed: {err}");
            eprintln!("{strategy} automation failed: {err}");
            Ok(())
        }
    }
}

/// `None` when the direct API strategy has no credential to work with.
fn build_adapter(
    config: &Config,
    strategy: Strategy,
) -> Result<Option<Box<dyn AssistantAdapter>>, Box<dyn std::error::Error>> {
    let adapter: Box<dyn AssistantAdapter> = match strategy {
        Strategy::DirectApi => {
            let adapter = DirectApiAdapter::from_env(&config.api)?;
            if !adapter.has_credential() {
                return Ok(None);
            }
            Box::new(adapter)
        }
        Strategy::Subprocess => Box::new(SubprocessAdapter::from_config(
            &config.cli,
            config.workspace_dir()?,
            ProcessRunner,
        )),
        Strategy::Hybrid => {
            let cli = CliInvocation::from_config(&config.cli, config.workspace_dir()?);
            Box::new(HybridAdapter::from_config(
                &config.cli,
                &config.hybrid,
                cli,
                ProcessRunner,
            ))
        }
    };
    Ok(Some(adapter))
}

fn show_session(config: &Config, strategy: Strategy) -> Result<(), Box<dyn std::error::Error>> {
    let path = config.context_path(strategy)?;
    let session = JsonSessionStore::new(&path, strategy.exchange_shape()).load();
    println!("strategy:  {strategy}");
    println!("context:   {}", path.display());
    println!("session:   {}", session.session_id());
    println!("created:   {}", session.created().to_rfc3339());
    println!("exchanges: {}", session.len());
    if let Some(last) = session.exchanges().last() {
        let when = last
            .timestamp
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_else(|| "unknown".to_string());
        println!("last:      {when}");
    }
    Ok(())
}
