use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::error::ConfigError;
use crate::persistence::ExchangeShape;

/// Which adapter carries the instruction to the assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    DirectApi,
    Subprocess,
    Hybrid,
}

impl Strategy {
    pub fn label(self) -> &'static str {
        match self {
            Strategy::DirectApi => "direct_api",
            Strategy::Subprocess => "subprocess",
            Strategy::Hybrid => "hybrid",
        }
    }

    pub fn exchange_shape(self) -> ExchangeShape {
        match self {
            Strategy::DirectApi => ExchangeShape::Messages,
            Strategy::Subprocess | Strategy::Hybrid => ExchangeShape::Pairs,
        }
    }

    pub fn context_file_name(self) -> &'static str {
        match self {
            Strategy::DirectApi => ".claude-paia-api-context.json",
            Strategy::Subprocess => ".claude-paia-context.json",
            Strategy::Hybrid => ".claude-paia-hybrid-context.json",
        }
    }

    pub fn log_file_name(self) -> &'static str {
        match self {
            Strategy::DirectApi => "claude-paia-api.log",
            Strategy::Subprocess => "claude-paia-context.log",
            Strategy::Hybrid => "claude-paia-hybrid.log",
        }
    }

    /// Only the context-managed subprocess run reports failure through the
    /// process exit status; the other two log and return.
    pub fn exits_nonzero_on_failure(self) -> bool {
        matches!(self, Strategy::Subprocess)
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "direct_api" | "api" => Ok(Strategy::DirectApi),
            "subprocess" | "cli" | "context" => Ok(Strategy::Subprocess),
            "hybrid" => Ok(Strategy::Hybrid),
            other => Err(format!(
                "unknown strategy `{other}` (expected direct_api, subprocess or hybrid)"
            )),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub strategy: Strategy,
    /// Working directory for the assistant CLI.
    pub workspace_dir: Option<PathBuf>,
    pub cli: CliConfig,
    pub api: ApiConfig,
    pub hybrid: HybridConfig,
    pub paths: PathsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strategy: Strategy::Subprocess,
            workspace_dir: None,
            cli: CliConfig::default(),
            api: ApiConfig::default(),
            hybrid: HybridConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CliConfig {
    pub program: PathBuf,
    pub print_flag: String,
    pub continue_flag: String,
    pub timeout_secs: u64,
    pub search_timeout_secs: u64,
    /// How many prior exchanges are re-injected into the flattened prompt.
    pub history_window: usize,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("/opt/homebrew/bin/claude"),
            print_flag: "--print".to_string(),
            continue_flag: "--continue".to_string(),
            timeout_secs: 120,
            search_timeout_secs: 30,
            history_window: 3,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub api_version: String,
    pub api_key_env: String,
    /// Unset means the request waits for the server indefinitely.
    pub request_timeout_secs: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com/v1".to_string(),
            model: "claude-3-5-sonnet-20241022".to_string(),
            max_tokens: 4096,
            api_version: "2023-06-01".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            request_timeout_secs: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct HybridConfig {
    pub marker: String,
    pub search_call: String,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            marker: "@paia".to_string(),
            search_call: r#"mcp__obsidian__search_notes("@paia", "content")"#.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the context files. Defaults to the home directory.
    pub data_dir: Option<PathBuf>,
    /// Directory holding the log files.
    pub log_dir: Option<PathBuf>,
}

impl Config {
    /// Reads `path`, or the per-user default location when `path` is `None`.
    /// A missing file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) => path,
                None => return Ok(Self::default()),
            },
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn workspace_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.workspace_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::home_dir()
                .map(|home| home.join("projects").join("claude-workspace"))
                .ok_or(ConfigError::NoHomeDir),
        }
    }

    pub fn context_path(&self, strategy: Strategy) -> Result<PathBuf, ConfigError> {
        let dir = match &self.paths.data_dir {
            Some(dir) => dir.clone(),
            None => dirs::home_dir().ok_or(ConfigError::NoHomeDir)?,
        };
        Ok(dir.join(strategy.context_file_name()))
    }

    pub fn log_path(&self, strategy: Strategy) -> Result<PathBuf, ConfigError> {
        let dir = match &self.paths.log_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_local_dir()
                .or_else(dirs::home_dir)
                .map(|dir| dir.join("paia").join("logs"))
                .ok_or(ConfigError::NoHomeDir)?,
        };
        Ok(dir.join(strategy.log_file_name()))
    }

    /// Instruction sent when none is given on the command line.
    pub fn default_instruction(&self, strategy: Strategy) -> String {
        match strategy {
            Strategy::Subprocess => format!(
                "Search my vault for any {marker} instructions in daily notes, analyze their \
                 context, and execute the requested actions by updating notes accordingly. \
                 Focus on today's and upcoming daily notes.",
                marker = self.hybrid.marker
            ),
            Strategy::DirectApi => format!(
                "Search my vault for {} instructions and execute them",
                self.hybrid.marker
            ),
            Strategy::Hybrid => self.hybrid.search_call.clone(),
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("paia").join("config.toml"))
}
