//! Runtime configuration loaded from environment variables.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Default agent instructions used when none are configured.
pub const DEFAULT_AGENT_INSTRUCTIONS: &str =
    "You are a diligent AI assistant. You complete your tasks efficiently and without error.";

/// Process configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Name of the agent created when none is supplied
    #[serde(default = "default_agent_name")]
    pub default_agent_name: String,

    /// Instructions of the default agent
    #[serde(default = "default_agent_instructions")]
    pub default_agent_instructions: String,

    /// Maximum agent turns per controller run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Maximum model round-trips inside one agent turn
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_agent_name() -> String {
    "Marvin".to_string()
}

fn default_agent_instructions() -> String {
    DEFAULT_AGENT_INSTRUCTIONS.to_string()
}

fn default_max_iterations() -> usize {
    10
}

fn default_max_tool_rounds() -> usize {
    20
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            default_agent_name: default_agent_name(),
            default_agent_instructions: default_agent_instructions(),
            max_iterations: default_max_iterations(),
            max_tool_rounds: default_max_tool_rounds(),
        }
    }
}

impl Config {
    /// Load from environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let parse_usize = |key: &str, fallback: usize| {
            lookup(key)
                .and_then(|s| s.trim().parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(fallback)
        };

        Self {
            log_level: lookup("AGENTFLOW_LOG_LEVEL").unwrap_or(defaults.log_level),
            default_agent_name: lookup("AGENTFLOW_AGENT_NAME")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.default_agent_name),
            default_agent_instructions: lookup("AGENTFLOW_AGENT_INSTRUCTIONS")
                .unwrap_or(defaults.default_agent_instructions),
            max_iterations: parse_usize("AGENTFLOW_MAX_ITERATIONS", defaults.max_iterations),
            max_tool_rounds: parse_usize("AGENTFLOW_MAX_TOOL_ROUNDS", defaults.max_tool_rounds),
        }
    }
}

/// Process-wide configuration, read from the environment on first use.
pub fn settings() -> &'static Config {
    static SETTINGS: OnceLock<Config> = OnceLock::new();
    SETTINGS.get_or_init(Config::from_env)
}
