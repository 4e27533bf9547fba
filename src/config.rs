//! Command-line configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via MISSIONFSM_CONFIG or --config)
//! 3. Environment variables

use missionfsm_core::UnknownLinePolicy;
use missionfsm_mission::{ReachParams, Side};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "MISSIONFSM_CONFIG";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Engine configuration.
    pub engine: EngineConfig,
    /// Rulebook loading configuration.
    pub rulebook: RulebookConfig,
    /// Diagram export configuration.
    pub diagram: DiagramConfig,
    /// Reach mission parameters.
    pub reach: ReachParams,
}

impl Config {
    /// Loads configuration from `path` (or MISSIONFSM_CONFIG), then applies
    /// environment variable overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Renders the configuration as YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(PathBuf::from("<config>"), e.to_string()))
    }

    fn apply_env_overrides(&mut self) {
        self.engine.apply_env_overrides();
        self.rulebook.apply_env_overrides();
        self.diagram.apply_env_overrides();

        if let Ok(angle) = std::env::var("MISSIONFSM_SEARCH_ANGLE") {
            if let Ok(parsed) = angle.parse() {
                self.reach.search_angle = parsed;
            }
        }
        if let Ok(side) = std::env::var("MISSIONFSM_ROTATE") {
            match side.to_lowercase().as_str() {
                "left" => self.reach.rotate = Side::Left,
                "right" => self.reach.rotate = Side::Right,
                _ => {}
            }
        }
        if let Ok(velocity) = std::env::var("MISSIONFSM_MARCH_VELOCITY") {
            if let Ok(parsed) = velocity.parse() {
                self.reach.march.velocity = parsed;
            }
        }
        if let Ok(confirmation) = std::env::var("MISSIONFSM_CONFIRMATION") {
            if let Ok(parsed) = confirmation.parse() {
                self.reach.confirmation = parsed;
            }
        }
        if let Ok(tolerance) = std::env::var("MISSIONFSM_TOLERANCE") {
            if let Ok(parsed) = tolerance.parse() {
                self.reach.centering.tolerance = parsed;
            }
        }
    }

    /// Checks mission parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.reach
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

/// Engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Log every step at info level.
    pub verbose: bool,
}

impl EngineConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(verbose) = std::env::var("MISSIONFSM_VERBOSE") {
            self.verbose = verbose == "1" || verbose.to_lowercase() == "true";
        }
    }
}

/// Rulebook loading configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulebookConfig {
    /// What to do with unrecognized lines.
    pub unknown_lines: UnknownLinePolicy,
}

impl RulebookConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(policy) = std::env::var("MISSIONFSM_UNKNOWN_LINES") {
            match policy.to_lowercase().as_str() {
                "skip" => self.unknown_lines = UnknownLinePolicy::Skip,
                "reject" => self.unknown_lines = UnknownLinePolicy::Reject,
                _ => {}
            }
        }
    }
}

/// Diagram export configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagramConfig {
    /// Directory diagrams are written to.
    pub output_dir: PathBuf,
}

impl Default for DiagramConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
        }
    }
}

impl DiagramConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("MISSIONFSM_DIAGRAM_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
