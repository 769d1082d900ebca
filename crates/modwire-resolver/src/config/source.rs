use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

use crate::error::{ResolverError, Result};

/// Name of the project configuration file
pub const CONFIG_FILE: &str = "modwire.json";

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "MODWIRE_";

/// Represents the source of a configuration value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Default built-in value
    Default,
    /// From the project `modwire.json`
    Project,
    /// From environment variable
    Environment(String),
    /// Programmatically set
    Command,
}

impl ConfigSource {
    pub fn as_str(&self) -> &str {
        match self {
            ConfigSource::Default => "default",
            ConfigSource::Project => "project",
            ConfigSource::Environment(var) => var,
            ConfigSource::Command => "command",
        }
    }
}

/// Raw configuration data as found in `modwire.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolver: Option<HashMap<String, serde_json::Value>>,
}

/// Loads configuration from files and the environment
#[derive(Debug)]
pub struct ConfigLoader {
    use_environment: bool,
}

impl ConfigLoader {
    pub fn new(use_environment: bool) -> Self {
        Self { use_environment }
    }

    /// Get an environment variable, ignoring empty values
    pub fn get_env(&self, var: &str) -> Option<String> {
        if !self.use_environment {
            return None;
        }

        env::var(var).ok().filter(|s| !s.is_empty())
    }

    /// Environment variable name for a config key.
    /// Converts "max-iterations" to "MODWIRE_MAX_ITERATIONS"
    pub fn env_var_name(key: &str) -> String {
        format!("{}{}", ENV_PREFIX, key.replace('-', "_").to_uppercase())
    }

    /// Get a configuration value from its environment variable
    pub fn get_env_config(&self, key: &str) -> Option<String> {
        self.get_env(&Self::env_var_name(key))
    }

    /// Get boolean value from environment variable
    pub fn get_env_bool(&self, key: &str) -> Option<bool> {
        self.get_env_config(key).map(|val| {
            !matches!(val.to_lowercase().as_str(), "false" | "0" | "no" | "off")
        })
    }

    /// Get unsigned integer value from environment variable
    pub fn get_env_u64(&self, key: &str) -> Option<u64> {
        self.get_env_config(key).and_then(|val| match val.trim().parse() {
            Ok(n) => Some(n),
            Err(_) => {
                log::warn!("Ignoring {}={}: not a number", Self::env_var_name(key), val);
                None
            }
        })
    }

    /// Load configuration from a JSON file. A missing file yields an empty config.
    pub fn load_config_file<P: AsRef<Path>>(&self, path: P) -> Result<RawConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(RawConfig::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| ResolverError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        let config: RawConfig = serde_json::from_str(&contents)
            .map_err(|e| ResolverError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

        Ok(config)
    }

    /// Load project configuration from `modwire.json` in `project_dir`
    pub fn load_project_config<P: AsRef<Path>>(&self, project_dir: P) -> Result<RawConfig> {
        self.load_config_file(project_dir.as_ref().join(CONFIG_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_source_as_str() {
        assert_eq!(ConfigSource::Default.as_str(), "default");
        assert_eq!(ConfigSource::Project.as_str(), "project");
        assert_eq!(ConfigSource::Command.as_str(), "command");
        assert_eq!(
            ConfigSource::Environment("MODWIRE_CHECK_USES".to_string()).as_str(),
            "MODWIRE_CHECK_USES"
        );
    }

    #[test]
    fn test_env_var_name() {
        assert_eq!(ConfigLoader::env_var_name("max-iterations"), "MODWIRE_MAX_ITERATIONS");
        assert_eq!(ConfigLoader::env_var_name("prefer-lowest"), "MODWIRE_PREFER_LOWEST");
    }

    #[test]
    fn test_environment_disabled() {
        let loader = ConfigLoader::new(false);
        assert!(loader.get_env("PATH").is_none());
    }

    #[test]
    fn test_missing_file_is_empty() {
        let loader = ConfigLoader::new(false);
        let raw = loader.load_config_file("/nonexistent/modwire.json").unwrap();
        assert!(raw.resolver.is_none());
    }
}
