use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::source::{ConfigLoader, ConfigSource, RawConfig};
use crate::error::{ResolverError, Result};
use crate::resource::namespace::PACKAGE_NAMESPACE;

/// Resolver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResolverConfig {
    /// Maximum number of candidate attempts per resolve call
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u64,

    /// Prefer the lowest version among otherwise equal candidates
    #[serde(default)]
    pub prefer_lowest: bool,

    /// Run the uses-constraint consistency check
    #[serde(default = "default_true")]
    pub check_uses: bool,

    /// Namespaces whose capabilities take part in uses constraints
    #[serde(default = "default_uses_namespaces")]
    pub uses_namespaces: Vec<String>,

    /// Record UNRESOLVED_PROVIDER entries when every candidate of a requirement failed
    #[serde(default = "default_true")]
    pub report_unresolved_providers: bool,

    // Internal tracking
    #[serde(skip)]
    base_dir: Option<PathBuf>,

    #[serde(skip)]
    sources: HashMap<String, ConfigSource>,
}

// Default value functions
fn default_max_iterations() -> u64 {
    100_000
}

fn default_true() -> bool {
    true
}

fn default_uses_namespaces() -> Vec<String> {
    vec![PACKAGE_NAMESPACE.to_string()]
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            prefer_lowest: false,
            check_uses: true,
            uses_namespaces: default_uses_namespaces(),
            report_unresolved_providers: true,
            base_dir: None,
            sources: HashMap::new(),
        }
    }
}

impl ResolverConfig {
    /// All configuration keys
    pub fn config_keys(&self) -> Vec<String> {
        [
            "max-iterations",
            "prefer-lowest",
            "check-uses",
            "uses-namespaces",
            "report-unresolved-providers",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    /// Build configuration from all sources (defaults, project, env)
    pub fn build<P: AsRef<Path>>(project_dir: Option<P>, use_environment: bool) -> Result<Self> {
        let loader = ConfigLoader::new(use_environment);
        let mut config = Self::default();

        for key in config.config_keys() {
            config.sources.insert(key, ConfigSource::Default);
        }

        // 1. Load project config from modwire.json
        if let Some(project_dir) = &project_dir {
            config.base_dir = Some(project_dir.as_ref().to_path_buf());
            let project_config = loader.load_project_config(project_dir)?;
            config.merge_raw_config(project_config, ConfigSource::Project)?;
        }

        // 2. Apply environment variable overrides
        if use_environment {
            config.apply_env_overrides(&loader);
        }

        log::debug!(
            "Resolver config: max-iterations={} prefer-lowest={} check-uses={}",
            config.max_iterations,
            config.prefer_lowest,
            config.check_uses
        );

        Ok(config)
    }

    /// Get base directory the config was loaded from
    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    /// Get the source of a configuration value
    pub fn source_of(&self, key: &str) -> Option<&ConfigSource> {
        self.sources.get(key)
    }

    /// Set a value programmatically. Overrides every other source.
    pub fn set(&mut self, key: &str, value: serde_json::Value) -> Result<()> {
        if self.merge_config_value(key, value, ConfigSource::Command)? {
            Ok(())
        } else {
            Err(ResolverError::Config(format!("Unknown configuration key: {}", key)))
        }
    }

    /// Merge raw configuration from a source
    fn merge_raw_config(&mut self, raw: RawConfig, source: ConfigSource) -> Result<()> {
        if let Some(config_map) = raw.resolver {
            let mut keys: Vec<_> = config_map.into_iter().collect();
            keys.sort_by(|a, b| a.0.cmp(&b.0));
            for (key, value) in keys {
                if !self.merge_config_value(&key, value, source.clone())? {
                    log::warn!("Ignoring unknown resolver config key \"{}\" from {}", key, source.as_str());
                }
            }
        }
        Ok(())
    }

    /// Merge a single configuration value. Returns false for unknown keys.
    fn merge_config_value(&mut self, key: &str, value: serde_json::Value, source: ConfigSource) -> Result<bool> {
        let invalid = |expected: &str| {
            ResolverError::Config(format!("Invalid value for {}: expected {}", key, expected))
        };

        match key {
            "max-iterations" => {
                let n = value.as_u64().filter(|n| *n > 0).ok_or_else(|| invalid("a positive integer"))?;
                self.max_iterations = n;
            }
            "prefer-lowest" => {
                self.prefer_lowest = value.as_bool().ok_or_else(|| invalid("a boolean"))?;
            }
            "check-uses" => {
                self.check_uses = value.as_bool().ok_or_else(|| invalid("a boolean"))?;
            }
            "uses-namespaces" => {
                let items = value.as_array().ok_or_else(|| invalid("an array of strings"))?;
                let mut namespaces = Vec::with_capacity(items.len());
                for item in items {
                    namespaces.push(item.as_str().ok_or_else(|| invalid("an array of strings"))?.to_string());
                }
                self.uses_namespaces = namespaces;
            }
            "report-unresolved-providers" => {
                self.report_unresolved_providers = value.as_bool().ok_or_else(|| invalid("a boolean"))?;
            }
            _ => return Ok(false),
        }

        self.sources.insert(key.to_string(), source);
        Ok(true)
    }

    fn apply_env_overrides(&mut self, loader: &ConfigLoader) {
        if let Some(n) = loader.get_env_u64("max-iterations").filter(|n| *n > 0) {
            self.max_iterations = n;
            self.sources.insert(
                "max-iterations".to_string(),
                ConfigSource::Environment(ConfigLoader::env_var_name("max-iterations")),
            );
        }

        if let Some(prefer) = loader.get_env_bool("prefer-lowest") {
            self.prefer_lowest = prefer;
            self.sources.insert(
                "prefer-lowest".to_string(),
                ConfigSource::Environment(ConfigLoader::env_var_name("prefer-lowest")),
            );
        }

        if let Some(check) = loader.get_env_bool("check-uses") {
            self.check_uses = check;
            self.sources.insert(
                "check-uses".to_string(),
                ConfigSource::Environment(ConfigLoader::env_var_name("check-uses")),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = ResolverConfig::default();
        assert_eq!(config.max_iterations, 100_000);
        assert!(!config.prefer_lowest);
        assert!(config.check_uses);
        assert_eq!(config.uses_namespaces, vec![PACKAGE_NAMESPACE.to_string()]);
        assert!(config.report_unresolved_providers);
    }

    #[test]
    fn test_build_without_project() {
        let config = ResolverConfig::build(None::<&Path>, false).unwrap();
        assert_eq!(config.source_of("max-iterations"), Some(&ConfigSource::Default));
        assert!(config.base_dir().is_none());
    }

    #[test]
    fn test_set_overrides() {
        let mut config = ResolverConfig::default();
        config.set("max-iterations", json!(10)).unwrap();
        config.set("uses-namespaces", json!(["a", "b"])).unwrap();
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.uses_namespaces, vec!["a", "b"]);
        assert_eq!(config.source_of("max-iterations"), Some(&ConfigSource::Command));
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut config = ResolverConfig::default();
        assert!(config.set("max-iterations", json!(0)).is_err());
        assert!(config.set("check-uses", json!("yes")).is_err());
        assert!(config.set("no-such-key", json!(true)).is_err());
        assert_eq!(config.max_iterations, 100_000);
    }

    #[test]
    fn test_serialize_kebab_case() {
        let value = serde_json::to_value(ResolverConfig::default()).unwrap();
        assert_eq!(value["max-iterations"], 100_000);
        assert_eq!(value["uses-namespaces"][0], PACKAGE_NAMESPACE);
        assert!(value.get("sources").is_none());
    }
}
