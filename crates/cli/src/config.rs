use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use ticketeer_core::Config;
use ticketeer_tool_runtime::{PermissionLevel, PermissionPolicy};

use crate::cli::CliArgs;

/// CLI configuration loaded from TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Project used when create_issue omits one
    #[serde(default)]
    pub default_project: Option<String>,

    /// JSON seed for the in-memory tracker
    #[serde(default)]
    pub seed_file: Option<PathBuf>,

    /// Tracing filter when RUST_LOG is unset
    #[serde(default)]
    pub log_filter: Option<String>,

    /// Characters per streamed chunk when replaying
    #[serde(default)]
    pub chunk_size: Option<usize>,

    /// Level for tools without an explicit rule ("auto" | "confirm" | "deny")
    #[serde(default = "default_permission")]
    pub default_permission: String,

    /// Tool permission overrides (tool name or prefix* -> "auto" | "confirm" | "deny")
    #[serde(default)]
    pub tool_permissions: HashMap<String, String>,

    /// Maximum context window tokens kept in conversation history
    #[serde(default = "default_max_tokens")]
    pub max_context_tokens: usize,
}

fn default_permission() -> String {
    "auto".to_string()
}

fn default_max_tokens() -> usize {
    100_000
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            default_project: None,
            seed_file: None,
            log_filter: None,
            chunk_size: None,
            default_permission: default_permission(),
            tool_permissions: HashMap::new(),
            max_context_tokens: default_max_tokens(),
        }
    }
}

/// Effective settings after merging flags, config file and environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub default_project: Option<String>,
    pub seed_file: Option<PathBuf>,
    pub log_filter: String,
    pub chunk_size: usize,
    pub policy: PermissionPolicy,
    pub max_context_tokens: usize,
}

impl CliConfig {
    /// Return the default config directory path: ~/.config/ticketeer/
    pub fn default_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("could not determine user config directory")?
            .join("ticketeer");
        Ok(config_dir)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("config.toml"))
    }

    /// Load config from the given path, or the default path.
    /// A missing file yields the defaults, which are written out for editing.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => Self::default_config_path()?,
        };
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            debug!(?config_path, "Loading config");
            let content = std::fs::read_to_string(config_path)
                .with_context(|| format!("failed to read config: {}", config_path.display()))?;
            let config: Self = toml::from_str(&content)
                .with_context(|| format!("failed to parse config: {}", config_path.display()))?;
            Ok(config)
        } else {
            debug!(?config_path, "Config file not found, using defaults");
            let config = Self::default();
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent).ok();
            }
            let toml_str = toml::to_string_pretty(&config)
                .context("failed to serialize default config")?;
            std::fs::write(config_path, toml_str).ok();
            Ok(config)
        }
    }

    /// Build the permission policy from `default_permission` and
    /// `tool_permissions`.
    pub fn permission_policy(&self) -> Result<PermissionPolicy> {
        let default: PermissionLevel = self
            .default_permission
            .parse()
            .map_err(|e| anyhow!("default_permission: {e}"))?;
        PermissionPolicy::from_config(default, &self.tool_permissions)
            .map_err(|e| anyhow!("tool_permissions.{e}"))
    }

    /// Merge in priority order: CLI flag > config file > environment > default.
    pub fn resolve(&self, env: &Config, args: &CliArgs) -> Result<Settings> {
        Ok(Settings {
            default_project: args
                .project
                .clone()
                .or_else(|| self.default_project.clone())
                .or_else(|| env.tracker.default_project.clone()),
            seed_file: args
                .seed
                .as_ref()
                .map(PathBuf::from)
                .or_else(|| self.seed_file.clone())
                .or_else(|| env.tracker.seed_file.clone()),
            log_filter: self
                .log_filter
                .clone()
                .unwrap_or_else(|| env.runtime.log_filter.clone()),
            chunk_size: args
                .chunk_size
                .or(self.chunk_size)
                .unwrap_or(env.runtime.chunk_size)
                .max(1),
            policy: self.permission_policy()?,
            max_context_tokens: self.max_context_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(extra: &[&str]) -> CliArgs {
        let mut argv = vec!["ticketeer"];
        argv.extend_from_slice(extra);
        argv.push("schema");
        CliArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = CliConfig::default();
        assert_eq!(config.default_permission, "auto");
        assert_eq!(config.max_context_tokens, 100_000);
    }

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = CliConfig::load_from(&path).unwrap();
        assert_eq!(config.default_permission, "auto");
        assert!(path.exists());
        let reloaded = CliConfig::load_from(&path).unwrap();
        assert_eq!(reloaded.max_context_tokens, config.max_context_tokens);
    }

    #[test]
    fn test_load_file_with_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_project = "OPS"
chunk_size = 8

[tool_permissions]
delete_issue = "deny"
"get_*" = "auto"
"#,
        )
        .unwrap();
        let config = CliConfig::load_from(&path).unwrap();
        assert_eq!(config.default_project.as_deref(), Some("OPS"));
        let policy = config.permission_policy().unwrap();
        assert_eq!(policy.level_for("delete_issue"), PermissionLevel::Deny);
        assert_eq!(policy.level_for("get_changelog"), PermissionLevel::AutoApprove);
    }

    #[test]
    fn test_bad_permission_level_is_reported() {
        let mut config = CliConfig::default();
        config
            .tool_permissions
            .insert("add_comment".to_string(), "maybe".to_string());
        let err = config.permission_policy().unwrap_err().to_string();
        assert!(err.contains("add_comment"));
    }

    #[test]
    fn test_resolve_precedence() {
        let env = Config::for_profile("ZZCLI_UNSET");
        let config = CliConfig {
            default_project: Some("FILE".to_string()),
            chunk_size: Some(8),
            ..CliConfig::default()
        };

        let settings = config.resolve(&env, &args(&[])).unwrap();
        assert_eq!(settings.default_project.as_deref(), Some("FILE"));
        assert_eq!(settings.chunk_size, 8);

        let settings = config
            .resolve(&env, &args(&["--project", "FLAG", "--chunk-size", "0"]))
            .unwrap();
        assert_eq!(settings.default_project.as_deref(), Some("FLAG"));
        assert_eq!(settings.chunk_size, 1);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = CliConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: CliConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_permission, config.default_permission);
    }
}
