use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub tracker: TrackerConfig,
    pub runtime: RuntimeConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `TICKETEER_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("TICKETEER_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            tracker: TrackerConfig::from_env_profiled(p),
            runtime: RuntimeConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  tracker:  default_project={}, seed_file={}",
            self.tracker.default_project.as_deref().unwrap_or("(none)"),
            self.tracker
                .seed_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none)".to_string())
        );
        tracing::info!(
            "  runtime:  log_filter={}, chunk_size={}",
            self.runtime.log_filter,
            self.runtime.chunk_size
        );
    }
}

// ── Issue tracker ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Project key used when a create call omits one.
    pub default_project: Option<String>,
    /// JSON file used to seed the in-memory tracker.
    pub seed_file: Option<PathBuf>,
}

impl TrackerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            default_project: profiled_env_opt(p, "TICKETEER_DEFAULT_PROJECT"),
            seed_file: profiled_env_opt(p, "TICKETEER_SEED_FILE").map(PathBuf::from),
        }
    }
}

// ── Runtime ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Characters per chunk when replaying a scripted model reply.
    pub chunk_size: usize,
}

impl RuntimeConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            log_filter: profiled_env_or(p, "TICKETEER_LOG", "warn"),
            chunk_size: profiled_env_usize(p, "TICKETEER_CHUNK_SIZE", 16).max(1),
        }
    }
}
