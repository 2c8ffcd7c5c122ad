use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::tool::ToolArguments;

/// Permission level for a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    /// Runs without asking
    AutoApprove,
    /// Needs an explicit yes before running
    RequireConfirmation,
    /// Never runs
    Deny,
}

impl FromStr for PermissionLevel {
    type Err = String;

    /// Accepts the config spellings: `auto`, `confirm`, `deny`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "auto_approve" | "allow" => Ok(Self::AutoApprove),
            "confirm" | "require_confirmation" | "ask" => Ok(Self::RequireConfirmation),
            "deny" | "block" => Ok(Self::Deny),
            other => Err(format!("unknown permission level '{other}'")),
        }
    }
}

/// Maps tool names to permission levels.
///
/// Lookup order: exact name, then the longest matching `prefix*` pattern,
/// then `default`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionPolicy {
    pub rules: HashMap<String, PermissionLevel>,
    pub default: PermissionLevel,
}

impl PermissionPolicy {
    pub fn new() -> Self {
        Self {
            rules: HashMap::new(),
            default: PermissionLevel::RequireConfirmation,
        }
    }

    /// Everything runs unless a rule says otherwise.
    pub fn allow_all() -> Self {
        Self {
            rules: HashMap::new(),
            default: PermissionLevel::AutoApprove,
        }
    }

    pub fn with_rule(mut self, pattern: impl Into<String>, level: PermissionLevel) -> Self {
        self.rules.insert(pattern.into(), level);
        self
    }

    /// Build from config strings (`tool = "deny"`). Unknown levels are
    /// reported with the offending tool name.
    pub fn from_config(
        default: PermissionLevel,
        rules: &HashMap<String, String>,
    ) -> Result<Self, String> {
        let mut policy = Self {
            rules: HashMap::new(),
            default,
        };
        for (tool, level) in rules {
            let level = level.parse().map_err(|e| format!("{tool}: {e}"))?;
            policy.rules.insert(tool.clone(), level);
        }
        Ok(policy)
    }

    pub fn level_for(&self, tool_name: &str) -> PermissionLevel {
        if let Some(&level) = self.rules.get(tool_name) {
            return level;
        }
        self.rules
            .iter()
            .filter_map(|(pattern, &level)| {
                let prefix = pattern.strip_suffix('*')?;
                tool_name.starts_with(prefix).then_some((prefix.len(), level))
            })
            .max_by_key(|(len, _)| *len)
            .map(|(_, level)| level)
            .unwrap_or(self.default)
    }
}

impl Default for PermissionPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionDecision {
    Approved,
    Denied(String),
    NeedsConfirmation,
}

/// Gate consulted before every tool call.
#[async_trait]
pub trait PermissionChecker: Send + Sync {
    async fn check_permission(&self, tool_name: &str, args: &ToolArguments) -> PermissionDecision;
}

/// Policy-based checker with no interactive prompting.
pub struct PolicyChecker {
    policy: PermissionPolicy,
}

impl PolicyChecker {
    pub fn new(policy: PermissionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PermissionPolicy {
        &self.policy
    }
}

#[async_trait]
impl PermissionChecker for PolicyChecker {
    async fn check_permission(&self, tool_name: &str, _args: &ToolArguments) -> PermissionDecision {
        match self.policy.level_for(tool_name) {
            PermissionLevel::AutoApprove => PermissionDecision::Approved,
            PermissionLevel::RequireConfirmation => PermissionDecision::NeedsConfirmation,
            PermissionLevel::Deny => {
                PermissionDecision::Denied(format!("Tool '{}' is denied by policy", tool_name))
            }
        }
    }
}
