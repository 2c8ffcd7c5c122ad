use std::fmt::Write as _;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::capability::Capability;
use crate::parser::ACTION_MARKER;
use crate::tool::{Tool, ToolArguments, ToolDefinition, ToolError, ToolResult};

struct ToolBinding {
    capability: String,
    tool: Arc<dyn Tool>,
}

#[derive(Default)]
struct RegistryState {
    /// Registration order; later entries win name collisions.
    capabilities: Vec<Arc<dyn Capability>>,
    index: IndexMap<String, ToolBinding>,
}

impl RegistryState {
    /// Rebuild the name index from the capability list.
    fn reindex(&mut self) {
        let mut index = IndexMap::new();
        for capability in &self.capabilities {
            for tool in capability.tools() {
                index.insert(
                    tool.name().to_string(),
                    ToolBinding {
                        capability: capability.name().to_string(),
                        tool,
                    },
                );
            }
        }
        self.index = index;
    }
}

/// Directory of capabilities and the single funnel for tool execution.
///
/// Mutation (register/unregister) takes the write lock; lookups and schema
/// generation share the read lock. Tool execution happens after the lock is
/// released, so a slow call never blocks registration or other lookups.
///
/// Tool names are unique per snapshot. When two capabilities expose the same
/// tool name the most recently registered one wins.
#[derive(Default)]
pub struct CapabilityRegistry {
    state: RwLock<RegistryState>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, capability: impl Capability + 'static) {
        self.register_shared(Arc::new(capability));
    }

    /// Register (or re-register) a capability.
    ///
    /// A capability with the same name is replaced and moves to the end of
    /// the registration order, so its tools take precedence again. Used when
    /// a backing service is reconfigured.
    pub fn register_shared(&self, capability: Arc<dyn Capability>) {
        let name = capability.name().to_string();
        let tools = capability.tools();
        let mut state = self.write();

        for tool in &tools {
            if let Some(existing) = state.index.get(tool.name()) {
                if existing.capability != name {
                    warn!(
                        tool = tool.name(),
                        previous = %existing.capability,
                        capability = %name,
                        "tool name collision, newest registration wins"
                    );
                }
            }
        }

        let replaced = state.capabilities.len();
        state.capabilities.retain(|c| c.name() != name);
        let replaced = replaced != state.capabilities.len();
        state.capabilities.push(capability);
        state.reindex();

        info!(
            capability = %name,
            tools = tools.len(),
            replaced,
            total_tools = state.index.len(),
            "registered capability"
        );
    }

    /// Remove a capability and evict its tools. Returns false if unknown.
    ///
    /// Tools it shadowed from earlier capabilities become visible again.
    pub fn unregister(&self, name: &str) -> bool {
        let mut state = self.write();
        let before = state.capabilities.len();
        state.capabilities.retain(|c| c.name() != name);
        if state.capabilities.len() == before {
            debug!(capability = name, "unregister: not registered");
            return false;
        }
        state.reindex();
        info!(capability = name, total_tools = state.index.len(), "unregistered capability");
        true
    }

    /// Look up a tool by name.
    pub fn tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.read().index.get(name).map(|b| b.tool.clone())
    }

    /// Every bound tool, in index order.
    pub fn all_tools(&self) -> Vec<Arc<dyn Tool>> {
        self.read().index.values().map(|b| b.tool.clone()).collect()
    }

    /// Tools currently bound to `capability` (shadowed ones excluded).
    pub fn tools_for(&self, capability: &str) -> Vec<Arc<dyn Tool>> {
        self.read()
            .index
            .values()
            .filter(|b| b.capability == capability)
            .map(|b| b.tool.clone())
            .collect()
    }

    /// Name of the capability that owns the binding for `tool`.
    pub fn capability_of(&self, tool: &str) -> Option<String> {
        self.read().index.get(tool).map(|b| b.capability.clone())
    }

    pub fn capability_names(&self) -> Vec<String> {
        self.read()
            .capabilities
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    }

    /// Number of bound tools.
    pub fn len(&self) -> usize {
        self.read().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().index.is_empty()
    }

    /// Validate and run a tool by name.
    ///
    /// Validation errors are returned before the tool runs, so no side effect
    /// has happened when this returns `MissingRequiredParameter` or
    /// `InvalidParameterType`.
    pub async fn execute(&self, name: &str, args: &ToolArguments) -> Result<ToolResult, ToolError> {
        let tool = self
            .tool(name)
            .ok_or_else(|| ToolError::ToolNotFound(name.to_string()))?;
        tool.validate(args)?;
        debug!(tool = name, "executing tool");
        tool.execute(args).await
    }

    /// Definitions of every bound tool. Regenerated on each call.
    pub fn generate_schema(&self) -> Vec<ToolDefinition> {
        self.read().index.values().map(|b| b.tool.definition()).collect()
    }

    /// Plain-text tool catalogue for the model's system prompt.
    ///
    /// Built from the same definitions as [`Self::generate_schema`], so
    /// names and required/optional status always agree.
    pub fn generate_prompt_text(&self) -> String {
        let state = self.read();
        let mut out = String::new();
        let _ = writeln!(out, "You can act on the user's behalf by calling tools.");
        let _ = writeln!(
            out,
            "To call a tool, put each call on its own line, exactly in this form:"
        );
        let _ = writeln!(out, "{ACTION_MARKER} {{\"tool\": \"<name>\", \"args\": {{<key>: <value>, ...}}}}");
        let _ = writeln!(out, "Calls run in the order written. Only the tools below exist.");

        for capability in &state.capabilities {
            let bound: Vec<&ToolBinding> = state
                .index
                .values()
                .filter(|b| b.capability == capability.name())
                .collect();
            if bound.is_empty() {
                continue;
            }
            let _ = writeln!(out);
            let _ = writeln!(out, "## {}", capability.name());
            let _ = writeln!(out, "{}", capability.description());
            for binding in bound {
                let tool = &binding.tool;
                let _ = writeln!(out);
                let _ = writeln!(out, "- {}: {}", tool.name(), tool.description());
                for param in tool.parameters() {
                    let _ = writeln!(
                        out,
                        "  - {} ({}, {}): {}",
                        param.name(),
                        param.param_type(),
                        if param.is_required() { "required" } else { "optional" },
                        param.description()
                    );
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::StaticCapability;
    use crate::parameter::{ParameterType, ToolParameter};
    use crate::tool::EchoTool;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    /// Tool with a fixed name and a label returned as its message.
    struct NamedTool {
        name: &'static str,
        label: &'static str,
        calls: Arc<AtomicUsize>,
    }

    impl NamedTool {
        fn new(name: &'static str, label: &'static str) -> Self {
            Self {
                name,
                label,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl Tool for NamedTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "named"
        }
        fn parameters(&self) -> Vec<ToolParameter> {
            vec![
                ToolParameter::new("title", ParameterType::String, "Title"),
                ToolParameter::optional("count", ParameterType::Integer, "Count"),
            ]
        }
        async fn execute(&self, _args: &ToolArguments) -> Result<ToolResult, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ToolResult::ok(self.label))
        }
    }

    fn cap(name: &str, tools: Vec<NamedTool>) -> StaticCapability {
        tools
            .into_iter()
            .fold(StaticCapability::new(name, format!("{name} tools")), |c, t| c.with_tool(t))
    }

    fn names(tools: &[Arc<dyn Tool>]) -> HashSet<String> {
        tools.iter().map(|t| t.name().to_string()).collect()
    }

    #[test]
    fn test_all_tools_is_union_of_disjoint_capabilities() {
        let registry = CapabilityRegistry::new();
        registry.register(cap("a", vec![NamedTool::new("a1", "a"), NamedTool::new("a2", "a")]));
        registry.register(cap("b", vec![NamedTool::new("b1", "b")]));

        let expected: HashSet<String> =
            ["a1", "a2", "b1"].iter().map(|s| s.to_string()).collect();
        assert_eq!(names(&registry.all_tools()), expected);
        assert_eq!(registry.len(), 3);
        assert_eq!(names(&registry.tools_for("a")).len(), 2);
    }

    #[tokio::test]
    async fn test_last_registration_wins() {
        let registry = CapabilityRegistry::new();
        registry.register(cap("old", vec![NamedTool::new("shared", "old")]));
        registry.register(cap("new", vec![NamedTool::new("shared", "new")]));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.capability_of("shared").as_deref(), Some("new"));
        let mut args = ToolArguments::new();
        args.insert("title".to_string(), "t".into());
        let result = registry.execute("shared", &args).await.unwrap();
        assert_eq!(result.message.as_deref(), Some("new"));
        assert!(registry.tools_for("old").is_empty());
    }

    #[test]
    fn test_unregister_restores_shadowed_tool() {
        let registry = CapabilityRegistry::new();
        registry.register(cap("old", vec![NamedTool::new("shared", "old")]));
        registry.register(cap("new", vec![NamedTool::new("shared", "new"), NamedTool::new("extra", "new")]));

        assert!(registry.unregister("new"));
        assert!(registry.tool("extra").is_none());
        assert_eq!(registry.capability_of("shared").as_deref(), Some("old"));
        assert!(!registry.unregister("new"));
    }

    #[test]
    fn test_reregister_same_name_replaces_tools() {
        let registry = CapabilityRegistry::new();
        registry.register(cap("svc", vec![NamedTool::new("one", "v1"), NamedTool::new("two", "v1")]));
        registry.register(cap("svc", vec![NamedTool::new("one", "v2")]));

        assert_eq!(registry.capability_names(), vec!["svc".to_string()]);
        assert!(registry.tool("two").is_none());
        assert!(registry.tool("one").is_some());
    }

    #[tokio::test]
    async fn test_execute_unknown_tool() {
        let registry = CapabilityRegistry::new();
        let tool = NamedTool::new("real", "x");
        let calls = tool.calls.clone();
        registry.register(cap("a", vec![tool]));

        let err = registry
            .execute("nonexistent_tool", &ToolArguments::new())
            .await
            .unwrap_err();
        assert_eq!(err, ToolError::ToolNotFound("nonexistent_tool".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_validation_runs_before_execution() {
        let registry = CapabilityRegistry::new();
        let tool = NamedTool::new("t", "x");
        let calls = tool.calls.clone();
        registry.register(cap("a", vec![tool]));

        let err = registry.execute("t", &ToolArguments::new()).await.unwrap_err();
        assert_eq!(err, ToolError::MissingRequiredParameter("title".to_string()));

        let mut args = ToolArguments::new();
        args.insert("title".to_string(), "x".into());
        args.insert("count".to_string(), "lots".into());
        assert!(matches!(
            registry.execute("t", &args).await,
            Err(ToolError::InvalidParameterType { .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_schema_required_list() {
        let registry = CapabilityRegistry::new();
        registry.register(cap("a", vec![NamedTool::new("t", "x")]));

        let schema = registry.generate_schema();
        assert_eq!(schema.len(), 1);
        assert_eq!(schema[0].parameters["type"], "object");
        assert_eq!(schema[0].parameters["required"], serde_json::json!(["title"]));
        assert_eq!(schema[0].parameters["properties"]["count"]["type"], "integer");
    }

    #[test]
    fn test_prompt_text_matches_schema() {
        let registry = CapabilityRegistry::new();
        registry.register(cap("a", vec![NamedTool::new("t", "x")]));
        registry.register(StaticCapability::new("debug", "Debug helpers").with_tool(EchoTool));

        let text = registry.generate_prompt_text();
        assert!(text.contains("ACTION: {\"tool\": \"<name>\""));
        assert!(text.contains("## a"));
        assert!(text.contains("## debug"));
        for def in registry.generate_schema() {
            assert!(text.contains(&format!("- {}: ", def.name)));
            for required in def.required_names() {
                assert!(text.contains(&format!("  - {} (", required)));
            }
        }
        assert!(text.contains("  - title (string, required): Title"));
        assert!(text.contains("  - count (integer, optional): Count"));
    }

    #[test]
    fn test_schema_reflects_current_state() {
        let registry = CapabilityRegistry::new();
        registry.register(cap("a", vec![NamedTool::new("t", "x")]));
        assert_eq!(registry.generate_schema().len(), 1);
        registry.unregister("a");
        assert!(registry.generate_schema().is_empty());
        assert!(!registry.generate_prompt_text().contains("## a"));
    }

    struct GateTool {
        gate: Mutex<Option<oneshot::Receiver<()>>>,
    }

    #[async_trait]
    impl Tool for GateTool {
        fn name(&self) -> &str {
            "gate"
        }
        fn description(&self) -> &str {
            "Waits until released"
        }
        fn parameters(&self) -> Vec<ToolParameter> {
            Vec::new()
        }
        async fn execute(&self, _args: &ToolArguments) -> Result<ToolResult, ToolError> {
            let rx = self.gate.lock().unwrap().take();
            if let Some(rx) = rx {
                rx.await.ok();
            }
            Ok(ToolResult::ok("released"))
        }
    }

    #[tokio::test]
    async fn test_execution_does_not_hold_registry_lock() {
        let (tx, rx) = oneshot::channel();
        let registry = Arc::new(CapabilityRegistry::new());
        registry.register(StaticCapability::new("gated", "").with_tool(GateTool {
            gate: Mutex::new(Some(rx)),
        }));

        let runner = registry.clone();
        let handle =
            tokio::spawn(async move { runner.execute("gate", &ToolArguments::new()).await });
        tokio::task::yield_now().await;

        registry.register(StaticCapability::new("debug", "").with_tool(EchoTool));
        assert!(registry.tool("echo").is_some());

        tx.send(()).unwrap();
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.message.as_deref(), Some("released"));
    }
}
