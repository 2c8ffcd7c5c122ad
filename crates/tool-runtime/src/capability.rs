use std::sync::Arc;

use crate::tool::Tool;

/// A named bundle of related tools.
///
/// `tools()` is computed on every call and must reflect the current
/// availability of whatever backs the capability: a capability whose
/// collaborator is gone returns an empty list rather than failing.
pub trait Capability: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn tools(&self) -> Vec<Arc<dyn Tool>>;
}

/// A capability over a fixed tool list. Handy for tests and small plugins.
pub struct StaticCapability {
    name: String,
    description: String,
    tools: Vec<Arc<dyn Tool>>,
}

impl StaticCapability {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            tools: Vec::new(),
        }
    }

    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    pub fn with_shared_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }
}

impl Capability for StaticCapability {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::EchoTool;

    #[test]
    fn test_static_capability() {
        let cap = StaticCapability::new("debug", "Debug helpers").with_tool(EchoTool);
        assert_eq!(cap.name(), "debug");
        assert_eq!(cap.tools().len(), 1);
        assert_eq!(cap.tools()[0].name(), "echo");
    }
}
