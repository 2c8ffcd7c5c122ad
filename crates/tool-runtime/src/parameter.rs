use serde_json::{json, Value};

/// Declared type of a tool parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterType {
    String,
    Integer,
    Double,
    Boolean,
    Array(Box<ParameterType>),
    Object,
}

impl ParameterType {
    pub fn array_of(element: ParameterType) -> Self {
        ParameterType::Array(Box::new(element))
    }

    /// JSON Schema primitive name.
    pub fn schema_type(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Integer => "integer",
            ParameterType::Double => "number",
            ParameterType::Boolean => "boolean",
            ParameterType::Array(_) => "array",
            ParameterType::Object => "object",
        }
    }

    /// Structural schema without a description (used for array elements).
    fn element_schema(&self) -> Value {
        match self {
            ParameterType::Array(items) => json!({
                "type": "array",
                "items": items.element_schema(),
            }),
            other => json!({ "type": other.schema_type() }),
        }
    }
}

impl std::fmt::Display for ParameterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterType::Array(items) => write!(f, "array<{}>", items),
            other => f.write_str(other.schema_type()),
        }
    }
}

/// A named, typed, described input of a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolParameter {
    name: String,
    param_type: ParameterType,
    description: String,
    required: bool,
}

impl ToolParameter {
    /// A required parameter.
    pub fn new(name: impl Into<String>, param_type: ParameterType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, param_type: ParameterType, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::new(name, param_type, description)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn param_type(&self) -> &ParameterType {
        &self.param_type
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// `{type, description, items?}`; `items` only for arrays.
    pub fn to_schema(&self) -> Value {
        let mut schema = json!({
            "type": self.param_type.schema_type(),
            "description": self.description,
        });
        if let ParameterType::Array(items) = &self.param_type {
            schema["items"] = items.element_schema();
        }
        schema
    }
}
