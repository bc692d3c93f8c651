/// Activity kind declarations and the descriptors built from them
///
/// Declarations are what the host application registers (by hand or from a
/// manifest). Descriptors are the immutable, fully-resolved metadata the
/// registry hands out to materializers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared type of an activity property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    Any,
}

impl PropertyType {
    /// Whether a literal JSON value is acceptable for this type tag.
    /// `null` is accepted everywhere and means "explicitly unset".
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (PropertyType::Any, _) => true,
            (PropertyType::String, Value::String(_)) => true,
            (PropertyType::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (PropertyType::Number, Value::Number(_)) => true,
            (PropertyType::Boolean, Value::Bool(_)) => true,
            (PropertyType::Object, Value::Object(_)) => true,
            (PropertyType::Array, Value::Array(_)) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::String => "string",
            PropertyType::Integer => "integer",
            PropertyType::Number => "number",
            PropertyType::Boolean => "boolean",
            PropertyType::Object => "object",
            PropertyType::Array => "array",
            PropertyType::Any => "any",
        }
    }
}

/// How a property's default value is obtained
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "rule", content = "value", rename_all = "lowercase")]
pub enum DefaultValueRule {
    /// No default; an omitted value stays unset
    #[default]
    None,
    /// A fixed JSON value
    Literal(Value),
    /// Computed by a named default value provider
    Computed(String),
}

/// A named port on an activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDeclaration {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// A configurable property on an activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDeclaration {
    pub name: String,
    #[serde(rename = "type")]
    pub type_tag: PropertyType,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the property may be bound to a dynamic expression
    #[serde(default)]
    pub supports_expressions: bool,
    #[serde(default)]
    pub default: DefaultValueRule,
    /// Name of the options provider for enumerated choices
    #[serde(default)]
    pub options_provider: Option<String>,
}

/// Structural declaration of an activity kind, as registered by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityKindDeclaration {
    /// Unique activity kind identifier (e.g., "http.request")
    pub kind: String,
    #[serde(default = "default_activity_version")]
    pub version: u32,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub inputs: Vec<PortDeclaration>,
    #[serde(default)]
    pub outputs: Vec<PortDeclaration>,
    #[serde(default)]
    pub properties: Vec<PropertyDeclaration>,
}

fn default_activity_version() -> u32 {
    1
}

fn default_category() -> String {
    "Miscellaneous".to_string()
}

impl ActivityKindDeclaration {
    pub fn new(kind: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            version: default_activity_version(),
            display_name: None,
            category: category.into(),
            description: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn input(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(PortDeclaration {
            name: name.into(),
            display_name: None,
        });
        self
    }

    pub fn output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(PortDeclaration {
            name: name.into(),
            display_name: None,
        });
        self
    }

    pub fn property(mut self, property: PropertyDeclaration) -> Self {
        self.properties.push(property);
        self
    }
}

impl PropertyDeclaration {
    pub fn new(name: impl Into<String>, type_tag: PropertyType) -> Self {
        Self {
            name: name.into(),
            type_tag,
            display_name: None,
            description: None,
            supports_expressions: false,
            default: DefaultValueRule::None,
            options_provider: None,
        }
    }

    pub fn expressions(mut self) -> Self {
        self.supports_expressions = true;
        self
    }

    pub fn default_literal(mut self, value: Value) -> Self {
        self.default = DefaultValueRule::Literal(value);
        self
    }

    pub fn default_computed(mut self, provider: impl Into<String>) -> Self {
        self.default = DefaultValueRule::Computed(provider.into());
        self
    }

    pub fn options(mut self, provider: impl Into<String>) -> Self {
        self.options_provider = Some(provider.into());
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Resolved port metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortDescriptor {
    pub name: String,
    pub display_name: String,
}

/// A single enumerated choice for a property
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyOption {
    pub label: String,
    pub value: Value,
}

/// Resolved property metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyDescriptor {
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub type_tag: PropertyType,
    pub supports_expressions: bool,
    /// The declared rule, kept for introspection
    pub default_rule: DefaultValueRule,
    /// The value produced by the rule at describe time
    pub default_value: Option<Value>,
    pub options_provider: Option<String>,
    /// Choices produced by the options provider at describe time
    pub options: Option<Vec<PropertyOption>>,
}

impl PropertyDescriptor {
    /// Whether `value` is one of the resolved options (always true when unrestricted)
    pub fn allows(&self, value: &Value) -> bool {
        match &self.options {
            Some(options) => value.is_null() || options.iter().any(|o| &o.value == value),
            None => true,
        }
    }
}

/// Immutable metadata for one activity kind
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityDescriptor {
    pub kind: String,
    pub version: u32,
    pub display_name: String,
    pub category: String,
    pub description: Option<String>,
    pub inputs: Vec<PortDescriptor>,
    pub outputs: Vec<PortDescriptor>,
    pub properties: Vec<PropertyDescriptor>,
}

impl ActivityDescriptor {
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn has_input(&self, name: &str) -> bool {
        self.inputs.iter().any(|p| p.name == name)
    }

    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|p| p.name == name)
    }
}
