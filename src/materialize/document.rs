/// Structured workflow document
///
/// The serializable node/connection shape both strategies bind from. The
/// structured strategy parses it from the stored payload; compiled workflows
/// emit it through `DocumentBuilder`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub nodes: Vec<NodeDocument>,
    #[serde(default)]
    pub connections: Vec<ConnectionDocument>,
}

/// One activity node as written in a definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDocument {
    /// Unique node identifier within the document (e.g., "fetch")
    pub id: String,
    /// Activity kind identifier (e.g., "http.request")
    pub activity: String,
    /// Optional pin on the activity kind's version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyInput>,
}

impl NodeDocument {
    pub fn new(id: impl Into<String>, activity: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            activity: activity.into(),
            version: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        self.properties.insert(name.into(), PropertyInput::Literal(value));
        self
    }

    pub fn expression(
        &mut self,
        name: impl Into<String>,
        syntax: impl Into<String>,
        expression: impl Into<String>,
    ) -> &mut Self {
        self.properties.insert(
            name.into(),
            PropertyInput::Expression(ExpressionInput {
                syntax: syntax.into(),
                expression: expression.into(),
            }),
        );
        self
    }

    pub fn pin(&mut self, version: u32) -> &mut Self {
        self.version = Some(version);
        self
    }
}

/// A property value: either a dynamic expression or a literal
///
/// An object with exactly `syntax` and `expression` string fields is read as
/// an expression; anything else is a literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyInput {
    Expression(ExpressionInput),
    Literal(Value),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpressionInput {
    pub syntax: String,
    pub expression: String,
}

/// A directed link from one node's output port to another node's input port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDocument {
    pub source: String,
    pub source_port: String,
    pub target: String,
    pub target_port: String,
}

/// Fluent construction of a `GraphDocument`, used by compiled workflows
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    document: GraphDocument,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node and return it for property assignment
    pub fn node(&mut self, id: impl Into<String>, activity: impl Into<String>) -> &mut NodeDocument {
        self.document.nodes.push(NodeDocument::new(id, activity));
        let last = self.document.nodes.len() - 1;
        &mut self.document.nodes[last]
    }

    pub fn connect(
        &mut self,
        source: impl Into<String>,
        source_port: impl Into<String>,
        target: impl Into<String>,
        target_port: impl Into<String>,
    ) -> &mut Self {
        self.document.connections.push(ConnectionDocument {
            source: source.into(),
            source_port: source_port.into(),
            target: target.into(),
            target_port: target_port.into(),
        });
        self
    }

    pub fn build(self) -> GraphDocument {
        self.document
    }
}
