/// Binds a workflow document against an activity catalog
///
/// Shared by every strategy: resolves each node's activity kind, binds
/// property values (falling back to descriptor defaults) and validates
/// connections. Any failure aborts the whole graph.

use crate::activity::{ActivityCatalog, ActivityDescriptor};
use crate::definition::DefinitionVersion;
use crate::error::MaterializeError;
use crate::expression::ExpressionSyntaxRegistry;
use crate::materialize::document::{GraphDocument, NodeDocument, PropertyInput};
use crate::materialize::graph::{ActivityNode, BoundProperty, BoundValue, Connection, ExecutableGraph};
use std::sync::Arc;

/// What a strategy resolves references against
#[derive(Clone, Copy)]
pub struct MaterializeContext<'a> {
    /// One catalog generation for the whole materialization
    pub catalog: &'a ActivityCatalog,
    pub syntaxes: &'a ExpressionSyntaxRegistry,
}

pub fn bind_document(
    version: &DefinitionVersion,
    document: &GraphDocument,
    context: MaterializeContext<'_>,
) -> Result<ExecutableGraph, MaterializeError> {
    let mut graph = ExecutableGraph::new(version.definition_id.clone(), version.version);

    for node in &document.nodes {
        if graph.contains(&node.id) {
            return Err(MaterializeError::DuplicateNode(node.id.clone()));
        }
        let descriptor = context.catalog.get(&node.activity)?;
        if let Some(requested) = node.version {
            if requested != descriptor.version {
                return Err(MaterializeError::ActivityVersionMismatch {
                    node: node.id.clone(),
                    kind: descriptor.kind.clone(),
                    requested,
                    available: descriptor.version,
                });
            }
        }

        let properties = bind_properties(node, &descriptor, context.syntaxes)?;
        graph.add_node(ActivityNode {
            id: node.id.clone(),
            descriptor,
            properties,
        });
    }

    for connection in &document.connections {
        let source = graph
            .node(&connection.source)
            .ok_or_else(|| MaterializeError::UnknownNode(connection.source.clone()))?;
        if !source.descriptor.has_output(&connection.source_port) {
            return Err(unknown_port(source, "output", &connection.source_port));
        }

        let target = graph
            .node(&connection.target)
            .ok_or_else(|| MaterializeError::UnknownNode(connection.target.clone()))?;
        if !target.descriptor.has_input(&connection.target_port) {
            return Err(unknown_port(target, "input", &connection.target_port));
        }

        graph.add_connection(
            &connection.source,
            &connection.target,
            Connection {
                source_port: connection.source_port.clone(),
                target_port: connection.target_port.clone(),
            },
        );
    }

    tracing::debug!(
        definition_id = %version.definition_id,
        version = version.version,
        catalog_generation = context.catalog.generation(),
        "Bound {} nodes and {} connections",
        graph.node_count(),
        graph.connection_count()
    );

    Ok(graph)
}

fn unknown_port(node: &ActivityNode, direction: &'static str, port: &str) -> MaterializeError {
    MaterializeError::UnknownPort {
        node: node.id.clone(),
        kind: node.descriptor.kind.clone(),
        direction,
        port: port.to_string(),
    }
}

fn bind_properties(
    node: &NodeDocument,
    descriptor: &Arc<ActivityDescriptor>,
    syntaxes: &ExpressionSyntaxRegistry,
) -> Result<Vec<BoundProperty>, MaterializeError> {
    if let Some(undeclared) = node
        .properties
        .keys()
        .find(|name| descriptor.property(name).is_none())
    {
        return Err(MaterializeError::UnknownProperty {
            node: node.id.clone(),
            kind: descriptor.kind.clone(),
            property: undeclared.clone(),
        });
    }

    let mut bound = Vec::new();
    for property in &descriptor.properties {
        let invalid = |reason: String| MaterializeError::InvalidPropertyValue {
            node: node.id.clone(),
            property: property.name.clone(),
            reason,
        };

        match node.properties.get(&property.name) {
            Some(PropertyInput::Expression(input)) => {
                if !property.supports_expressions {
                    return Err(MaterializeError::ExpressionsNotSupported {
                        node: node.id.clone(),
                        property: property.name.clone(),
                    });
                }
                if !syntaxes.contains(&input.syntax) {
                    return Err(MaterializeError::UnknownSyntax {
                        node: node.id.clone(),
                        property: property.name.clone(),
                        syntax: input.syntax.clone(),
                    });
                }
                bound.push(BoundProperty {
                    name: property.name.clone(),
                    value: BoundValue::Expression {
                        syntax: input.syntax.clone(),
                        expression: input.expression.clone(),
                    },
                    from_default: false,
                });
            }
            Some(PropertyInput::Literal(value)) => {
                if !property.type_tag.accepts(value) {
                    return Err(invalid(format!(
                        "expected {}, got {}",
                        property.type_tag.as_str(),
                        value
                    )));
                }
                if !property.allows(value) {
                    return Err(invalid(format!("{} is not one of the allowed options", value)));
                }
                bound.push(BoundProperty {
                    name: property.name.clone(),
                    value: BoundValue::Literal(value.clone()),
                    from_default: false,
                });
            }
            None => {
                if let Some(default) = &property.default_value {
                    bound.push(BoundProperty {
                        name: property.name.clone(),
                        value: BoundValue::Literal(default.clone()),
                        from_default: true,
                    });
                }
            }
        }
    }

    Ok(bound)
}
