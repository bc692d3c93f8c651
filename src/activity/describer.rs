/// Activity descriptor builder
///
/// Turns an `ActivityKindDeclaration` into an immutable `ActivityDescriptor`.
/// Defaults and option lists are resolved here, once, through pluggable
/// resolvers so that every descriptor handed out by the registry is complete.

use crate::activity::types::{
    ActivityDescriptor, ActivityKindDeclaration, DefaultValueRule, PortDeclaration,
    PortDescriptor, PropertyDeclaration, PropertyDescriptor, PropertyOption,
};
use crate::error::DescriptorBuildError;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Context handed to computed default providers
#[derive(Debug, Clone, Copy)]
pub struct DefaultValueContext<'a> {
    pub kind: &'a str,
    pub version: u32,
    pub property: &'a str,
}

/// Resolves a property's default value from its declared rule
pub trait DefaultValueResolver: Send + Sync {
    fn resolve(
        &self,
        rule: &DefaultValueRule,
        context: DefaultValueContext<'_>,
    ) -> Result<Option<Value>, DescriptorBuildError>;
}

/// Resolves the enumerated choices behind an options provider name
pub trait OptionsResolver: Send + Sync {
    fn resolve(
        &self,
        provider: &str,
        context: DefaultValueContext<'_>,
    ) -> Result<Vec<PropertyOption>, DescriptorBuildError>;
}

type ComputedDefault = Arc<dyn Fn(DefaultValueContext<'_>) -> Value + Send + Sync>;

/// Default resolver backed by a table of named computed-default functions
#[derive(Clone, Default)]
pub struct PropertyDefaultValueResolver {
    providers: HashMap<String, ComputedDefault>,
}

impl PropertyDefaultValueResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a computed default under `name`
    pub fn with_provider<F>(mut self, name: impl Into<String>, provider: F) -> Self
    where
        F: Fn(DefaultValueContext<'_>) -> Value + Send + Sync + 'static,
    {
        self.providers.insert(name.into(), Arc::new(provider));
        self
    }

    /// Resolver with the computed defaults used by the built-in catalog
    pub fn standard() -> Self {
        Self::new()
            .with_provider("activity.kind", |ctx| Value::String(ctx.kind.to_string()))
            .with_provider("property.name", |ctx| Value::String(ctx.property.to_string()))
            .with_provider("empty.object", |_| Value::Object(Default::default()))
            .with_provider("empty.array", |_| Value::Array(Vec::new()))
    }
}

impl std::fmt::Debug for PropertyDefaultValueResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.providers.keys().collect();
        names.sort();
        f.debug_struct("PropertyDefaultValueResolver")
            .field("providers", &names)
            .finish()
    }
}

impl DefaultValueResolver for PropertyDefaultValueResolver {
    fn resolve(
        &self,
        rule: &DefaultValueRule,
        context: DefaultValueContext<'_>,
    ) -> Result<Option<Value>, DescriptorBuildError> {
        match rule {
            DefaultValueRule::None => Ok(None),
            DefaultValueRule::Literal(value) => Ok(Some(value.clone())),
            DefaultValueRule::Computed(name) => match self.providers.get(name) {
                Some(provider) => Ok(Some(provider(context))),
                None => Err(DescriptorBuildError::UnknownDefaultProvider {
                    kind: context.kind.to_string(),
                    property: context.property.to_string(),
                    provider: name.clone(),
                }),
            },
        }
    }
}

/// Options resolver backed by fixed option lists
#[derive(Debug, Clone, Default)]
pub struct StaticOptionsResolver {
    providers: HashMap<String, Vec<PropertyOption>>,
}

impl StaticOptionsResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider whose options use the value's string form as label
    pub fn with_values<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let options = values
            .into_iter()
            .map(|v| {
                let value = v.into();
                let label = match &value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                PropertyOption { label, value }
            })
            .collect();
        self.providers.insert(name.into(), options);
        self
    }

    pub fn with_options(mut self, name: impl Into<String>, options: Vec<PropertyOption>) -> Self {
        self.providers.insert(name.into(), options);
        self
    }

    /// Options used by the built-in catalog
    pub fn standard() -> Self {
        Self::new()
            .with_values(
                "http.methods",
                ["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"],
            )
            .with_values("log.levels", ["trace", "debug", "info", "warn", "error"])
    }
}

impl OptionsResolver for StaticOptionsResolver {
    fn resolve(
        &self,
        provider: &str,
        context: DefaultValueContext<'_>,
    ) -> Result<Vec<PropertyOption>, DescriptorBuildError> {
        self.providers
            .get(provider)
            .cloned()
            .ok_or_else(|| DescriptorBuildError::UnknownOptionsProvider {
                kind: context.kind.to_string(),
                property: context.property.to_string(),
                provider: provider.to_string(),
            })
    }
}

/// Builds activity descriptors from declarations
///
/// Pure for a given declaration and resolver set: describing the same
/// declaration twice yields equal descriptors.
#[derive(Clone)]
pub struct ActivityDescriber {
    defaults: Arc<dyn DefaultValueResolver>,
    options: Arc<dyn OptionsResolver>,
}

impl std::fmt::Debug for ActivityDescriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityDescriber").finish_non_exhaustive()
    }
}

impl Default for ActivityDescriber {
    fn default() -> Self {
        Self::new(
            Arc::new(PropertyDefaultValueResolver::standard()),
            Arc::new(StaticOptionsResolver::standard()),
        )
    }
}

impl ActivityDescriber {
    pub fn new(defaults: Arc<dyn DefaultValueResolver>, options: Arc<dyn OptionsResolver>) -> Self {
        Self { defaults, options }
    }

    /// Build the descriptor for one declaration
    pub fn describe(
        &self,
        declaration: &ActivityKindDeclaration,
    ) -> Result<ActivityDescriptor, DescriptorBuildError> {
        let kind = declaration.kind.trim();
        if kind.is_empty() {
            return Err(DescriptorBuildError::EmptyKind);
        }

        let inputs = describe_ports(kind, "input", &declaration.inputs)?;
        let outputs = describe_ports(kind, "output", &declaration.outputs)?;

        let mut seen = HashSet::new();
        let mut properties = Vec::with_capacity(declaration.properties.len());
        for property in &declaration.properties {
            if property.name.trim().is_empty() {
                return Err(DescriptorBuildError::EmptyPropertyName {
                    kind: kind.to_string(),
                });
            }
            if !seen.insert(property.name.as_str()) {
                return Err(DescriptorBuildError::DuplicateProperty {
                    kind: kind.to_string(),
                    property: property.name.clone(),
                });
            }
            properties.push(self.describe_property(kind, declaration.version, property)?);
        }

        Ok(ActivityDescriptor {
            kind: kind.to_string(),
            version: declaration.version,
            display_name: declaration
                .display_name
                .clone()
                .unwrap_or_else(|| humanize(kind)),
            category: declaration.category.clone(),
            description: declaration.description.clone(),
            inputs,
            outputs,
            properties,
        })
    }

    fn describe_property(
        &self,
        kind: &str,
        version: u32,
        property: &PropertyDeclaration,
    ) -> Result<PropertyDescriptor, DescriptorBuildError> {
        let context = DefaultValueContext {
            kind,
            version,
            property: &property.name,
        };

        let default_value = self.defaults.resolve(&property.default, context)?;
        if let Some(value) = &default_value {
            if !property.type_tag.accepts(value) {
                return Err(DescriptorBuildError::DefaultTypeMismatch {
                    kind: kind.to_string(),
                    property: property.name.clone(),
                    expected: property.type_tag.as_str().to_string(),
                });
            }
        }

        let options = match &property.options_provider {
            Some(provider) => Some(self.options.resolve(provider, context)?),
            None => None,
        };

        Ok(PropertyDescriptor {
            name: property.name.clone(),
            display_name: property
                .display_name
                .clone()
                .unwrap_or_else(|| humanize(&property.name)),
            description: property.description.clone(),
            type_tag: property.type_tag,
            supports_expressions: property.supports_expressions,
            default_rule: property.default.clone(),
            default_value,
            options_provider: property.options_provider.clone(),
            options,
        })
    }
}

fn describe_ports(
    kind: &str,
    direction: &'static str,
    ports: &[PortDeclaration],
) -> Result<Vec<PortDescriptor>, DescriptorBuildError> {
    let mut seen = HashSet::new();
    ports
        .iter()
        .map(|port| {
            if port.name.trim().is_empty() {
                return Err(DescriptorBuildError::EmptyPortName {
                    kind: kind.to_string(),
                });
            }
            if !seen.insert(port.name.as_str()) {
                return Err(DescriptorBuildError::DuplicatePort {
                    kind: kind.to_string(),
                    direction,
                    port: port.name.clone(),
                });
            }
            Ok(PortDescriptor {
                name: port.name.clone(),
                display_name: port
                    .display_name
                    .clone()
                    .unwrap_or_else(|| humanize(&port.name)),
            })
        })
        .collect()
}

/// "http.request" -> "Http Request", "set_variable" -> "Set Variable"
fn humanize(name: &str) -> String {
    name.split(|c: char| c == '.' || c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
