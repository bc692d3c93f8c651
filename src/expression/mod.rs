/// Expression syntax registry
///
/// Tracks which expression syntaxes a definition may use for dynamic property
/// values. Populated from providers and swapped atomically, like the activity
/// registry.

use arc_swap::ArcSwap;
use serde::Serialize;
use std::{collections::BTreeMap, sync::Arc};

/// A known expression syntax
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpressionSyntax {
    /// Identifier used in definitions (e.g., "JavaScript")
    pub name: String,
    pub display_name: String,
}

impl ExpressionSyntax {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
        }
    }
}

/// Supplies syntaxes to the registry
pub trait ExpressionSyntaxProvider: Send + Sync {
    fn syntaxes(&self) -> Vec<ExpressionSyntax>;
}

/// Syntaxes available out of the box
#[derive(Debug, Default)]
pub struct DefaultExpressionSyntaxProvider;

impl ExpressionSyntaxProvider for DefaultExpressionSyntaxProvider {
    fn syntaxes(&self) -> Vec<ExpressionSyntax> {
        ["Literal", "JavaScript", "Liquid", "Json"]
            .into_iter()
            .map(ExpressionSyntax::new)
            .collect()
    }
}

#[derive(Debug)]
pub struct ExpressionSyntaxRegistry {
    syntaxes: ArcSwap<BTreeMap<String, ExpressionSyntax>>,
}

impl Default for ExpressionSyntaxRegistry {
    fn default() -> Self {
        let registry = Self::empty();
        registry.populate(&[&DefaultExpressionSyntaxProvider]);
        registry
    }
}

impl ExpressionSyntaxRegistry {
    pub fn empty() -> Self {
        Self {
            syntaxes: ArcSwap::new(Arc::new(BTreeMap::new())),
        }
    }

    /// Replace the known syntaxes with everything the providers yield.
    /// Later providers win on name clashes.
    pub fn populate(&self, providers: &[&dyn ExpressionSyntaxProvider]) {
        let mut syntaxes = BTreeMap::new();
        for provider in providers {
            for syntax in provider.syntaxes() {
                syntaxes.insert(syntax.name.clone(), syntax);
            }
        }
        tracing::debug!("Populated expression syntax registry with {} syntaxes", syntaxes.len());
        self.syntaxes.store(Arc::new(syntaxes));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.syntaxes.load().contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<ExpressionSyntax> {
        self.syntaxes.load().get(name).cloned()
    }

    /// Syntax names, sorted
    pub fn names(&self) -> Vec<String> {
        self.syntaxes.load().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripting;

    impl ExpressionSyntaxProvider for Scripting {
        fn syntaxes(&self) -> Vec<ExpressionSyntax> {
            vec![ExpressionSyntax::new("Python")]
        }
    }

    #[test]
    fn default_registry_knows_standard_syntaxes() {
        let registry = ExpressionSyntaxRegistry::default();
        assert!(registry.contains("JavaScript"));
        assert!(registry.contains("Liquid"));
        assert!(!registry.contains("Python"));
    }

    #[test]
    fn populate_replaces_known_syntaxes() {
        let registry = ExpressionSyntaxRegistry::default();
        registry.populate(&[&Scripting]);
        assert_eq!(registry.names(), vec!["Python".to_string()]);
        assert!(registry.get("JavaScript").is_none());
    }
}
