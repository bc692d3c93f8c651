/// Activity registry using ArcSwap
///
/// Holds the catalog of activity descriptors keyed by kind identifier.
/// Population builds a complete new catalog off to the side and swaps the
/// whole pointer in one step, so readers see either the old catalog or the
/// new one, never a mixture. Lookups are lock-free.

use crate::activity::describer::ActivityDescriber;
use crate::activity::types::{ActivityDescriptor, ActivityKindDeclaration};
use crate::error::RegistryError;
use arc_swap::ArcSwap;
use std::{collections::HashMap, sync::Arc};

/// One immutable generation of the activity catalog
///
/// Materializers resolve every reference of a single definition against one
/// catalog so a concurrent re-population can't split a graph across two
/// generations.
#[derive(Debug, Default)]
pub struct ActivityCatalog {
    /// Descriptors in declaration order
    descriptors: Vec<Arc<ActivityDescriptor>>,
    /// Key: activity kind, Value: index into `descriptors`
    index: HashMap<String, usize>,
    /// Incremented on every successful population
    generation: u64,
}

impl ActivityCatalog {
    pub fn get(&self, kind: &str) -> Result<Arc<ActivityDescriptor>, RegistryError> {
        self.index
            .get(kind)
            .map(|&i| Arc::clone(&self.descriptors[i]))
            .ok_or_else(|| RegistryError::UnknownActivityKind(kind.to_string()))
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.index.contains_key(kind)
    }

    pub fn list(&self) -> Vec<Arc<ActivityDescriptor>> {
        self.descriptors.clone()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Lock-free activity registry with atomic re-population
#[derive(Debug)]
pub struct ActivityRegistry {
    catalog: ArcSwap<ActivityCatalog>,
    describer: ActivityDescriber,
}

impl Default for ActivityRegistry {
    fn default() -> Self {
        Self::new(ActivityDescriber::default())
    }
}

impl ActivityRegistry {
    /// Create an empty registry that builds descriptors with `describer`
    pub fn new(describer: ActivityDescriber) -> Self {
        Self {
            catalog: ArcSwap::new(Arc::new(ActivityCatalog::default())),
            describer,
        }
    }

    /// Replace the catalog with descriptors built from `declarations`
    ///
    /// Either every declaration is described and the new catalog is swapped
    /// in, or nothing changes and the previous catalog stays visible.
    pub fn populate<I>(&self, declarations: I) -> Result<(), RegistryError>
    where
        I: IntoIterator<Item = ActivityKindDeclaration>,
    {
        let mut descriptors = Vec::new();
        let mut index = HashMap::new();

        for declaration in declarations {
            let descriptor = self.describer.describe(&declaration)?;
            if index.contains_key(&descriptor.kind) {
                tracing::error!(kind = %descriptor.kind, "duplicate activity kind, population rejected");
                return Err(RegistryError::DuplicateActivityKind(descriptor.kind));
            }
            index.insert(descriptor.kind.clone(), descriptors.len());
            descriptors.push(Arc::new(descriptor));
        }

        let generation = self.catalog.load().generation + 1;
        let count = descriptors.len();

        // Atomic swap of the entire catalog
        self.catalog.store(Arc::new(ActivityCatalog {
            descriptors,
            index,
            generation,
        }));

        tracing::info!(generation, "📚 Populated activity registry with {} activity kinds", count);
        Ok(())
    }

    /// Get a descriptor by kind (lock-free read)
    pub fn get(&self, kind: &str) -> Result<Arc<ActivityDescriptor>, RegistryError> {
        self.catalog.load().get(kind)
    }

    /// All descriptors, in declaration order
    pub fn list(&self) -> Vec<Arc<ActivityDescriptor>> {
        self.catalog.load().list()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.catalog.load().contains(kind)
    }

    pub fn len(&self) -> usize {
        self.catalog.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.load().is_empty()
    }

    /// Descriptors in `category`, in declaration order
    pub fn kinds_in_category(&self, category: &str) -> Vec<Arc<ActivityDescriptor>> {
        self.catalog
            .load()
            .descriptors
            .iter()
            .filter(|d| d.category == category)
            .cloned()
            .collect()
    }

    /// The current catalog generation, pinned for as long as the caller holds it
    pub fn snapshot(&self) -> Arc<ActivityCatalog> {
        self.catalog.load_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::types::{PropertyDeclaration, PropertyType};

    fn decl(kind: &str) -> ActivityKindDeclaration {
        ActivityKindDeclaration::new(kind, "Test")
            .input("in")
            .output("out")
            .property(PropertyDeclaration::new("value", PropertyType::Any))
    }

    #[test]
    fn populate_then_get_returns_matching_descriptors() {
        let registry = ActivityRegistry::default();
        registry
            .populate(vec![decl("a"), decl("b"), decl("c")])
            .unwrap();

        for kind in ["a", "b", "c"] {
            assert_eq!(registry.get(kind).unwrap().kind, kind);
        }
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn list_preserves_declaration_order() {
        let registry = ActivityRegistry::default();
        registry
            .populate(vec![decl("zeta"), decl("alpha"), decl("mid")])
            .unwrap();

        let kinds: Vec<_> = registry.list().iter().map(|d| d.kind.clone()).collect();
        assert_eq!(kinds, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn unknown_kind_is_an_error() {
        let registry = ActivityRegistry::default();
        assert!(matches!(
            registry.get("missing"),
            Err(RegistryError::UnknownActivityKind(k)) if k == "missing"
        ));
    }

    #[test]
    fn duplicate_population_leaves_previous_catalog() {
        let registry = ActivityRegistry::default();
        registry.populate(vec![decl("a")]).unwrap();
        let before = registry.snapshot().generation();

        let err = registry
            .populate(vec![decl("b"), decl("b")])
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateActivityKind(k) if k == "b"));

        assert!(registry.contains("a"));
        assert!(!registry.contains("b"));
        assert_eq!(registry.snapshot().generation(), before);
    }

    #[test]
    fn malformed_declaration_fails_whole_population() {
        let registry = ActivityRegistry::default();
        registry.populate(vec![decl("a")]).unwrap();

        let bad = ActivityKindDeclaration::new("", "Test");
        assert!(matches!(
            registry.populate(vec![decl("b"), bad]),
            Err(RegistryError::Descriptor(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn repopulation_replaces_catalog_but_snapshots_stay_intact() {
        let registry = ActivityRegistry::default();
        registry.populate(vec![decl("a"), decl("b")]).unwrap();
        let old = registry.snapshot();

        registry.populate(vec![decl("c")]).unwrap();

        assert!(old.contains("a"));
        assert_eq!(old.len(), 2);
        assert!(!registry.contains("a"));
        assert!(registry.contains("c"));
        assert_eq!(registry.snapshot().generation(), old.generation() + 1);
    }

    #[test]
    fn kinds_in_category_filters() {
        let registry = ActivityRegistry::default();
        registry
            .populate(vec![
                ActivityKindDeclaration::new("x", "One"),
                ActivityKindDeclaration::new("y", "Two"),
                ActivityKindDeclaration::new("z", "One"),
            ])
            .unwrap();
        let kinds: Vec<_> = registry
            .kinds_in_category("One")
            .iter()
            .map(|d| d.kind.clone())
            .collect();
        assert_eq!(kinds, vec!["x", "z"]);
    }

    #[test]
    fn concurrent_readers_never_see_a_mixed_catalog() {
        let registry = Arc::new(ActivityRegistry::default());
        registry.populate(vec![decl("old.a"), decl("old.b")]).unwrap();

        let reader = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                for _ in 0..2_000 {
                    let snapshot = registry.snapshot();
                    let old = snapshot.contains("old.a") && snapshot.contains("old.b");
                    let new = snapshot.contains("new.a") && snapshot.contains("new.b");
                    assert!(old ^ new, "observed a partially populated catalog");
                }
            })
        };

        for i in 0..200 {
            let set = if i % 2 == 0 {
                vec![decl("new.a"), decl("new.b")]
            } else {
                vec![decl("old.a"), decl("old.b")]
            };
            registry.populate(set).unwrap();
        }

        reader.join().unwrap();
    }
}
