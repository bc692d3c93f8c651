/// Activity Catalog Layer
///
/// This module owns everything about activity kinds:
/// - Declarations and descriptor types
/// - The describer with pluggable default/options resolvers
/// - Lock-free registry using ArcSwap
/// - Built-in declarations and JSON manifest loading

// Declaration and descriptor types
pub mod types;

// Declaration -> descriptor builder
pub mod describer;

// Atomic-swap registry of descriptors
pub mod registry;

// Activity kinds shipped with the crate
pub mod builtin;

// Manifest file loader
pub mod manifest;

pub use builtin::builtin_declarations;
pub use describer::{
    ActivityDescriber, DefaultValueContext, DefaultValueResolver, OptionsResolver,
    PropertyDefaultValueResolver, StaticOptionsResolver,
};
pub use manifest::load_manifest;
pub use registry::{ActivityCatalog, ActivityRegistry};
pub use types::{
    ActivityDescriptor, ActivityKindDeclaration, DefaultValueRule, PortDescriptor,
    PropertyDeclaration, PropertyDescriptor, PropertyOption, PropertyType,
};
