/// Workflow definition version records
///
/// A definition is identified by a stable id and owns an ordered list of
/// versions. Records returned by stores are values: callers never mutate them
/// in place, every change goes back through a store or the publisher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a definition version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VersionStatus {
    Draft,
    Published,
    Retracted,
}

impl VersionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionStatus::Draft => "draft",
            VersionStatus::Published => "published",
            VersionStatus::Retracted => "retracted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(VersionStatus::Draft),
            "published" => Some(VersionStatus::Published),
            "retracted" => Some(VersionStatus::Retracted),
            _ => None,
        }
    }
}

impl fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Representation kinds understood by the materializers
///
/// The tag string is what gets persisted next to the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepresentationKind {
    /// Serializable node/connection document
    Structured,
    /// Reference to a precompiled graph builder, resolved by identity
    Compiled,
}

impl RepresentationKind {
    pub const ALL: [RepresentationKind; 2] =
        [RepresentationKind::Structured, RepresentationKind::Compiled];

    pub fn tag(&self) -> &'static str {
        match self {
            RepresentationKind::Structured => "json",
            RepresentationKind::Compiled => "compiled",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.tag() == tag)
    }
}

impl fmt::Display for RepresentationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A stored definition body plus its kind tag
///
/// The payload is opaque to stores; only materializers interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Representation {
    pub kind: String,
    pub payload: String,
}

impl Representation {
    pub fn new(kind: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: payload.into(),
        }
    }

    /// A structured-data document
    pub fn structured(document: &serde_json::Value) -> Self {
        Self::new(RepresentationKind::Structured.tag(), document.to_string())
    }

    /// A reference to a compiled workflow registered under `name`
    pub fn compiled(name: impl Into<String>) -> Self {
        Self::new(RepresentationKind::Compiled.tag(), name)
    }
}

/// One version of a workflow definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionVersion {
    /// Stable definition id (e.g., "wf-orders")
    pub definition_id: String,
    /// 1-based, strictly increasing per definition id
    pub version: u32,
    pub representation: Representation,
    pub status: VersionStatus,
    pub created_at: DateTime<Utc>,
    /// Exactly one version per definition carries this flag
    pub is_latest: bool,
}

impl DefinitionVersion {
    pub fn is_published(&self) -> bool {
        self.status == VersionStatus::Published
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_its_tag() {
        for status in [
            VersionStatus::Draft,
            VersionStatus::Published,
            VersionStatus::Retracted,
        ] {
            assert_eq!(VersionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(VersionStatus::parse("archived"), None);
    }

    #[test]
    fn representation_constructors_set_kind_tags() {
        let doc = serde_json::json!({ "nodes": [] });
        assert_eq!(Representation::structured(&doc).kind, "json");
        assert_eq!(Representation::compiled("orders.v1").payload, "orders.v1");
        assert_eq!(
            RepresentationKind::from_tag("compiled"),
            Some(RepresentationKind::Compiled)
        );
        assert_eq!(RepresentationKind::from_tag("xaml"), None);
    }
}
