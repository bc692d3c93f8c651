/// JSON manifest loading for activity declarations
///
/// A manifest is a JSON document `{ "activities": [ <declaration>, ... ] }`.
/// Loading only parses; descriptors are still built by the registry.

use crate::activity::types::ActivityKindDeclaration;
use crate::error::RegistryError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityManifest {
    #[serde(default)]
    pub activities: Vec<ActivityKindDeclaration>,
}

/// Read declarations from a manifest file, preserving file order
pub fn load_manifest(path: &Path) -> Result<Vec<ActivityKindDeclaration>, RegistryError> {
    let manifest_error = |reason: String| RegistryError::Manifest {
        path: path.display().to_string(),
        reason,
    };

    let content = std::fs::read_to_string(path).map_err(|e| manifest_error(e.to_string()))?;
    let manifest: ActivityManifest =
        serde_json::from_str(&content).map_err(|e| manifest_error(e.to_string()))?;

    tracing::debug!(
        path = %path.display(),
        "Loaded {} activity declarations from manifest",
        manifest.activities.len()
    );

    Ok(manifest.activities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn loads_declarations_in_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("activities.json");
        std::fs::write(
            &path,
            r#"{
                "activities": [
                    { "kind": "acme.invoice", "category": "Billing",
                      "inputs": [{ "name": "in" }], "outputs": [{ "name": "done" }],
                      "properties": [{ "name": "amount", "type": "number" }] },
                    { "kind": "acme.notify", "version": 2 }
                ]
            }"#,
        )
        .unwrap();

        let declarations = load_manifest(&path).unwrap();
        assert_eq!(declarations.len(), 2);
        assert_eq!(declarations[0].kind, "acme.invoice");
        assert_eq!(declarations[0].properties[0].name, "amount");
        assert_eq!(declarations[1].version, 2);
    }

    #[test]
    fn missing_or_malformed_manifest_is_reported() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("missing.json");
        assert!(matches!(
            load_manifest(&missing),
            Err(RegistryError::Manifest { .. })
        ));

        let broken = tmp.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        assert!(matches!(
            load_manifest(&broken),
            Err(RegistryError::Manifest { .. })
        ));
    }
}
