/// Version history state machine
///
/// `VersionHistory` is the in-memory model of every version of one definition.
/// Stores load it, run exactly one edit against it while holding the
/// definition's write lock, re-check the invariants and commit the result.

use crate::definition::types::{DefinitionVersion, Representation, VersionStatus};
use crate::error::DefinitionError;
use chrono::{DateTime, Utc};

/// Result of one edit: the record the caller asked about, and whether the
/// history changed (unchanged edits are not committed)
#[derive(Debug, Clone)]
pub struct EditOutcome {
    pub record: DefinitionVersion,
    pub changed: bool,
}

impl EditOutcome {
    pub fn changed(record: DefinitionVersion) -> Self {
        Self {
            record,
            changed: true,
        }
    }

    pub fn unchanged(record: DefinitionVersion) -> Self {
        Self {
            record,
            changed: false,
        }
    }
}

/// A mutation applied under a store's per-definition write lock
pub type HistoryEdit =
    Box<dyn FnOnce(&mut VersionHistory) -> Result<EditOutcome, DefinitionError> + Send>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionHistory {
    definition_id: String,
    /// Ascending by version number
    versions: Vec<DefinitionVersion>,
    /// Highest version number ever removed by a delete; new drafts start above it
    retired_max: u32,
}

impl VersionHistory {
    pub fn new(definition_id: impl Into<String>) -> Self {
        Self {
            definition_id: definition_id.into(),
            versions: Vec::new(),
            retired_max: 0,
        }
    }

    /// Rebuild a history from stored records (any order)
    pub fn from_versions(definition_id: impl Into<String>, mut versions: Vec<DefinitionVersion>) -> Self {
        versions.sort_by_key(|v| v.version);
        Self {
            definition_id: definition_id.into(),
            versions,
            retired_max: 0,
        }
    }

    /// Continue numbering above versions that were deleted
    pub fn with_retired_max(mut self, retired_max: u32) -> Self {
        self.retired_max = retired_max;
        self
    }

    /// Highest version number this definition id has ever used
    pub fn high_water(&self) -> u32 {
        self.versions
            .last()
            .map_or(self.retired_max, |v| v.version.max(self.retired_max))
    }

    pub fn definition_id(&self) -> &str {
        &self.definition_id
    }

    pub fn versions(&self) -> &[DefinitionVersion] {
        &self.versions
    }

    pub fn into_versions(self) -> Vec<DefinitionVersion> {
        self.versions
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn get(&self, version: u32) -> Result<&DefinitionVersion, DefinitionError> {
        self.versions
            .iter()
            .find(|v| v.version == version)
            .ok_or_else(|| self.not_found(version))
    }

    pub fn published(&self) -> Result<&DefinitionVersion, DefinitionError> {
        self.versions
            .iter()
            .find(|v| v.is_published())
            .ok_or_else(|| DefinitionError::NoPublishedVersion(self.definition_id.clone()))
    }

    pub fn latest(&self) -> Result<&DefinitionVersion, DefinitionError> {
        self.versions
            .iter()
            .find(|v| v.is_latest)
            .ok_or_else(|| DefinitionError::DefinitionNotFound(self.definition_id.clone()))
    }

    /// Append version N+1 as a draft
    pub fn append_draft(&mut self, representation: Representation, now: DateTime<Utc>) -> DefinitionVersion {
        let version = self.high_water() + 1;
        self.versions.push(DefinitionVersion {
            definition_id: self.definition_id.clone(),
            version,
            representation,
            status: VersionStatus::Draft,
            created_at: now,
            is_latest: false,
        });
        self.refresh_latest();
        self.versions[self.versions.len() - 1].clone()
    }

    /// Publish `version`, demoting the current published version to retracted
    ///
    /// Idempotent when `version` is already published. A retracted version can
    /// never be published again.
    pub fn publish(&mut self, version: u32) -> Result<EditOutcome, DefinitionError> {
        let target = self.position(version)?;
        match self.versions[target].status {
            VersionStatus::Published => {
                return Ok(EditOutcome::unchanged(self.versions[target].clone()));
            }
            VersionStatus::Retracted => {
                return Err(DefinitionError::RetractedVersion {
                    definition_id: self.definition_id.clone(),
                    version,
                });
            }
            VersionStatus::Draft => {}
        }

        for v in self.versions.iter_mut().filter(|v| v.is_published()) {
            v.status = VersionStatus::Retracted;
        }
        self.versions[target].status = VersionStatus::Published;
        self.refresh_latest();
        Ok(EditOutcome::changed(self.versions[target].clone()))
    }

    /// Retract `version`; idempotent when it is already retracted
    pub fn retract(&mut self, version: u32) -> Result<EditOutcome, DefinitionError> {
        let target = self.position(version)?;
        if self.versions[target].status == VersionStatus::Retracted {
            return Ok(EditOutcome::unchanged(self.versions[target].clone()));
        }
        self.versions[target].status = VersionStatus::Retracted;
        self.refresh_latest();
        Ok(EditOutcome::changed(self.versions[target].clone()))
    }

    /// Latest is the highest non-retracted version, or the highest overall
    /// when every version is retracted.
    fn refresh_latest(&mut self) {
        let latest = self
            .versions
            .iter()
            .rev()
            .find(|v| v.status != VersionStatus::Retracted)
            .or(self.versions.last())
            .map(|v| v.version);

        for v in &mut self.versions {
            v.is_latest = Some(v.version) == latest;
        }
    }

    /// Verify every versioning invariant
    ///
    /// A failure here means a write slipped past the store's per-id exclusivity.
    pub fn check_invariants(&self) -> Result<(), DefinitionError> {
        let violation = |detail: String| DefinitionError::InternalConsistency {
            definition_id: self.definition_id.clone(),
            detail,
        };

        if let Some(first) = self.versions.first() {
            if first.version <= self.retired_max {
                return Err(violation(format!(
                    "version {} reuses a deleted version number (up to {})",
                    first.version, self.retired_max
                )));
            }
        }

        for pair in self.versions.windows(2) {
            if pair[1].version <= pair[0].version {
                return Err(violation(format!(
                    "version {} follows version {}",
                    pair[1].version, pair[0].version
                )));
            }
        }

        if let Some(foreign) = self
            .versions
            .iter()
            .find(|v| v.definition_id != self.definition_id)
        {
            return Err(violation(format!(
                "version {} belongs to definition '{}'",
                foreign.version, foreign.definition_id
            )));
        }

        let published = self.versions.iter().filter(|v| v.is_published()).count();
        if published > 1 {
            return Err(violation(format!("{} published versions", published)));
        }

        let latest = self.versions.iter().filter(|v| v.is_latest).count();
        if !self.versions.is_empty() && latest != 1 {
            return Err(violation(format!("{} versions flagged latest", latest)));
        }

        Ok(())
    }

    fn position(&self, version: u32) -> Result<usize, DefinitionError> {
        self.versions
            .iter()
            .position(|v| v.version == version)
            .ok_or_else(|| self.not_found(version))
    }

    fn not_found(&self, version: u32) -> DefinitionError {
        DefinitionError::VersionNotFound {
            definition_id: self.definition_id.clone(),
            version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(history: &mut VersionHistory) -> u32 {
        history
            .append_draft(Representation::compiled("noop"), Utc::now())
            .version
    }

    fn status(history: &VersionHistory, version: u32) -> VersionStatus {
        history.get(version).unwrap().status
    }

    #[test]
    fn drafts_are_numbered_without_gaps() {
        let mut history = VersionHistory::new("wf");
        let numbers: Vec<u32> = (0..5).map(|_| draft(&mut history)).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
        assert_eq!(history.latest().unwrap().version, 5);
        history.check_invariants().unwrap();
    }

    #[test]
    fn publishing_demotes_previous_published_version() {
        let mut history = VersionHistory::new("wf");
        draft(&mut history);
        draft(&mut history);

        history.publish(1).unwrap();
        let outcome = history.publish(2).unwrap();

        assert!(outcome.changed);
        assert_eq!(history.published().unwrap().version, 2);
        assert_eq!(status(&history, 1), VersionStatus::Retracted);
        history.check_invariants().unwrap();
    }

    #[test]
    fn publishing_twice_is_a_no_op() {
        let mut history = VersionHistory::new("wf");
        draft(&mut history);
        assert!(history.publish(1).unwrap().changed);
        let before = history.clone();

        let again = history.publish(1).unwrap();
        assert!(!again.changed);
        assert_eq!(history, before);
    }

    #[test]
    fn retracted_versions_cannot_be_published() {
        let mut history = VersionHistory::new("wf");
        draft(&mut history);
        history.retract(1).unwrap();

        assert!(matches!(
            history.publish(1),
            Err(DefinitionError::RetractedVersion { version: 1, .. })
        ));
    }

    #[test]
    fn retract_is_idempotent_and_reports_missing_versions() {
        let mut history = VersionHistory::new("wf");
        draft(&mut history);

        assert!(history.retract(1).unwrap().changed);
        assert!(!history.retract(1).unwrap().changed);
        assert!(matches!(
            history.retract(9),
            Err(DefinitionError::VersionNotFound { version: 9, .. })
        ));
    }

    #[test]
    fn latest_skips_retracted_versions_unless_all_are_retracted() {
        let mut history = VersionHistory::new("wf");
        draft(&mut history);
        draft(&mut history);
        draft(&mut history);

        history.retract(3).unwrap();
        assert_eq!(history.latest().unwrap().version, 2);

        history.retract(2).unwrap();
        history.retract(1).unwrap();
        assert_eq!(history.latest().unwrap().version, 3);
        history.check_invariants().unwrap();
    }

    #[test]
    fn version_numbers_are_not_reused_after_retraction() {
        let mut history = VersionHistory::new("wf");
        draft(&mut history);
        draft(&mut history);
        history.retract(2).unwrap();
        assert_eq!(draft(&mut history), 3);
    }

    #[test]
    fn invariant_check_catches_corruption() {
        let mut history = VersionHistory::new("wf");
        draft(&mut history);
        draft(&mut history);
        let mut versions = history.clone().into_versions();
        versions[1].version = 1;
        let corrupt = VersionHistory::from_versions("wf", versions);
        assert!(matches!(
            corrupt.check_invariants(),
            Err(DefinitionError::InternalConsistency { .. })
        ));

        let mut versions = history.into_versions();
        versions[0].status = VersionStatus::Published;
        versions[1].status = VersionStatus::Published;
        let corrupt = VersionHistory::from_versions("wf", versions);
        assert!(corrupt.check_invariants().is_err());
    }

    #[test]
    fn numbering_continues_above_deleted_versions() {
        let mut history = VersionHistory::new("wf").with_retired_max(4);
        assert_eq!(history.high_water(), 4);
        assert_eq!(draft(&mut history), 5);
        history.check_invariants().unwrap();

        let reused = VersionHistory::from_versions("wf", history.clone().into_versions())
            .with_retired_max(5);
        assert!(matches!(
            reused.check_invariants(),
            Err(DefinitionError::InternalConsistency { .. })
        ));
    }
}
