/// Caller-driven cancellation and timeouts for store operations
///
/// A `CommitGate` is shared between `run_cancellable` and the store doing the
/// write. The store claims the gate right before it commits. Once claimed the
/// write runs to completion and its real outcome is returned; before that, a
/// cancellation or deadline aborts the write and nothing is committed.

use crate::error::DefinitionError;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const OPEN: u8 = 0;
const COMMITTING: u8 = 1;
const ABORTED: u8 = 2;

/// Decides, exactly once, whether a write commits or aborts
#[derive(Debug)]
pub struct CommitGate {
    token: Option<CancellationToken>,
    deadline: Option<Instant>,
    state: AtomicU8,
}

impl CommitGate {
    /// A gate that never aborts
    pub fn unbounded() -> Self {
        Self {
            token: None,
            deadline: None,
            state: AtomicU8::new(OPEN),
        }
    }

    pub fn new(token: CancellationToken, timeout: Option<Duration>) -> Self {
        Self {
            token: Some(token),
            deadline: timeout.map(|t| Instant::now() + t),
            state: AtomicU8::new(OPEN),
        }
    }

    /// Claim the gate for a commit. `Ok` means the commit must be carried
    /// through; an error means the caller already gave up and nothing may be
    /// written.
    pub fn enter_commit(&self) -> Result<(), DefinitionError> {
        match self.state.load(Ordering::Acquire) {
            COMMITTING => return Ok(()),
            ABORTED => return Err(self.interruption().unwrap_or(DefinitionError::Cancelled)),
            _ => {}
        }
        if let Some(reason) = self.interruption() {
            if self.abort() {
                return Err(reason);
            }
        }
        match self
            .state
            .compare_exchange(OPEN, COMMITTING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) | Err(COMMITTING) => Ok(()),
            Err(_) => Err(self.interruption().unwrap_or(DefinitionError::Cancelled)),
        }
    }

    /// True when the commit has been claimed and can no longer be aborted
    pub fn is_committing(&self) -> bool {
        self.state.load(Ordering::Acquire) == COMMITTING
    }

    /// Close the gate unless a commit already claimed it
    fn abort(&self) -> bool {
        match self
            .state
            .compare_exchange(OPEN, ABORTED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) | Err(ABORTED) => true,
            Err(_) => false,
        }
    }

    fn interruption(&self) -> Option<DefinitionError> {
        if self.token.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Some(DefinitionError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(DefinitionError::TimedOut);
        }
        None
    }

    async fn deadline_elapsed(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    }
}

/// Run `operation` unless `token` is cancelled or `timeout` elapses before
/// the operation's store commits
///
/// `operation` receives the gate to hand to the `*_within` store and
/// publisher calls.
pub async fn run_cancellable<Op, F, T>(
    token: &CancellationToken,
    timeout: Option<Duration>,
    operation: Op,
) -> Result<T, DefinitionError>
where
    Op: FnOnce(Arc<CommitGate>) -> F,
    F: Future<Output = Result<T, DefinitionError>>,
{
    let gate = Arc::new(CommitGate::new(token.clone(), timeout));
    let operation = operation(Arc::clone(&gate));
    tokio::pin!(operation);

    let reason = tokio::select! {
        biased;
        _ = token.cancelled() => DefinitionError::Cancelled,
        _ = gate.deadline_elapsed() => DefinitionError::TimedOut,
        result = &mut operation => return result,
    };

    if gate.abort() {
        tracing::warn!("Definition operation aborted before commit: {}", reason);
        return Err(reason);
    }

    // The store is already committing; report what actually happened
    tracing::debug!("Interrupted during commit, waiting for the store");
    operation.await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::history::{EditOutcome, HistoryEdit, VersionHistory};
    use crate::definition::publisher::DefinitionPublisher;
    use crate::definition::sqlite::SqliteDefinitionStore;
    use crate::definition::store::{DefinitionStore, MemoryDefinitionStore};
    use crate::definition::types::{Representation, VersionStatus};
    use async_trait::async_trait;

    /// Store that stalls before a write, or right after claiming the gate
    struct StallingStore {
        inner: MemoryDefinitionStore,
        before_edit: Duration,
        after_claim: Duration,
    }

    #[async_trait]
    impl DefinitionStore for StallingStore {
        async fn apply_within(
            &self,
            definition_id: &str,
            edit: HistoryEdit,
            gate: &CommitGate,
        ) -> Result<EditOutcome, DefinitionError> {
            tokio::time::sleep(self.before_edit).await;
            if !self.after_claim.is_zero() {
                gate.enter_commit()?;
                tokio::time::sleep(self.after_claim).await;
            }
            self.inner.apply_within(definition_id, edit, gate).await
        }

        async fn history(&self, definition_id: &str) -> Result<Option<VersionHistory>, DefinitionError> {
            self.inner.history(definition_id).await
        }

        async fn delete(&self, definition_id: &str) -> Result<bool, DefinitionError> {
            self.inner.delete(definition_id).await
        }

        async fn list_definition_ids(&self) -> Result<Vec<String>, DefinitionError> {
            self.inner.list_definition_ids().await
        }
    }

    async fn seeded(before_edit: Duration, after_claim: Duration) -> (Arc<StallingStore>, DefinitionPublisher) {
        let inner = MemoryDefinitionStore::new();
        inner.create_draft("wf", Representation::compiled("a")).await.unwrap();
        inner.create_draft("wf", Representation::compiled("b")).await.unwrap();
        inner
            .apply("wf", Box::new(|h: &mut VersionHistory| h.publish(1)))
            .await
            .unwrap();

        let store = Arc::new(StallingStore {
            inner,
            before_edit,
            after_claim,
        });
        let publisher = DefinitionPublisher::new(store.clone());
        (store, publisher)
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_publish_leaves_both_versions_untouched() {
        let (store, publisher) = seeded(Duration::from_secs(30), Duration::ZERO).await;
        let token = CancellationToken::new();

        let result = run_cancellable(&token, Some(Duration::from_millis(50)), |gate| async move {
            publisher.publish_within("wf", 2, &gate).await
        })
        .await;

        assert!(matches!(result, Err(DefinitionError::TimedOut)));
        assert_eq!(store.get_published("wf").await.unwrap().version, 1);
        assert_eq!(
            store.get_version("wf", 2).await.unwrap().status,
            VersionStatus::Draft
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_publish_never_commits() {
        let (store, publisher) = seeded(Duration::from_secs(30), Duration::ZERO).await;
        let token = CancellationToken::new();

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                token.cancel();
            })
        };

        let result = run_cancellable(&token, None, |gate| async move {
            publisher.publish_within("wf", 2, &gate).await
        })
        .await;
        canceller.await.unwrap();

        assert!(matches!(result, Err(DefinitionError::Cancelled)));
        assert_eq!(store.get_published("wf").await.unwrap().version, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_during_commit_reports_the_committed_write() {
        let (store, publisher) = seeded(Duration::ZERO, Duration::from_secs(30)).await;
        let token = CancellationToken::new();

        let result = run_cancellable(&token, Some(Duration::from_millis(50)), |gate| async move {
            publisher.publish_within("wf", 2, &gate).await
        })
        .await;

        let record = result.unwrap();
        assert!(record.record.is_published());
        assert_eq!(store.get_published("wf").await.unwrap().version, 2);
    }

    #[tokio::test]
    async fn expired_gate_refuses_the_commit() {
        let token = CancellationToken::new();
        let gate = CommitGate::new(token.clone(), None);
        token.cancel();
        assert!(matches!(gate.enter_commit(), Err(DefinitionError::Cancelled)));
        assert!(!gate.is_committing());

        let open = CommitGate::unbounded();
        open.enter_commit().unwrap();
        assert!(open.is_committing());
        assert!(!open.abort());
    }

    #[tokio::test]
    async fn cancelled_sqlite_write_rolls_back() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = SqliteDefinitionStore::open(&tmp.path().join("definitions.db"))
            .await
            .unwrap();
        store.create_draft("wf", Representation::compiled("a")).await.unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let result = run_cancellable(&token, None, |gate| {
            let store = &store;
            async move {
                store
                    .create_draft_within("wf", Representation::compiled("b"), &gate)
                    .await
            }
        })
        .await;
        assert!(matches!(result, Err(DefinitionError::Cancelled)));

        // Claimed before the deadline: the write lands and is reported
        let gate = CommitGate::new(CancellationToken::new(), Some(Duration::from_secs(60)));
        let record = store
            .create_draft_within("wf", Representation::compiled("c"), &gate)
            .await
            .unwrap();
        assert_eq!(record.version, 2);
        assert!(gate.is_committing());
        assert_eq!(store.list_versions("wf").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn completes_when_not_interrupted() {
        let store = Arc::new(MemoryDefinitionStore::new());
        let publisher = DefinitionPublisher::new(store.clone());
        store
            .create_draft("wf", Representation::compiled("a"))
            .await
            .unwrap();

        let token = CancellationToken::new();
        let record = run_cancellable(&token, Some(Duration::from_secs(5)), |gate| async move {
            publisher.publish_within("wf", 1, &gate).await
        })
        .await
        .unwrap();
        assert!(record.record.is_published());
    }
}
