/// SQLite persistence layer for definition versions
///
/// One row per (definition_id, version). Each edit loads the definition's rows
/// inside an immediate transaction, applies the edit to the in-memory history
/// and writes back: new versions are plain INSERTs so a number collision from
/// a writer outside this process surfaces as a unique-constraint violation
/// instead of silently overwriting a row. Deleting a definition records its
/// highest version number so numbering resumes above it.

use crate::definition::cancel::CommitGate;
use crate::definition::history::{EditOutcome, HistoryEdit, VersionHistory};
use crate::definition::store::DefinitionStore;
use crate::definition::types::{DefinitionVersion, Representation, VersionStatus};
use crate::error::DefinitionError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteRow},
    Row, SqliteConnection,
};
use std::{
    collections::{HashMap, HashSet},
    path::Path,
    sync::Arc,
    time::Duration,
};
use tokio::sync::Mutex;

/// How long a writer waits for another connection's write transaction
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Takes SQLite's write lock up front so concurrent writers queue on the
/// busy timeout instead of failing a read-to-write upgrade
const BEGIN_WRITE: &str = "BEGIN IMMEDIATE";

/// SQLite-backed definition store
#[derive(Debug)]
pub struct SqliteDefinitionStore {
    pool: SqlitePool,
    /// Per-definition write locks, present only while a write is in flight;
    /// key: definition id
    write_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SqliteDefinitionStore {
    /// Wrap an existing pool. Call `init_schema` before first use.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Open (creating if missing) the database file at `path` and initialize the schema
    pub async fn open(path: &Path) -> Result<Self, DefinitionError> {
        tracing::info!("🗄️ Opening definition database: {}", path.display());
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePool::connect_with(options).await?;
        let store = Self::new(pool);
        store.init_schema().await?;
        Ok(store)
    }

    /// Create the versions and counters tables. Safe to call repeatedly.
    pub async fn init_schema(&self) -> Result<(), DefinitionError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workflow_definition_versions (
                definition_id TEXT NOT NULL,
                version INTEGER NOT NULL,
                status TEXT NOT NULL,
                is_latest INTEGER NOT NULL DEFAULT 0,
                representation_kind TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (definition_id, version)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_definition_versions_status
            ON workflow_definition_versions(definition_id, status)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workflow_definition_counters (
                definition_id TEXT PRIMARY KEY,
                retired_max INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn write_lock(&self, definition_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.write_locks.lock().await;
        Arc::clone(locks.entry(definition_id.to_string()).or_default())
    }

    /// Forget the lock for `definition_id` once no other writer holds or awaits it
    async fn release_lock(&self, definition_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.write_locks.lock().await;
        let idle = locks
            .get(definition_id)
            .is_some_and(|current| Arc::ptr_eq(current, &lock) && Arc::strong_count(&lock) == 2);
        if idle {
            locks.remove(definition_id);
        }
    }

    async fn apply_locked(
        &self,
        definition_id: &str,
        edit: HistoryEdit,
        gate: &CommitGate,
    ) -> Result<EditOutcome, DefinitionError> {
        let mut tx = self.pool.begin_with(BEGIN_WRITE).await?;
        let mut history = load_history(&mut *tx, definition_id).await?;
        let stored: HashMap<u32, DefinitionVersion> = history
            .versions()
            .iter()
            .map(|v| (v.version, v.clone()))
            .collect();

        let outcome = edit(&mut history)?;
        history.check_invariants()?;
        if !outcome.changed {
            return Ok(outcome);
        }

        let mut kept = HashSet::new();
        for record in history.versions() {
            kept.insert(record.version);
            match stored.get(&record.version) {
                None => insert_version(&mut *tx, record).await?,
                Some(previous) if previous != record => update_version(&mut *tx, record).await?,
                Some(_) => {}
            }
        }
        if stored.keys().any(|v| !kept.contains(v)) {
            return Err(DefinitionError::InternalConsistency {
                definition_id: definition_id.to_string(),
                detail: "edit dropped stored versions".to_string(),
            });
        }

        // Past the gate the commit runs to completion; dropping `tx` before
        // this point rolls everything back
        gate.enter_commit()?;
        tx.commit().await?;
        Ok(outcome)
    }

    async fn delete_locked(&self, definition_id: &str) -> Result<bool, DefinitionError> {
        let mut tx = self.pool.begin_with(BEGIN_WRITE).await?;

        let high_water: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(version) FROM workflow_definition_versions WHERE definition_id = ?",
        )
        .bind(definition_id)
        .fetch_one(&mut *tx)
        .await?;
        let Some(high_water) = high_water else {
            return Ok(false);
        };

        sqlx::query(
            r#"
            INSERT INTO workflow_definition_counters (definition_id, retired_max)
            VALUES (?, ?)
            ON CONFLICT(definition_id) DO UPDATE
            SET retired_max = MAX(workflow_definition_counters.retired_max, excluded.retired_max)
            "#,
        )
        .bind(definition_id)
        .bind(high_water)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM workflow_definition_versions WHERE definition_id = ?")
            .bind(definition_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(
            definition_id,
            high_water,
            "🗑️ Deleted definition ({} versions)",
            result.rows_affected()
        );
        Ok(true)
    }

    #[cfg(test)]
    async fn lock_count(&self) -> usize {
        self.write_locks.lock().await.len()
    }
}

async fn load_history(
    conn: &mut SqliteConnection,
    definition_id: &str,
) -> Result<VersionHistory, DefinitionError> {
    let rows = sqlx::query(
        r#"
        SELECT definition_id, version, status, is_latest, representation_kind, payload, created_at
        FROM workflow_definition_versions
        WHERE definition_id = ?
        ORDER BY version ASC
        "#,
    )
    .bind(definition_id)
    .fetch_all(&mut *conn)
    .await?;

    let versions = rows
        .iter()
        .map(decode_row)
        .collect::<Result<Vec<_>, _>>()?;

    let retired_max: Option<i64> = sqlx::query_scalar(
        "SELECT retired_max FROM workflow_definition_counters WHERE definition_id = ?",
    )
    .bind(definition_id)
    .fetch_optional(&mut *conn)
    .await?;
    let retired_max = u32::try_from(retired_max.unwrap_or(0)).map_err(|_| DefinitionError::InternalConsistency {
        definition_id: definition_id.to_string(),
        detail: "invalid retired version counter".to_string(),
    })?;

    Ok(VersionHistory::from_versions(definition_id, versions).with_retired_max(retired_max))
}

fn decode_row(row: &SqliteRow) -> Result<DefinitionVersion, DefinitionError> {
    let definition_id: String = row.try_get("definition_id")?;
    let corrupt = |detail: String| DefinitionError::InternalConsistency {
        definition_id: definition_id.clone(),
        detail,
    };

    let version: i64 = row.try_get("version")?;
    let version = u32::try_from(version).map_err(|_| corrupt(format!("invalid version number {version}")))?;

    let status: String = row.try_get("status")?;
    let status = VersionStatus::parse(&status)
        .ok_or_else(|| corrupt(format!("unknown status '{status}' on version {version}")))?;

    let created_at: String = row.try_get("created_at")?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| corrupt(format!("bad timestamp on version {version}: {e}")))?;

    Ok(DefinitionVersion {
        definition_id: definition_id.clone(),
        version,
        representation: Representation {
            kind: row.try_get("representation_kind")?,
            payload: row.try_get("payload")?,
        },
        status,
        created_at,
        is_latest: row.try_get("is_latest")?,
    })
}

async fn insert_version(
    conn: &mut SqliteConnection,
    record: &DefinitionVersion,
) -> Result<(), DefinitionError> {
    let result = sqlx::query(
        r#"
        INSERT INTO workflow_definition_versions
            (definition_id, version, status, is_latest, representation_kind, payload, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.definition_id)
    .bind(i64::from(record.version))
    .bind(record.status.as_str())
    .bind(record.is_latest)
    .bind(&record.representation.kind)
    .bind(&record.representation.payload)
    .bind(record.created_at.to_rfc3339())
    .execute(&mut *conn)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            tracing::error!(
                definition_id = %record.definition_id,
                version = record.version,
                "version number collision"
            );
            Err(DefinitionError::InternalConsistency {
                definition_id: record.definition_id.clone(),
                detail: format!("version {} already exists", record.version),
            })
        }
        Err(e) => Err(e.into()),
    }
}

async fn update_version(
    conn: &mut SqliteConnection,
    record: &DefinitionVersion,
) -> Result<(), DefinitionError> {
    sqlx::query(
        r#"
        UPDATE workflow_definition_versions
        SET status = ?, is_latest = ?
        WHERE definition_id = ? AND version = ?
        "#,
    )
    .bind(record.status.as_str())
    .bind(record.is_latest)
    .bind(&record.definition_id)
    .bind(i64::from(record.version))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[async_trait]
impl DefinitionStore for SqliteDefinitionStore {
    async fn apply_within(
        &self,
        definition_id: &str,
        edit: HistoryEdit,
        gate: &CommitGate,
    ) -> Result<EditOutcome, DefinitionError> {
        let lock = self.write_lock(definition_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.apply_locked(definition_id, edit, gate).await
        };
        self.release_lock(definition_id, lock).await;
        result
    }

    async fn history(&self, definition_id: &str) -> Result<Option<VersionHistory>, DefinitionError> {
        let mut conn = self.pool.acquire().await?;
        let history = load_history(&mut conn, definition_id).await?;
        Ok((!history.is_empty()).then_some(history))
    }

    async fn delete(&self, definition_id: &str) -> Result<bool, DefinitionError> {
        let lock = self.write_lock(definition_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.delete_locked(definition_id).await
        };
        self.release_lock(definition_id, lock).await;
        result
    }

    async fn list_definition_ids(&self) -> Result<Vec<String>, DefinitionError> {
        let rows = sqlx::query(
            "SELECT DISTINCT definition_id FROM workflow_definition_versions ORDER BY definition_id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get("definition_id").map_err(DefinitionError::from))
            .collect()
    }
}
