//! libSQL implementation of the async `StateStore`.
//!
//! Supports local file and in-memory databases. Each backend instance is
//! bound to one governance context and owns exactly one row in
//! `governance_state`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::governance::state::{Capability, SystemStateSnapshot};
use crate::store::migrations;
use crate::store::traits::StateStore;

/// libSQL state store.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStateStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    context_id: String,
}

impl LibSqlStateStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path, context_id: impl Into<String>) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db, context_id.into())?;
        migrations::run_migrations(&store.conn).await?;
        info!(path = %path.display(), context = %store.context_id, "State store opened");
        Ok(store)
    }

    /// Create an in-memory database.
    pub async fn new_memory(context_id: impl Into<String>) -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let store = Self::from_database(db, context_id.into())?;
        migrations::run_migrations(&store.conn).await?;
        Ok(store)
    }

    fn from_database(db: LibSqlDatabase, context_id: String) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
            context_id,
        })
    }

    /// The governance context this store writes to.
    pub fn context_id(&self) -> &str {
        &self.context_id
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Map a `governance_state` row to a snapshot.
///
/// Column order: 0:trust_level, 1:thermal_state, 2:inference_mode,
/// 3:capabilities, 4:last_transition_at
fn row_to_snapshot(row: &libsql::Row) -> Result<SystemStateSnapshot, DatabaseError> {
    let text = |idx: i32| {
        row.get::<String>(idx)
            .map_err(|e| DatabaseError::Query(format!("governance_state column {idx}: {e}")))
    };

    let trust_level = text(0)?.parse().map_err(DatabaseError::Serialization)?;
    let thermal_state = text(1)?.parse().map_err(DatabaseError::Serialization)?;
    let inference_mode = text(2)?.parse().map_err(DatabaseError::Serialization)?;
    let capabilities: BTreeMap<String, Capability> = serde_json::from_str(&text(3)?)
        .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
    let last_transition_timestamp = parse_datetime(&text(4)?);

    Ok(SystemStateSnapshot {
        trust_level,
        thermal_state,
        inference_mode,
        capabilities,
        last_transition_timestamp,
    })
}

#[async_trait]
impl StateStore for LibSqlStateStore {
    async fn persist(&self, snapshot: SystemStateSnapshot) -> Result<(), DatabaseError> {
        let capabilities = serde_json::to_string(&snapshot.capabilities)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        self.conn
            .execute(
                "INSERT INTO governance_state (context_id, trust_level, thermal_state,
                    inference_mode, capabilities, last_transition_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (context_id) DO UPDATE SET
                    trust_level = excluded.trust_level,
                    thermal_state = excluded.thermal_state,
                    inference_mode = excluded.inference_mode,
                    capabilities = excluded.capabilities,
                    last_transition_at = excluded.last_transition_at,
                    updated_at = excluded.updated_at",
                params![
                    self.context_id.clone(),
                    snapshot.trust_level.as_str(),
                    snapshot.thermal_state.as_str(),
                    snapshot.inference_mode.as_str(),
                    capabilities,
                    snapshot.last_transition_timestamp.to_rfc3339(),
                    now,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("persist: {e}")))?;

        debug!(
            context = %self.context_id,
            trust = %snapshot.trust_level,
            thermal = %snapshot.thermal_state,
            mode = %snapshot.inference_mode,
            "Governance state persisted"
        );
        Ok(())
    }

    async fn load_latest(&self) -> Result<Option<SystemStateSnapshot>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT trust_level, thermal_state, inference_mode, capabilities, last_transition_at
                 FROM governance_state WHERE context_id = ?1",
                params![self.context_id.clone()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("load_latest: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_snapshot(&row).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("load_latest: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governance::state::{InferenceMode, ThermalState, TrustLevel};

    fn make_snapshot(trust: TrustLevel, thermal: ThermalState) -> SystemStateSnapshot {
        let mut caps = BTreeMap::new();
        caps.insert(
            "spam_detector".to_string(),
            Capability {
                name: "spam_detector".into(),
                enabled: true,
                requires_trust: TrustLevel::Seed,
                requires_explicit_opt_in: false,
            },
        );
        SystemStateSnapshot::new(trust, thermal, caps, Utc::now())
    }

    async fn row_count(store: &LibSqlStateStore) -> i64 {
        let mut rows = store
            .conn
            .query("SELECT COUNT(*) FROM governance_state", ())
            .await
            .unwrap();
        rows.next().await.unwrap().unwrap().get(0).unwrap()
    }

    #[tokio::test]
    async fn empty_store_has_no_state() {
        let store = LibSqlStateStore::new_memory("default").await.unwrap();
        assert!(store.load_latest().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn persist_and_load() {
        let store = LibSqlStateStore::new_memory("default").await.unwrap();
        let snap = make_snapshot(TrustLevel::Warden, ThermalState::Hot);
        store.persist(snap.clone()).await.unwrap();

        let loaded = store.load_latest().await.unwrap().unwrap();
        assert_eq!(loaded.trust_level, TrustLevel::Warden);
        assert_eq!(loaded.thermal_state, ThermalState::Hot);
        assert_eq!(loaded.inference_mode, InferenceMode::Heuristic);
        assert_eq!(loaded.capabilities, snap.capabilities);
        assert_eq!(
            loaded.last_transition_timestamp.timestamp_micros(),
            snap.last_transition_timestamp.timestamp_micros()
        );
    }

    #[tokio::test]
    async fn one_row_per_context() {
        let store = LibSqlStateStore::new_memory("default").await.unwrap();
        store
            .persist(make_snapshot(TrustLevel::Seed, ThermalState::Cool))
            .await
            .unwrap();
        store
            .persist(make_snapshot(TrustLevel::Peer, ThermalState::Critical))
            .await
            .unwrap();

        assert_eq!(row_count(&store).await, 1);
        let loaded = store.load_latest().await.unwrap().unwrap();
        assert_eq!(loaded.trust_level, TrustLevel::Peer);
        assert_eq!(loaded.inference_mode, InferenceMode::Sleep);
    }

    #[tokio::test]
    async fn contexts_share_a_file_without_clobbering() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("dir").join("tuda.db");

        {
            let a = LibSqlStateStore::new_local(&path, "alpha").await.unwrap();
            a.persist(make_snapshot(TrustLevel::Integrated, ThermalState::Cool))
                .await
                .unwrap();
        }
        assert!(path.exists());

        let b = LibSqlStateStore::new_local(&path, "beta").await.unwrap();
        assert!(b.load_latest().await.unwrap().is_none());
        b.persist(make_snapshot(TrustLevel::Seed, ThermalState::Warm))
            .await
            .unwrap();
        assert_eq!(row_count(&b).await, 2);
        drop(b);

        let a = LibSqlStateStore::new_local(&path, "alpha").await.unwrap();
        let loaded = a.load_latest().await.unwrap().unwrap();
        assert_eq!(loaded.trust_level, TrustLevel::Integrated);
    }

    #[test]
    fn parses_both_datetime_formats() {
        let rfc = parse_datetime("2026-03-01T12:00:00+00:00");
        let sqlite = parse_datetime("2026-03-01 12:00:00.000");
        assert_eq!(rfc, sqlite);
        assert_eq!(parse_datetime("garbage"), DateTime::<Utc>::MIN_UTC);
    }
}
