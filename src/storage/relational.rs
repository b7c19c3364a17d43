//! Relational store (spec.md §6, §4.6): `rusqlite`-backed persistence for
//! chunks, type snapshots, fuzzy identifiers, and domain documents, plus
//! the ordered, reversible schema-migration machinery. Grounded on the
//! persistence *pattern* of the teacher's `storage::persistence`
//! (save-never-update rows) and `semantic::pool` (small write-through
//! cache), generalized to the snapshot-store concept this crate adds.

use std::path::Path;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use rusqlite::{params, Connection};

use crate::error::StoreError;
use crate::semantic::{TypeSnapshot, TypingEntry};
use crate::types::{FileId, SnapshotId};

/// One ordered, reversible migration pair (spec.md §6: `NNN_*.up.sql` /
/// `NNN_*.down.sql`), applied inside a transaction.
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub up: &'static str,
    pub down: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "init_schema",
    up: r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS chunks (
            chunk_id TEXT PRIMARY KEY,
            repo_id TEXT NOT NULL,
            snapshot_id TEXT NOT NULL,
            file_path TEXT NOT NULL,
            kind TEXT NOT NULL,
            content TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            metadata TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS type_snapshots (
            snapshot_id TEXT PRIMARY KEY,
            repo_id TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            data TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS fuzzy_identifiers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            repo_id TEXT NOT NULL,
            snapshot_id TEXT NOT NULL,
            chunk_id TEXT NOT NULL,
            identifier TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS domain_documents (
            chunk_id TEXT PRIMARY KEY,
            repo_id TEXT NOT NULL,
            snapshot_id TEXT NOT NULL,
            doc_type TEXT,
            content TEXT NOT NULL
        );
    "#,
    down: r#"
        DROP TABLE IF EXISTS domain_documents;
        DROP TABLE IF EXISTS fuzzy_identifiers;
        DROP TABLE IF EXISTS type_snapshots;
        DROP TABLE IF EXISTS chunks;
        DROP TABLE IF EXISTS schema_migrations;
    "#,
}];

pub struct RelationalStore {
    conn: Mutex<Connection>,
}

impl RelationalStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Sqlite { operation: "open", source: e })?;
        let store = Self { conn: Mutex::new(conn) };
        store.migrate_up()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Sqlite { operation: "open", source: e })?;
        let store = Self { conn: Mutex::new(conn) };
        store.migrate_up()?;
        Ok(store)
    }

    fn applied_versions(conn: &Connection) -> Vec<i64> {
        conn.prepare("SELECT version FROM schema_migrations ORDER BY version")
            .and_then(|mut stmt| {
                let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
                rows.collect::<Result<Vec<_>, _>>()
            })
            .unwrap_or_default()
    }

    pub fn migrate_up(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        // schema_migrations itself is created by migration 1; guard with
        // IF NOT EXISTS so this bootstrap query never fails on a fresh db.
        let _ = conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_migrations (version INTEGER PRIMARY KEY, name TEXT NOT NULL, applied_at INTEGER NOT NULL);",
        );
        let applied = Self::applied_versions(&conn);
        for migration in MIGRATIONS {
            if applied.contains(&migration.version) {
                continue;
            }
            let tx = conn.unchecked_transaction().map_err(|e| StoreError::Sqlite { operation: "begin_tx", source: e })?;
            tx.execute_batch(migration.up).map_err(|e| StoreError::Sqlite { operation: "migrate_up", source: e })?;
            tx.execute(
                "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, strftime('%s','now'))",
                params![migration.version, migration.name],
            )
            .map_err(|e| StoreError::Sqlite { operation: "record_migration", source: e })?;
            tx.commit().map_err(|e| StoreError::Sqlite { operation: "commit_tx", source: e })?;
        }
        Ok(())
    }

    pub fn migrate_down(&self, to_version: i64) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let mut applied = Self::applied_versions(&conn);
        applied.sort_unstable_by(|a, b| b.cmp(a));
        for version in applied {
            if version <= to_version {
                break;
            }
            let Some(migration) = MIGRATIONS.iter().find(|m| m.version == version) else { continue };
            let tx = conn.unchecked_transaction().map_err(|e| StoreError::Sqlite { operation: "begin_tx", source: e })?;
            tx.execute_batch(migration.down).map_err(|e| StoreError::Sqlite { operation: "migrate_down", source: e })?;
            tx.execute("DELETE FROM schema_migrations WHERE version = ?1", params![version])
                .map_err(|e| StoreError::Sqlite { operation: "unrecord_migration", source: e })?;
            tx.commit().map_err(|e| StoreError::Sqlite { operation: "commit_tx", source: e })?;
        }
        Ok(())
    }

    pub fn migration_status(&self) -> Vec<(i64, String)> {
        let conn = self.conn.lock();
        conn.prepare("SELECT version, name FROM schema_migrations ORDER BY version")
            .and_then(|mut stmt| {
                let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;
                rows.collect::<Result<Vec<_>, _>>()
            })
            .unwrap_or_default()
    }
}

/// Persists `TypeSnapshot`s (spec.md §4.6): insert-only, plus the latest
/// newest-by-timestamp lookup, backed by a small write-through cache.
pub struct TypeSnapshotStore {
    store: Arc<RelationalStore>,
    cache: Mutex<LruCache<String, TypeSnapshot>>,
}

impl TypeSnapshotStore {
    pub fn new(store: Arc<RelationalStore>) -> Self {
        let cap = std::num::NonZeroUsize::new(64).expect("64 is non-zero");
        Self { store, cache: Mutex::new(LruCache::new(cap)) }
    }

    fn latest_key(repo_id: &str) -> String {
        format!("{repo_id}:latest")
    }

    fn id_key(snapshot_id: SnapshotId) -> String {
        snapshot_id.to_string()
    }

    pub fn save(&self, snapshot: &TypeSnapshot) -> Result<(), StoreError> {
        let data = serde_json::json!({
            "snapshot_id": snapshot.snapshot_id.to_string(),
            "repo_id": snapshot.repo_id,
            "files": snapshot.files,
            "typing_info": snapshot.typing_info.iter().map(|e| serde_json::json!({
                "file_id": e.file_id.value(),
                "span": { "sl": e.span.start_line, "sc": e.span.start_col, "el": e.span.end_line, "ec": e.span.end_col },
                "type": e.type_str,
            })).collect::<Vec<_>>(),
        });
        let conn = self.store.conn.lock();
        conn.execute(
            "INSERT INTO type_snapshots (snapshot_id, repo_id, timestamp, data) VALUES (?1, ?2, ?3, ?4)",
            params![snapshot.snapshot_id.to_string(), snapshot.repo_id, snapshot.timestamp, data.to_string()],
        )
        .map_err(|e| StoreError::Sqlite { operation: "insert_type_snapshot", source: e })?;
        drop(conn);

        let mut cache = self.cache.lock();
        cache.put(Self::latest_key(&snapshot.repo_id), snapshot.clone());
        cache.put(Self::id_key(snapshot.snapshot_id), snapshot.clone());
        Ok(())
    }

    fn row_to_snapshot(data: &str) -> Option<TypeSnapshot> {
        let value: serde_json::Value = serde_json::from_str(data).ok()?;
        let snapshot_id = SnapshotId::from_uuid(value.get("snapshot_id")?.as_str()?.parse().ok()?);
        let repo_id = value.get("repo_id")?.as_str()?.to_string();
        let files = value
            .get("files")?
            .as_array()?
            .iter()
            .filter_map(|f| f.as_str().map(str::to_string))
            .collect();
        let typing_info = value
            .get("typing_info")?
            .as_array()?
            .iter()
            .filter_map(|entry| {
                let file_id = FileId::new(entry.get("file_id")?.as_u64()? as u32)?;
                let span = entry.get("span")?;
                let sl = span.get("sl")?.as_u64()? as u32;
                let sc = span.get("sc")?.as_u64()? as u32;
                let el = span.get("el")?.as_u64()? as u32;
                let ec = span.get("ec")?.as_u64()? as u32;
                let type_str = entry.get("type")?.as_str()?.to_string();
                Some(TypingEntry { file_id, span: crate::types::Span::new(file_id, sl, sc, el, ec), type_str })
            })
            .collect();
        Some(TypeSnapshot { snapshot_id, repo_id, timestamp: 0, files, typing_info })
    }

    pub fn load_latest(&self, repo_id: &str) -> Result<Option<TypeSnapshot>, StoreError> {
        if let Some(hit) = self.cache.lock().get(&Self::latest_key(repo_id)).cloned() {
            return Ok(Some(hit));
        }
        let conn = self.store.conn.lock();
        let result: rusqlite::Result<(String, i64)> = conn.query_row(
            "SELECT data, timestamp FROM type_snapshots WHERE repo_id = ?1 ORDER BY timestamp DESC LIMIT 1",
            params![repo_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        );
        match result {
            Ok((data, timestamp)) => {
                let mut snap = Self::row_to_snapshot(&data);
                if let Some(s) = snap.as_mut() {
                    s.timestamp = timestamp;
                }
                Ok(snap)
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Sqlite { operation: "load_latest", source: e }),
        }
    }

    pub fn load_by_id(&self, snapshot_id: SnapshotId) -> Result<Option<TypeSnapshot>, StoreError> {
        if let Some(hit) = self.cache.lock().get(&Self::id_key(snapshot_id)).cloned() {
            return Ok(Some(hit));
        }
        let conn = self.store.conn.lock();
        let result: rusqlite::Result<(String, i64)> = conn.query_row(
            "SELECT data, timestamp FROM type_snapshots WHERE snapshot_id = ?1",
            params![snapshot_id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        );
        match result {
            Ok((data, timestamp)) => {
                let mut snap = Self::row_to_snapshot(&data);
                if let Some(s) = snap.as_mut() {
                    s.timestamp = timestamp;
                }
                Ok(snap)
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Sqlite { operation: "load_by_id", source: e }),
        }
    }

    pub fn list(&self, repo_id: &str, limit: usize) -> Result<Vec<TypeSnapshot>, StoreError> {
        let conn = self.store.conn.lock();
        let mut stmt = conn
            .prepare("SELECT data, timestamp FROM type_snapshots WHERE repo_id = ?1 ORDER BY timestamp DESC LIMIT ?2")
            .map_err(|e| StoreError::Sqlite { operation: "list_prepare", source: e })?;
        let rows = stmt
            .query_map(params![repo_id, limit as i64], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(|e| StoreError::Sqlite { operation: "list_query", source: e })?;
        let mut out = Vec::new();
        for row in rows {
            let (data, timestamp) = row.map_err(|e| StoreError::Sqlite { operation: "list_row", source: e })?;
            if let Some(mut snap) = Self::row_to_snapshot(&data) {
                snap.timestamp = timestamp;
                out.push(snap);
            }
        }
        Ok(out)
    }

    /// Keeps only the newest `keep_count` snapshots for `repo_id`; clears
    /// the cache, matching spec.md §4.6's "clears on `delete_old`".
    pub fn delete_old(&self, repo_id: &str, keep_count: usize) -> Result<usize, StoreError> {
        let conn = self.store.conn.lock();
        let deleted = conn
            .execute(
                "DELETE FROM type_snapshots WHERE repo_id = ?1 AND snapshot_id NOT IN (
                    SELECT snapshot_id FROM type_snapshots WHERE repo_id = ?1 ORDER BY timestamp DESC LIMIT ?2
                )",
                params![repo_id, keep_count as i64],
            )
            .map_err(|e| StoreError::Sqlite { operation: "delete_old", source: e })?;
        drop(conn);
        self.cache.lock().clear();
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_apply_and_record_version() {
        let store = RelationalStore::open_in_memory().unwrap();
        let status = store.migration_status();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].0, 1);
    }

    #[test]
    fn save_then_load_latest_round_trips() {
        let store = Arc::new(RelationalStore::open_in_memory().unwrap());
        let snapshots = TypeSnapshotStore::new(store);
        let snap = TypeSnapshot::new(SnapshotId::new(), "repo", 100, vec!["a.py".into()]);
        snapshots.save(&snap).unwrap();
        let loaded = snapshots.load_latest("repo").unwrap().unwrap();
        assert_eq!(loaded.snapshot_id, snap.snapshot_id);
    }

    #[test]
    fn delete_old_keeps_only_newest() {
        let store = Arc::new(RelationalStore::open_in_memory().unwrap());
        let snapshots = TypeSnapshotStore::new(store);
        for ts in 1..=3 {
            let snap = TypeSnapshot::new(SnapshotId::new(), "repo", ts, vec![]);
            snapshots.save(&snap).unwrap();
        }
        let deleted = snapshots.delete_old("repo", 1).unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(snapshots.list("repo", 10).unwrap().len(), 1);
    }
}
