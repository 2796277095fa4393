//! Relational session store.
//!
//! Session metadata, conversation turns, and per-transport checkpoints all
//! live in one embedded SQLite database under the configured data root. A
//! turn append and its usage-counter update commit in a single transaction,
//! so the invariant "sum of tokens in history == usage counters" holds by
//! construction rather than by convention.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use eda_domain::error::{Error, Result};
use eda_domain::tool::Message;
use eda_domain::trace::TraceEvent;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

/// A single design-project session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub name: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
}

/// One role-tagged entry in a session's conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub seq: i64,
    pub session_id: String,
    pub message: Message,
    pub created_at: DateTime<Utc>,
}

/// Relational store for sessions, turns, and transport checkpoints.
///
/// `rusqlite::Connection` is not `Sync`; a single mutex-guarded connection
/// is sufficient here since every session write is already expected to be
/// serialized by the caller's per-session lock (see the gateway's
/// `SessionLockMap`) and SQLite itself serializes writers.
pub struct SessionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SessionStore {
    /// Open (or create) the session database at `db_path`, creating the
    /// schema if absent.
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::Io)?;
        }
        let conn = Connection::open(db_path)
            .map_err(|e| Error::PersistenceError(format!("opening session db: {e}")))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| Error::PersistenceError(format!("creating schema: {e}")))?;

        tracing::info!(path = %db_path.display(), "session store opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store, for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::PersistenceError(format!("opening in-memory db: {e}")))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| Error::PersistenceError(format!("creating schema: {e}")))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create a new session. Errors with `SessionConflict` if the id exists.
    pub fn create(&self, id: &str, name: &str, model: &str) -> Result<Session> {
        let now = Utc::now();
        let conn = self.conn.lock();
        let existing: Option<String> = conn
            .query_row(
                "SELECT id FROM sessions WHERE id = ?1",
                params![id],
                |r| r.get(0),
            )
            .optional()
            .map_err(|e| Error::PersistenceError(e.to_string()))?;
        if existing.is_some() {
            return Err(Error::SessionConflict(format!(
                "session \"{id}\" already exists"
            )));
        }
        conn.execute(
            "INSERT INTO sessions (id, name, model, created_at, updated_at, input_tokens, output_tokens, cost_usd)
             VALUES (?1, ?2, ?3, ?4, ?4, 0, 0, 0.0)",
            params![id, name, model, now.to_rfc3339()],
        )
        .map_err(|e| Error::PersistenceError(e.to_string()))?;

        TraceEvent::SessionResolved {
            session_id: id.to_owned(),
            is_new: true,
        }
        .emit();

        Ok(Session {
            id: id.to_owned(),
            name: name.to_owned(),
            model: model.to_owned(),
            created_at: now,
            updated_at: now,
            input_tokens: 0,
            output_tokens: 0,
            cost_usd: 0.0,
        })
    }

    /// Resolve a session, creating it with default model/name if absent.
    /// Returns `(session, is_new)`.
    pub fn resolve_or_create(&self, id: &str, default_model: &str) -> Result<(Session, bool)> {
        if let Some(existing) = self.open(id)? {
            return Ok((existing, false));
        }
        let created = self.create(id, id, default_model)?;
        Ok((created, true))
    }

    pub fn open(&self, id: &str) -> Result<Option<Session>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT id, name, model, created_at, updated_at, input_tokens, output_tokens, cost_usd
                 FROM sessions WHERE id = ?1",
                params![id],
                row_to_session,
            )
            .optional()
            .map_err(|e| Error::PersistenceError(e.to_string()))?;
        Ok(row)
    }

    pub fn list(&self) -> Result<Vec<Session>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, name, model, created_at, updated_at, input_tokens, output_tokens, cost_usd
                 FROM sessions ORDER BY updated_at DESC",
            )
            .map_err(|e| Error::PersistenceError(e.to_string()))?;
        let rows = stmt
            .query_map([], row_to_session)
            .map_err(|e| Error::PersistenceError(e.to_string()))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r.map_err(|e| Error::PersistenceError(e.to_string()))?);
        }
        Ok(out)
    }

    /// Delete a session and its turns/checkpoints. Caller is responsible
    /// for refusing deletion while the session is marked active anywhere.
    pub fn delete(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock();
        let affected = conn
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])
            .map_err(|e| Error::PersistenceError(e.to_string()))?;
        if affected == 0 {
            return Err(Error::SessionNotFound(id.to_owned()));
        }
        conn.execute("DELETE FROM turns WHERE session_id = ?1", params![id])
            .map_err(|e| Error::PersistenceError(e.to_string()))?;
        conn.execute("DELETE FROM checkpoints WHERE session_id = ?1", params![id])
            .map_err(|e| Error::PersistenceError(e.to_string()))?;
        Ok(())
    }

    /// Append one turn and add to the usage counters in a single
    /// transaction. Either both persist or neither does.
    pub fn append_turn(
        &self,
        session_id: &str,
        message: &Message,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::PersistenceError(e.to_string()))?;

        let now = Utc::now();
        let body = serde_json::to_string(message).map_err(Error::Json)?;
        let role = role_tag(message);

        tx.execute(
            "INSERT INTO turns (session_id, role, body, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![session_id, role, body, now.to_rfc3339()],
        )
        .map_err(|e| Error::PersistenceError(e.to_string()))?;

        let affected = tx
            .execute(
                "UPDATE sessions SET input_tokens = input_tokens + ?1,
                                      output_tokens = output_tokens + ?2,
                                      updated_at = ?3
                 WHERE id = ?4",
                params![
                    input_tokens as i64,
                    output_tokens as i64,
                    now.to_rfc3339(),
                    session_id
                ],
            )
            .map_err(|e| Error::PersistenceError(e.to_string()))?;
        if affected == 0 {
            return Err(Error::SessionNotFound(session_id.to_owned()));
        }

        tx.commit()
            .map_err(|e| Error::PersistenceError(e.to_string()))?;

        TraceEvent::TurnAppended {
            session_id: session_id.to_owned(),
            role: role.to_owned(),
        }
        .emit();

        Ok(())
    }

    pub fn history(&self, session_id: &str) -> Result<Vec<Turn>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT rowid, session_id, body, created_at FROM turns
                 WHERE session_id = ?1 ORDER BY rowid ASC",
            )
            .map_err(|e| Error::PersistenceError(e.to_string()))?;
        let rows = stmt
            .query_map(params![session_id], |r| {
                let seq: i64 = r.get(0)?;
                let session_id: String = r.get(1)?;
                let body: String = r.get(2)?;
                let created_at: String = r.get(3)?;
                Ok((seq, session_id, body, created_at))
            })
            .map_err(|e| Error::PersistenceError(e.to_string()))?;

        let mut out = Vec::new();
        for row in rows {
            let (seq, session_id, body, created_at) =
                row.map_err(|e| Error::PersistenceError(e.to_string()))?;
            let message: Message = serde_json::from_str(&body).map_err(Error::Json)?;
            let created_at = DateTime::parse_from_rfc3339(&created_at)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| Error::PersistenceError(e.to_string()))?;
            out.push(Turn {
                seq,
                session_id,
                message,
                created_at,
            });
        }
        Ok(out)
    }

    pub fn touch(&self, session_id: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE sessions SET updated_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), session_id],
        )
        .map_err(|e| Error::PersistenceError(e.to_string()))?;
        Ok(())
    }

    pub fn record_cost(&self, session_id: &str, cost_usd: f64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE sessions SET cost_usd = cost_usd + ?1 WHERE id = ?2",
            params![cost_usd, session_id],
        )
        .map_err(|e| Error::PersistenceError(e.to_string()))?;
        Ok(())
    }

    /// Persist a transport's serialized agent-loop checkpoint.
    pub fn save_checkpoint(&self, session_id: &str, transport: &str, blob: &[u8]) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO checkpoints (session_id, transport, blob, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(session_id, transport) DO UPDATE SET blob = excluded.blob, updated_at = excluded.updated_at",
            params![session_id, transport, blob, Utc::now().to_rfc3339()],
        )
        .map_err(|e| Error::PersistenceError(e.to_string()))?;
        Ok(())
    }

    pub fn load_checkpoint(&self, session_id: &str, transport: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.conn.lock();
        let blob = conn
            .query_row(
                "SELECT blob FROM checkpoints WHERE session_id = ?1 AND transport = ?2",
                params![session_id, transport],
                |r| r.get::<_, Vec<u8>>(0),
            )
            .optional()
            .map_err(|e| Error::PersistenceError(e.to_string()))?;
        Ok(blob)
    }
}

fn role_tag(message: &Message) -> &'static str {
    use eda_domain::tool::Role;
    match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn row_to_session(r: &rusqlite::Row) -> rusqlite::Result<Session> {
    let created_at: String = r.get(3)?;
    let updated_at: String = r.get(4)?;
    Ok(Session {
        id: r.get(0)?,
        name: r.get(1)?,
        model: r.get(2)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .unwrap()
            .with_timezone(&Utc),
        updated_at: DateTime::parse_from_rfc3339(&updated_at)
            .unwrap()
            .with_timezone(&Utc),
        input_tokens: r.get::<_, i64>(5)? as u64,
        output_tokens: r.get::<_, i64>(6)? as u64,
        cost_usd: r.get(7)?,
    })
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    model TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    input_tokens INTEGER NOT NULL DEFAULT 0,
    output_tokens INTEGER NOT NULL DEFAULT 0,
    cost_usd REAL NOT NULL DEFAULT 0.0
);
CREATE TABLE IF NOT EXISTS turns (
    session_id TEXT NOT NULL REFERENCES sessions(id),
    role TEXT NOT NULL,
    body TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_turns_session ON turns(session_id);
CREATE TABLE IF NOT EXISTS checkpoints (
    session_id TEXT NOT NULL REFERENCES sessions(id),
    transport TEXT NOT NULL,
    blob BLOB NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (session_id, transport)
);
";

#[cfg(test)]
mod tests {
    use super::*;
    use eda_domain::tool::Message;

    #[test]
    fn create_and_open_roundtrip() {
        let store = SessionStore::open_in_memory().unwrap();
        store.create("proj-1", "proj-1", "claude-sonnet-4-5").unwrap();
        let session = store.open("proj-1").unwrap().unwrap();
        assert_eq!(session.id, "proj-1");
        assert_eq!(session.input_tokens, 0);
    }

    #[test]
    fn duplicate_create_is_conflict() {
        let store = SessionStore::open_in_memory().unwrap();
        store.create("proj-1", "proj-1", "m").unwrap();
        let err = store.create("proj-1", "proj-1", "m").unwrap_err();
        assert!(matches!(err, Error::SessionConflict(_)));
    }

    #[test]
    fn create_delete_create_yields_empty_history() {
        let store = SessionStore::open_in_memory().unwrap();
        store.create("proj-1", "proj-1", "m").unwrap();
        store
            .append_turn("proj-1", &Message::user("hi"), 1, 0)
            .unwrap();
        store.delete("proj-1").unwrap();
        store.create("proj-1", "proj-1", "m").unwrap();
        assert!(store.history("proj-1").unwrap().is_empty());
    }

    #[test]
    fn append_turn_updates_usage_atomically() {
        let store = SessionStore::open_in_memory().unwrap();
        store.create("proj-1", "proj-1", "m").unwrap();
        store
            .append_turn("proj-1", &Message::user("hello"), 10, 0)
            .unwrap();
        store
            .append_turn("proj-1", &Message::assistant("hi there"), 0, 5)
            .unwrap();
        let session = store.open("proj-1").unwrap().unwrap();
        assert_eq!(session.input_tokens, 10);
        assert_eq!(session.output_tokens, 5);
        assert_eq!(store.history("proj-1").unwrap().len(), 2);
    }

    #[test]
    fn append_turn_missing_session_errors() {
        let store = SessionStore::open_in_memory().unwrap();
        let err = store
            .append_turn("ghost", &Message::user("hi"), 0, 0)
            .unwrap_err();
        assert!(matches!(err, Error::SessionNotFound(_)));
    }

    #[test]
    fn checkpoint_roundtrip() {
        let store = SessionStore::open_in_memory().unwrap();
        store.create("proj-1", "proj-1", "m").unwrap();
        store.save_checkpoint("proj-1", "chat", b"blob-1").unwrap();
        assert_eq!(
            store.load_checkpoint("proj-1", "chat").unwrap(),
            Some(b"blob-1".to_vec())
        );
        store.save_checkpoint("proj-1", "chat", b"blob-2").unwrap();
        assert_eq!(
            store.load_checkpoint("proj-1", "chat").unwrap(),
            Some(b"blob-2".to_vec())
        );
    }

    #[test]
    fn resolve_or_create_is_idempotent() {
        let store = SessionStore::open_in_memory().unwrap();
        let (s1, new1) = store.resolve_or_create("proj-1", "m").unwrap();
        let (s2, new2) = store.resolve_or_create("proj-1", "m").unwrap();
        assert!(new1);
        assert!(!new2);
        assert_eq!(s1.id, s2.id);
    }
}
