//! StoreActor - namespaced key-value persistence over SQLite.
//!
//! Backs the App Registry ({name -> launchUrl, iconRef} rows), the guest
//! storage accessors, the wallpaper accessors, and the best-effort app cache.
//! Supports both file-based and in-memory databases; the in-memory variant is
//! used by tests.

use async_trait::async_trait;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use rusqlite::{params, Connection, OptionalExtension};

/// Namespace for persisted App Registry entries.
pub const NS_APPS: &str = "apps";
/// Namespace for best-effort cached app assets.
pub const NS_CACHE: &str = "cache";
/// Namespace for the guest storage accessors.
pub const NS_STORAGE: &str = "storage";
/// Namespace for the wallpaper accessors.
pub const NS_WALLPAPER: &str = "wallpaper";

/// Actor that owns the SQLite connection.
#[derive(Debug, Default)]
pub struct StoreActor;

/// Arguments for spawning StoreActor.
#[derive(Debug, Clone)]
pub enum StoreArguments {
    /// File-based database path.
    File(String),
    /// In-memory database (for testing).
    InMemory,
}

pub struct StoreState {
    conn: Connection,
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug)]
pub enum StoreMsg {
    Put {
        namespace: String,
        key: String,
        value: serde_json::Value,
        reply: RpcReplyPort<Result<(), StoreError>>,
    },
    Get {
        namespace: String,
        key: String,
        reply: RpcReplyPort<Result<Option<serde_json::Value>, StoreError>>,
    },
    Delete {
        namespace: String,
        key: String,
        reply: RpcReplyPort<Result<(), StoreError>>,
    },
    /// All rows in one namespace, key-ordered.
    GetNamespace {
        namespace: String,
        reply: RpcReplyPort<Result<Vec<(String, serde_json::Value)>, StoreError>>,
    },
    /// Purge an entire namespace (cache companion of uninstall).
    DeleteNamespace {
        namespace: String,
        reply: RpcReplyPort<Result<usize, StoreError>>,
    },
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error, Clone)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

// ============================================================================
// Actor Implementation
// ============================================================================

impl StoreActor {
    fn open(args: &StoreArguments) -> Result<Connection, StoreError> {
        let conn = match args {
            StoreArguments::File(path) => {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    std::fs::create_dir_all(parent).ok();
                }
                tracing::info!(database_path = %path, "Opening file-based store");
                Connection::open(path)?
            }
            StoreArguments::InMemory => {
                tracing::info!("Opening in-memory store");
                Connection::open_in_memory()?
            }
        };

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (namespace, key)
            )
            "#,
            [],
        )?;

        Ok(conn)
    }

    fn handle_put(
        &self,
        namespace: &str,
        key: &str,
        value: &serde_json::Value,
        state: &StoreState,
    ) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)?;
        state.conn.execute(
            r#"
            INSERT INTO kv (namespace, key, value, updated_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            ON CONFLICT (namespace, key) DO UPDATE
            SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![namespace, key, raw],
        )?;
        Ok(())
    }

    fn handle_get(
        &self,
        namespace: &str,
        key: &str,
        state: &StoreState,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        let raw: Option<String> = state
            .conn
            .query_row(
                "SELECT value FROM kv WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn handle_delete(
        &self,
        namespace: &str,
        key: &str,
        state: &StoreState,
    ) -> Result<(), StoreError> {
        state.conn.execute(
            "DELETE FROM kv WHERE namespace = ?1 AND key = ?2",
            params![namespace, key],
        )?;
        Ok(())
    }

    fn handle_get_namespace(
        &self,
        namespace: &str,
        state: &StoreState,
    ) -> Result<Vec<(String, serde_json::Value)>, StoreError> {
        let mut stmt = state
            .conn
            .prepare("SELECT key, value FROM kv WHERE namespace = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![namespace], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (key, raw) = row?;
            entries.push((key, serde_json::from_str(&raw)?));
        }
        Ok(entries)
    }

    fn handle_delete_namespace(
        &self,
        namespace: &str,
        state: &StoreState,
    ) -> Result<usize, StoreError> {
        let removed = state.conn.execute(
            "DELETE FROM kv WHERE namespace = ?1",
            params![namespace],
        )?;
        Ok(removed)
    }
}

#[async_trait]
impl Actor for StoreActor {
    type Msg = StoreMsg;
    type State = StoreState;
    type Arguments = StoreArguments;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(actor_id = %myself.get_id(), "StoreActor starting");
        let conn = Self::open(&args)
            .map_err(|e| ActorProcessingErr::from(format!("Failed to open store: {e}")))?;
        Ok(StoreState { conn })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            StoreMsg::Put {
                namespace,
                key,
                value,
                reply,
            } => {
                let _ = reply.send(self.handle_put(&namespace, &key, &value, state));
            }
            StoreMsg::Get {
                namespace,
                key,
                reply,
            } => {
                let _ = reply.send(self.handle_get(&namespace, &key, state));
            }
            StoreMsg::Delete {
                namespace,
                key,
                reply,
            } => {
                let _ = reply.send(self.handle_delete(&namespace, &key, state));
            }
            StoreMsg::GetNamespace { namespace, reply } => {
                let _ = reply.send(self.handle_get_namespace(&namespace, state));
            }
            StoreMsg::DeleteNamespace { namespace, reply } => {
                let _ = reply.send(self.handle_delete_namespace(&namespace, state));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Convenience function to store a value.
pub async fn put(
    store: &ActorRef<StoreMsg>,
    namespace: impl Into<String>,
    key: impl Into<String>,
    value: serde_json::Value,
) -> Result<Result<(), StoreError>, ractor::RactorErr<StoreMsg>> {
    ractor::call!(store, |reply| StoreMsg::Put {
        namespace: namespace.into(),
        key: key.into(),
        value,
        reply,
    })
}

/// Convenience function to fetch a value.
pub async fn get(
    store: &ActorRef<StoreMsg>,
    namespace: impl Into<String>,
    key: impl Into<String>,
) -> Result<Result<Option<serde_json::Value>, StoreError>, ractor::RactorErr<StoreMsg>> {
    ractor::call!(store, |reply| StoreMsg::Get {
        namespace: namespace.into(),
        key: key.into(),
        reply,
    })
}

// ============================================================================
// Tests
// ============================================================================
