// SPDX-License-Identifier: MIT

//! Per-thread checkpoints
//!
//! After every node the engine records the state and the node that would run
//! next, keyed by thread id. A later run on the same thread picks up from
//! there.

use crate::adk::error::{AutonomaisError, Result};
use crate::autonomais::workflow::state::WorkflowState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

/// Snapshot of a thread between two steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub state: WorkflowState,
    /// Node to run next; `None` once the run has finished
    pub next: Option<String>,
    /// Steps executed so far in the run that wrote this checkpoint
    pub step: usize,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(state: WorkflowState, next: Option<String>, step: usize) -> Self {
        Self {
            state,
            next,
            step,
            updated_at: Utc::now(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.next.is_none()
    }
}

/// Storage for checkpoints
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Store `checkpoint` as the latest one for `thread_id`
    async fn save(&self, thread_id: &str, checkpoint: &Checkpoint) -> Result<()>;

    /// Latest checkpoint for `thread_id`, if any
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>>;
}

/// Process-local checkpoints
#[derive(Clone, Default)]
pub struct MemoryCheckpointer {
    threads: Arc<RwLock<HashMap<String, Checkpoint>>>,
}

impl MemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for MemoryCheckpointer {
    async fn save(&self, thread_id: &str, checkpoint: &Checkpoint) -> Result<()> {
        let mut threads = self.threads.write().await;
        threads.insert(thread_id.to_string(), checkpoint.clone());
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let threads = self.threads.read().await;
        Ok(threads.get(thread_id).cloned())
    }
}

/// Checkpoints persisted in a SQLite database
pub struct SqliteCheckpointer {
    conn: Mutex<Connection>,
}

impl SqliteCheckpointer {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        log::info!("Opened checkpoint store at {}", path.as_ref().display());
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                thread_id   TEXT PRIMARY KEY,
                state       TEXT NOT NULL,
                next_node   TEXT,
                step        INTEGER NOT NULL,
                updated_at  TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AutonomaisError::Checkpoint("checkpoint store lock poisoned".to_string()))
    }
}

#[async_trait]
impl Checkpointer for SqliteCheckpointer {
    async fn save(&self, thread_id: &str, checkpoint: &Checkpoint) -> Result<()> {
        let state = serde_json::to_string(&checkpoint.state)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO checkpoints (thread_id, state, next_node, step, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(thread_id) DO UPDATE SET
                state = excluded.state,
                next_node = excluded.next_node,
                step = excluded.step,
                updated_at = excluded.updated_at",
            params![
                thread_id,
                state,
                checkpoint.next,
                checkpoint.step as i64,
                checkpoint.updated_at.to_rfc3339(),
            ],
        )?;
        log::debug!("Saved checkpoint for thread {} at step {}", thread_id, checkpoint.step);
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let row = {
            let conn = self.lock()?;
            conn.query_row(
                "SELECT state, next_node, step, updated_at FROM checkpoints WHERE thread_id = ?1",
                params![thread_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?
        };

        let Some((state, next, step, updated_at)) = row else {
            return Ok(None);
        };
        let updated_at = DateTime::parse_from_rfc3339(&updated_at)
            .map_err(|e| AutonomaisError::Checkpoint(format!("bad timestamp for {}: {}", thread_id, e)))?
            .with_timezone(&Utc);

        Ok(Some(Checkpoint {
            state: serde_json::from_str(&state)?,
            next,
            step: step as usize,
            updated_at,
        }))
    }
}
