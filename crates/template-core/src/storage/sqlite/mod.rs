//! SQLite storage backend.
//!
//! Each template is one row keyed by `(owner, id)`. The full document lives
//! in `item_json`; status, type, lock number and ttl are mirrored into
//! columns for filtering and purge. Conditional writes run inside an
//! `IMMEDIATE` transaction so the read-evaluate-write sequence is atomic
//! across every connection to the same database file.

mod row;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use uuid::Uuid;

use crate::error::{Result, TemplateError};
use crate::storage::traits::{TemplateStore, WriteOutcome};
use crate::storage::types::{Template, TemplateKey};
use crate::storage::update::UpdateCommand;

use row::TemplateRow;

const SCHEMA_VERSION: &str = "1";

/// How long a writer waits for another process's transaction to finish.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed template store.
pub struct SqliteTemplateStore {
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

impl SqliteTemplateStore {
    /// Open (or create) a store at `path`.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError::Storage` if the file cannot be opened or the
    /// schema cannot be created.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            conn: Mutex::new(conn),
        })
    }

    /// Open a private in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            path: None,
            conn: Mutex::new(conn),
        })
    }

    /// Database file path, if the store is file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS templates (
                owner TEXT NOT NULL,
                id TEXT NOT NULL,
                template_type TEXT NOT NULL,
                template_status TEXT NOT NULL,
                lock_number INTEGER,
                ttl INTEGER,
                item_json TEXT NOT NULL,

                PRIMARY KEY (owner, id)
            );

            -- Secondary lookup: template id -> owner
            CREATE INDEX IF NOT EXISTS templates_id_idx ON templates(id);
            CREATE INDEX IF NOT EXISTS templates_ttl_idx ON templates(ttl)
                WHERE ttl IS NOT NULL;
            "#,
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO meta (key, value) VALUES ('schema_version', ?1)",
            [SCHEMA_VERSION],
        )?;
        Ok(())
    }

    /// Lock the database connection, returning an error if the mutex is poisoned.
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| TemplateError::Storage("SQLite connection poisoned".to_string()))
    }

    fn read_item(conn: &Connection, owner: &str, id: &Uuid) -> Result<Option<Template>> {
        let row = conn
            .query_row(
                "SELECT owner, id, item_json FROM templates WHERE owner = ?1 AND id = ?2",
                params![owner, id.to_string()],
                |row| {
                    Ok(TemplateRow {
                        owner: row.get(0)?,
                        id: row.get(1)?,
                        item_json: row.get(2)?,
                    })
                },
            )
            .optional()?;
        row.map(Template::try_from).transpose()
    }

    fn lock_column(template: &Template) -> Result<Option<i64>> {
        template
            .lock_number
            .map(|lock| {
                i64::try_from(lock)
                    .map_err(|_| TemplateError::Storage("Lock number out of range".to_string()))
            })
            .transpose()
    }
}

impl TemplateStore for SqliteTemplateStore {
    fn get_item(&self, key: &TemplateKey) -> Result<Option<Template>> {
        let conn = self.lock_conn()?;
        Self::read_item(&conn, &key.owner(), &key.template_id)
    }

    fn put_new(&self, template: &Template) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if Self::read_item(&tx, &template.owner, &template.id)?.is_some() {
            return Err(TemplateError::Storage(format!(
                "Template {} already exists",
                template.id
            )));
        }

        let item_json = serde_json::to_string(template)
            .map_err(|e| TemplateError::Storage(format!("Serialize template failed: {}", e)))?;
        tx.execute(
            "INSERT INTO templates (owner, id, template_type, template_status, lock_number, ttl, item_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                template.owner,
                template.id.to_string(),
                template.template_type().as_str(),
                template.template_status.as_str(),
                Self::lock_column(template)?,
                template.ttl,
                item_json,
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn conditional_update(&self, command: &UpdateCommand) -> Result<WriteOutcome> {
        let owner = command.key.owner();
        let id = command.key.template_id;

        let mut conn = self.lock_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let old = Self::read_item(&tx, &owner, &id)?;
        if !command.condition.evaluate(old.as_ref()) {
            return Ok(WriteOutcome::ConditionFailed { old });
        }
        let Some(current) = old else {
            return Ok(WriteOutcome::ConditionFailed { old: None });
        };

        let updated = command.apply(&current)?;
        let item_json = serde_json::to_string(&updated)
            .map_err(|e| TemplateError::Storage(format!("Serialize template failed: {}", e)))?;
        tx.execute(
            "UPDATE templates
             SET template_status = ?1, lock_number = ?2, ttl = ?3, item_json = ?4
             WHERE owner = ?5 AND id = ?6",
            params![
                updated.template_status.as_str(),
                Self::lock_column(&updated)?,
                updated.ttl,
                item_json,
                owner,
                id.to_string(),
            ],
        )?;

        tx.commit()?;
        Ok(WriteOutcome::Updated(updated))
    }

    fn owner_for_id(&self, id: &Uuid) -> Result<Option<String>> {
        let conn = self.lock_conn()?;
        let owner = conn
            .query_row(
                "SELECT owner FROM templates WHERE id = ?1 LIMIT 1",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(owner)
    }

    fn list_owner(&self, owner: &str) -> Result<Vec<Template>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare("SELECT owner, id, item_json FROM templates WHERE owner = ?1")?;
        let rows = stmt.query_map([owner], |row| {
            Ok(TemplateRow {
                owner: row.get(0)?,
                id: row.get(1)?,
                item_json: row.get(2)?,
            })
        })?;

        let mut templates = Vec::new();
        for row in rows {
            templates.push(Template::try_from(row?)?);
        }
        templates.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(templates)
    }

    fn purge_expired(&self, now: i64) -> Result<usize> {
        let conn = self.lock_conn()?;
        let removed = conn.execute(
            "DELETE FROM templates
             WHERE template_status = 'DELETED' AND ttl IS NOT NULL AND ttl <= ?1",
            [now],
        )?;
        Ok(removed)
    }
}
