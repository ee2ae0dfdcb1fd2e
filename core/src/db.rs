use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::Local;
use rusqlite::{Connection, params};
use uuid::Uuid;

use crate::identity::User;
use crate::kv::KeyValueStore;

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS kv_entries (
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
                );

                PRAGMA user_version = 1;",
            )?;
        }

        if version < 2 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS accounts (
                    id TEXT PRIMARY KEY NOT NULL,
                    email TEXT NOT NULL UNIQUE,
                    name TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS session (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    user_id TEXT REFERENCES accounts(id),
                    updated_at TEXT NOT NULL
                );

                PRAGMA user_version = 2;",
            )?;
        }

        Ok(())
    }

    fn user_from_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
        })
    }

    // --- Key-value entries ---

    pub fn get_entry(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM kv_entries WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        if let Some(row) = rows.next()? {
            Ok(Some(row.get(0)?))
        } else {
            Ok(None)
        }
    }

    pub fn set_entry(&self, key: &str, value: &str) -> Result<()> {
        let now = Local::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO kv_entries (key, value, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now],
            )
            .with_context(|| format!("Failed to write '{key}'"))?;
        Ok(())
    }

    // --- Accounts ---

    pub fn create_account(&self, email: &str, name: Option<&str>) -> Result<User> {
        if self.find_account(email)?.is_some() {
            bail!("An account for '{email}' already exists");
        }
        let now = Local::now().to_rfc3339();
        let id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO accounts (id, email, name, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id, email, name, now],
        )?;
        self.get_account(&id)
    }

    pub fn get_account(&self, id: &str) -> Result<User> {
        self.conn
            .query_row(
                "SELECT id, email, name FROM accounts WHERE id = ?1",
                params![id],
                Self::user_from_row,
            )
            .context("Account not found")
    }

    pub fn find_account(&self, email: &str) -> Result<Option<User>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, email, name FROM accounts WHERE email = ?1")?;
        let mut rows = stmt.query(params![email])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::user_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    // --- Session ---

    /// Remember who is signed in; `None` records a sign-out.
    pub fn save_session(&self, user_id: Option<&str>) -> Result<()> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO session (id, user_id, updated_at) VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET user_id = excluded.user_id, updated_at = excluded.updated_at",
            params![user_id, now],
        )?;
        Ok(())
    }

    pub fn load_session(&self) -> Result<Option<User>> {
        let mut stmt = self.conn.prepare(
            "SELECT a.id, a.email, a.name FROM session s
             JOIN accounts a ON s.user_id = a.id
             WHERE s.id = 1",
        )?;
        let mut rows = stmt.query([])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::user_from_row(row)?))
        } else {
            Ok(None)
        }
    }
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.get_entry(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_entry(key, value)
    }
}
