// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable per-user store backed by SQLite.
//!
//! Holds one row per user: the long-lived refresh token and the account
//! the user last worked in. Rows are replaced wholesale on write; a row
//! is deleted outright when the provider rejects its refresh token. All
//! SQL runs on the connection's dedicated background thread.

use std::path::Path;

use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        user_id       TEXT PRIMARY KEY,
        refresh_token TEXT NOT NULL,
        account_id    TEXT NOT NULL
    );
";

/// One stored user: refresh credential plus the last-selected account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub user_id: String,
    pub refresh_token: String,
    pub account_id: String,
}

/// Async handle to the users database.
#[derive(Clone)]
pub struct UserDb {
    conn: Connection,
}

impl UserDb {
    /// Open (creating if necessary) the users database at `path`.
    pub async fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).await?;
        Self::init(conn).await
    }

    /// In-memory database, used by tests.
    pub async fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> anyhow::Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA busy_timeout = 5000;
                ",
            )?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }

    /// Look up a user's stored row.
    pub async fn get(&self, user_id: &str) -> anyhow::Result<Option<UserRecord>> {
        let user_id = user_id.to_owned();
        let record = self
            .conn
            .call(move |conn| {
                let record = conn
                    .query_row(
                        "SELECT user_id, refresh_token, account_id
                         FROM users WHERE user_id = ?1",
                        rusqlite::params![user_id],
                        |row| {
                            Ok(UserRecord {
                                user_id: row.get(0)?,
                                refresh_token: row.get(1)?,
                                account_id: row.get(2)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(record)
            })
            .await?;
        Ok(record)
    }

    /// Insert or replace a user's row.
    pub async fn put(&self, record: &UserRecord) -> anyhow::Result<()> {
        let record = record.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "REPLACE INTO users (user_id, refresh_token, account_id)
                     VALUES (?1, ?2, ?3)",
                    rusqlite::params![record.user_id, record.refresh_token, record.account_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Delete a user's row. Deleting an absent row is a no-op.
    pub async fn delete(&self, user_id: &str) -> anyhow::Result<()> {
        let user_id = user_id.to_owned();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "DELETE FROM users WHERE user_id = ?1",
                    rusqlite::params![user_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "userdb_tests.rs"]
mod tests;
