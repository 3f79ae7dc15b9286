//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 1;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    // Check if schema_version table exists
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Migration to version 1: Initial schema
async fn migrate_v1(conn: &Connection) -> Result<()> {
    // libsql doesn't have execute_batch, so we run each statement separately
    // inside a transaction for atomicity

    conn.execute("BEGIN TRANSACTION", ()).await?;

    let statements = [
        // Schema version tracking
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        // Local accounts (beneficiaries and back-office admins)
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            phone_number TEXT,
            birth_date TEXT,
            is_beneficiary INTEGER NOT NULL DEFAULT 0,
            is_admin INTEGER NOT NULL DEFAULT 0,
            ds_instructor_id TEXT
        )",
        "CREATE INDEX IF NOT EXISTS idx_users_ds_instructor ON users(ds_instructor_id)",
        // Account-update requests, one row per remote dossier
        "CREATE TABLE IF NOT EXISTS account_update_requests (
            application_number INTEGER PRIMARY KEY,
            technical_id TEXT NOT NULL,
            status TEXT NOT NULL,
            date_created INTEGER NOT NULL,
            date_last_status_update INTEGER NOT NULL,
            date_last_user_message INTEGER,
            date_last_instructor_message INTEGER,
            date_last_fields_modification INTEGER,
            date_last_synced INTEGER NOT NULL,
            first_name TEXT,
            last_name TEXT,
            email TEXT,
            birth_date TEXT,
            update_types TEXT NOT NULL DEFAULT '[]',
            new_email TEXT,
            new_phone_number TEXT,
            new_first_name TEXT,
            new_last_name TEXT,
            old_email TEXT,
            has_consented INTEGER NOT NULL DEFAULT 0,
            flags TEXT NOT NULL DEFAULT '[]',
            last_instructor_id TEXT REFERENCES users(id),
            user_id TEXT REFERENCES users(id)
        )",
        "CREATE INDEX IF NOT EXISTS idx_requests_status ON account_update_requests(status)",
        "CREATE INDEX IF NOT EXISTS idx_requests_user ON account_update_requests(user_id)",
        // Record migration version
        "INSERT INTO schema_version (version) VALUES (1)",
    ];

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}
