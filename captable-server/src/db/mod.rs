//! SQLite relational store
//!
//! ## Tables
//!
//! - `profiles`, `companies`, `company_members` - tenants and who may act in them
//! - `documents` - uploaded files and their signing status
//! - `document_signatures` - one request per (document, signer)
//! - `document_audit_log` - append-only action history
//! - `cap_table_entries`, `equity_grants`, `option_pools`,
//!   `convertible_instruments`, `fundraising_rounds`, `equity_transactions`
//!
//! Foreign keys are enforced, so deleting a document cascades to its
//! signature requests and audit entries.

pub mod audit;
pub mod cap_table;
pub mod companies;
pub mod documents;
pub mod models;
pub mod schema;
pub mod signatures;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::CapTableError;

pub use models::*;

/// SQLite database behind a mutex.
pub struct CapTableDb {
    conn: Mutex<Connection>,
}

impl CapTableDb {
    /// Open or create `captable.db` in `storage_dir`.
    pub fn open(storage_dir: &Path) -> Result<Self, CapTableError> {
        let db_path = storage_dir.join("captable.db");
        info!("Opening SQLite database at {:?}", db_path);

        let conn = Connection::open(&db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;")?;

        let db = Self { conn: Mutex::new(conn) };
        db.init_schema()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, CapTableError> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let db = Self { conn: Mutex::new(conn) };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<(), CapTableError> {
        self.with_conn(schema::init_schema)
    }

    /// Run `f` with shared access to the connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, CapTableError>
    where
        F: FnOnce(&Connection) -> Result<T, CapTableError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CapTableError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Run `f` with exclusive access (for transactions).
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T, CapTableError>
    where
        F: FnOnce(&mut Connection) -> Result<T, CapTableError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| CapTableError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&mut conn)
    }

    pub fn stats(&self) -> Result<DbStats, CapTableError> {
        self.with_conn(|conn| {
            let count = |table: &str| -> Result<u64, CapTableError> {
                let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
                Ok(n as u64)
            };

            Ok(DbStats {
                company_count: count("companies")?,
                document_count: count("documents")?,
                pending_signature_count: conn.query_row(
                    "SELECT COUNT(*) FROM document_signatures WHERE status = 'pending'",
                    [],
                    |row| row.get::<_, i64>(0),
                )? as u64,
                audit_entry_count: count("document_audit_log")?,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, Serialize)]
pub struct DbStats {
    pub company_count: u64,
    pub document_count: u64,
    pub pending_signature_count: u64,
    pub audit_entry_count: u64,
}
