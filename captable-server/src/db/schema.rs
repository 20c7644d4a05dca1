//! Database schema definitions

use rusqlite::Connection;
use tracing::info;

use crate::error::CapTableError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<(), CapTableError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        conn.execute_batch(COMPANY_SCHEMA)?;
        conn.execute_batch(DOCUMENT_SCHEMA)?;
        conn.execute_batch(EQUITY_SCHEMA)?;
        conn.execute_batch(INDEXES_SCHEMA)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version > SCHEMA_VERSION {
        return Err(CapTableError::Config(format!(
            "database schema v{} is newer than supported v{}",
            current_version, SCHEMA_VERSION
        )));
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &Connection) -> Result<i32, CapTableError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )?;

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .unwrap_or(0);

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), CapTableError> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])?;
    Ok(())
}

/// Profiles, companies and memberships
const COMPANY_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS profiles (
    id TEXT PRIMARY KEY NOT NULL,
    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
    full_name TEXT
);

CREATE TABLE IF NOT EXISTS companies (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    owner_id TEXT NOT NULL REFERENCES profiles(id),
    authorized_shares INTEGER,
    share_calculation_method TEXT NOT NULL DEFAULT 'fully_diluted'
        CHECK (share_calculation_method IN ('fully_diluted', 'issued_outstanding')),
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS company_members (
    id TEXT PRIMARY KEY NOT NULL,
    company_id TEXT NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL REFERENCES profiles(id),
    role TEXT NOT NULL CHECK (role IN ('owner', 'board_member')),
    status TEXT NOT NULL CHECK (status IN ('pending', 'active', 'removed')),
    invited_by TEXT,
    created_at TEXT NOT NULL,
    UNIQUE (company_id, user_id)
);
"#;

/// Documents, signature requests and the audit log
const DOCUMENT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY NOT NULL,
    company_id TEXT NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT,
    file_path TEXT NOT NULL,
    signed_file_path TEXT,
    file_name TEXT NOT NULL,
    file_size INTEGER NOT NULL,
    file_type TEXT NOT NULL,
    uploaded_by TEXT NOT NULL,
    requires_all_signatures INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL
        CHECK (status IN ('pending', 'partially_signed', 'fully_signed', 'cancelled')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    -- A signed variant only exists for fully signed documents
    CHECK (signed_file_path IS NULL OR status = 'fully_signed')
);

CREATE TABLE IF NOT EXISTS document_signatures (
    id TEXT PRIMARY KEY NOT NULL,
    document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    company_id TEXT NOT NULL,
    signer_id TEXT NOT NULL REFERENCES profiles(id),
    position INTEGER NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('pending', 'signed', 'declined')),
    signature_data TEXT,
    signed_at TEXT,
    declined_at TEXT,
    decline_reason TEXT,
    created_at TEXT NOT NULL,
    UNIQUE (document_id, signer_id)
);

CREATE TABLE IF NOT EXISTS document_audit_log (
    id TEXT PRIMARY KEY NOT NULL,
    document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    actor_id TEXT NOT NULL,
    action TEXT NOT NULL,
    details TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);
"#;

/// Cap table rows
const EQUITY_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cap_table_entries (
    id TEXT PRIMARY KEY NOT NULL,
    company_id TEXT NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    holder_name TEXT NOT NULL,
    holder_email TEXT,
    holder_type TEXT NOT NULL,
    equity_type TEXT NOT NULL,
    shares REAL NOT NULL,
    price_per_share REAL,
    total_value REAL,
    issue_date TEXT,
    notes TEXT
);

CREATE TABLE IF NOT EXISTS equity_grants (
    id TEXT PRIMARY KEY NOT NULL,
    company_id TEXT NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    recipient_name TEXT NOT NULL,
    recipient_email TEXT,
    grant_date TEXT NOT NULL,
    total_shares INTEGER NOT NULL,
    vested_shares INTEGER NOT NULL DEFAULT 0,
    exercised_shares INTEGER NOT NULL DEFAULT 0,
    cancelled_shares INTEGER NOT NULL DEFAULT 0,
    vesting_start_date TEXT,
    vesting_duration_months INTEGER NOT NULL DEFAULT 48,
    cliff_months INTEGER NOT NULL DEFAULT 12,
    exercise_price REAL,
    expiration_date TEXT,
    grant_type TEXT NOT NULL,
    status TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS option_pools (
    id TEXT PRIMARY KEY NOT NULL,
    company_id TEXT NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    pool_name TEXT NOT NULL,
    total_shares INTEGER NOT NULL,
    granted_shares INTEGER NOT NULL DEFAULT 0,
    available_shares INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS convertible_instruments (
    id TEXT PRIMARY KEY NOT NULL,
    company_id TEXT NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    investor_name TEXT NOT NULL,
    investor_email TEXT,
    instrument_type TEXT NOT NULL,
    principal_amount REAL NOT NULL,
    discount_rate REAL,
    valuation_cap REAL,
    interest_rate REAL,
    issue_date TEXT NOT NULL,
    maturity_date TEXT,
    status TEXT NOT NULL
        CHECK (status IN ('outstanding', 'converted', 'repaid', 'expired'))
);

CREATE TABLE IF NOT EXISTS fundraising_rounds (
    id TEXT PRIMARY KEY NOT NULL,
    company_id TEXT NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    round_name TEXT NOT NULL,
    round_type TEXT NOT NULL,
    close_date TEXT NOT NULL,
    valuation_pre_money REAL,
    valuation_post_money REAL,
    amount_raised REAL NOT NULL,
    shares_issued REAL,
    price_per_share REAL,
    lead_investor TEXT
);

CREATE TABLE IF NOT EXISTS equity_transactions (
    id TEXT PRIMARY KEY NOT NULL,
    company_id TEXT NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    transaction_type TEXT NOT NULL,
    transaction_date TEXT NOT NULL,
    from_holder TEXT,
    to_holder TEXT NOT NULL,
    equity_type TEXT NOT NULL,
    shares REAL NOT NULL,
    price_per_share REAL,
    total_amount REAL,
    related_grant_id TEXT,
    notes TEXT
);
"#;

const INDEXES_SCHEMA: &str = r#"
CREATE INDEX IF NOT EXISTS idx_members_user ON company_members(user_id, status);
CREATE INDEX IF NOT EXISTS idx_documents_company ON documents(company_id, created_at);
CREATE INDEX IF NOT EXISTS idx_documents_repair ON documents(status, signed_file_path);
CREATE INDEX IF NOT EXISTS idx_signatures_document ON document_signatures(document_id, position);
CREATE INDEX IF NOT EXISTS idx_signatures_signer ON document_signatures(signer_id, status);
CREATE INDEX IF NOT EXISTS idx_audit_document ON document_audit_log(document_id);
CREATE INDEX IF NOT EXISTS idx_entries_company ON cap_table_entries(company_id);
CREATE INDEX IF NOT EXISTS idx_grants_company ON equity_grants(company_id);
CREATE INDEX IF NOT EXISTS idx_instruments_company ON convertible_instruments(company_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let version: i32 = conn
            .query_row("SELECT version FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_signed_path_requires_fully_signed() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO profiles (id, email) VALUES ('u1', 'o@x.io');
             INSERT INTO companies (id, name, owner_id, created_at) VALUES ('c1', 'Acme', 'u1', '2024-01-01');",
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO documents (id, company_id, title, file_path, signed_file_path, file_name,
                file_size, file_type, uploaded_by, requires_all_signatures, status, created_at, updated_at)
             VALUES ('d1', 'c1', 't', 'c1/a.pdf', 'c1/a-signed.pdf', 'a.pdf', 1, 'application/pdf',
                'u1', 1, 'pending', '2024-01-01', '2024-01-01')",
            [],
        );
        assert!(result.is_err());
    }
}
