//! Cap table rows: entries, grants, pools, instruments, rounds, transactions

use equity::{
    CapTableEntry, ConvertibleInstrument, EquityGrant, EquityTransaction, FundraisingRound, OptionPool,
};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::enum_column;
use crate::error::CapTableError;

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<CapTableEntry> {
    Ok(CapTableEntry {
        id: row.get("id")?,
        company_id: row.get("company_id")?,
        holder_name: row.get("holder_name")?,
        holder_email: row.get("holder_email")?,
        holder_type: enum_column(row, "holder_type")?,
        equity_type: enum_column(row, "equity_type")?,
        shares: row.get("shares")?,
        price_per_share: row.get("price_per_share")?,
        total_value: row.get("total_value")?,
        issue_date: row.get("issue_date")?,
        notes: row.get("notes")?,
    })
}

fn grant_from_row(row: &Row<'_>) -> rusqlite::Result<EquityGrant> {
    Ok(EquityGrant {
        id: row.get("id")?,
        company_id: row.get("company_id")?,
        recipient_name: row.get("recipient_name")?,
        recipient_email: row.get("recipient_email")?,
        grant_date: row.get("grant_date")?,
        total_shares: row.get("total_shares")?,
        vested_shares: row.get("vested_shares")?,
        exercised_shares: row.get("exercised_shares")?,
        cancelled_shares: row.get("cancelled_shares")?,
        vesting_start_date: row.get("vesting_start_date")?,
        vesting_duration_months: row.get("vesting_duration_months")?,
        cliff_months: row.get("cliff_months")?,
        exercise_price: row.get("exercise_price")?,
        expiration_date: row.get("expiration_date")?,
        grant_type: enum_column(row, "grant_type")?,
        status: enum_column(row, "status")?,
    })
}

fn pool_from_row(row: &Row<'_>) -> rusqlite::Result<OptionPool> {
    Ok(OptionPool {
        id: row.get("id")?,
        company_id: row.get("company_id")?,
        pool_name: row.get("pool_name")?,
        total_shares: row.get("total_shares")?,
        granted_shares: row.get("granted_shares")?,
        available_shares: row.get("available_shares")?,
    })
}

fn instrument_from_row(row: &Row<'_>) -> rusqlite::Result<ConvertibleInstrument> {
    Ok(ConvertibleInstrument {
        id: row.get("id")?,
        company_id: row.get("company_id")?,
        investor_name: row.get("investor_name")?,
        investor_email: row.get("investor_email")?,
        instrument_type: enum_column(row, "instrument_type")?,
        principal_amount: row.get("principal_amount")?,
        discount_rate: row.get("discount_rate")?,
        valuation_cap: row.get("valuation_cap")?,
        interest_rate: row.get("interest_rate")?,
        issue_date: row.get("issue_date")?,
        maturity_date: row.get("maturity_date")?,
        status: enum_column(row, "status")?,
    })
}

fn round_from_row(row: &Row<'_>) -> rusqlite::Result<FundraisingRound> {
    Ok(FundraisingRound {
        id: row.get("id")?,
        company_id: row.get("company_id")?,
        round_name: row.get("round_name")?,
        round_type: enum_column(row, "round_type")?,
        close_date: row.get("close_date")?,
        valuation_pre_money: row.get("valuation_pre_money")?,
        valuation_post_money: row.get("valuation_post_money")?,
        amount_raised: row.get("amount_raised")?,
        shares_issued: row.get("shares_issued")?,
        price_per_share: row.get("price_per_share")?,
        lead_investor: row.get("lead_investor")?,
    })
}

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<EquityTransaction> {
    Ok(EquityTransaction {
        id: row.get("id")?,
        company_id: row.get("company_id")?,
        transaction_type: enum_column(row, "transaction_type")?,
        transaction_date: row.get("transaction_date")?,
        from_holder: row.get("from_holder")?,
        to_holder: row.get("to_holder")?,
        equity_type: enum_column(row, "equity_type")?,
        shares: row.get("shares")?,
        price_per_share: row.get("price_per_share")?,
        total_amount: row.get("total_amount")?,
        related_grant_id: row.get("related_grant_id")?,
        notes: row.get("notes")?,
    })
}

fn query_company<T>(
    conn: &Connection,
    sql: &str,
    company_id: &str,
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>, CapTableError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![company_id], map)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn list_entries(conn: &Connection, company_id: &str) -> Result<Vec<CapTableEntry>, CapTableError> {
    query_company(
        conn,
        "SELECT * FROM cap_table_entries WHERE company_id = ?1 ORDER BY rowid",
        company_id,
        entry_from_row,
    )
}

pub fn list_grants(conn: &Connection, company_id: &str) -> Result<Vec<EquityGrant>, CapTableError> {
    query_company(
        conn,
        "SELECT * FROM equity_grants WHERE company_id = ?1 ORDER BY grant_date, id",
        company_id,
        grant_from_row,
    )
}

pub fn list_pools(conn: &Connection, company_id: &str) -> Result<Vec<OptionPool>, CapTableError> {
    query_company(
        conn,
        "SELECT * FROM option_pools WHERE company_id = ?1 ORDER BY rowid",
        company_id,
        pool_from_row,
    )
}

pub fn list_instruments(conn: &Connection, company_id: &str) -> Result<Vec<ConvertibleInstrument>, CapTableError> {
    query_company(
        conn,
        "SELECT * FROM convertible_instruments WHERE company_id = ?1 ORDER BY issue_date, id",
        company_id,
        instrument_from_row,
    )
}

pub fn list_rounds(conn: &Connection, company_id: &str) -> Result<Vec<FundraisingRound>, CapTableError> {
    query_company(
        conn,
        "SELECT * FROM fundraising_rounds WHERE company_id = ?1 ORDER BY close_date, id",
        company_id,
        round_from_row,
    )
}

pub fn list_transactions(conn: &Connection, company_id: &str) -> Result<Vec<EquityTransaction>, CapTableError> {
    query_company(
        conn,
        "SELECT * FROM equity_transactions WHERE company_id = ?1 ORDER BY transaction_date, rowid",
        company_id,
        transaction_from_row,
    )
}

pub fn get_instrument(conn: &Connection, id: &str) -> Result<Option<ConvertibleInstrument>, CapTableError> {
    Ok(conn
        .query_row(
            "SELECT * FROM convertible_instruments WHERE id = ?1",
            params![id],
            instrument_from_row,
        )
        .optional()?)
}

/// `outstanding → converted`. Returns 0 if the instrument had already left `outstanding`.
pub fn mark_instrument_converted(conn: &Connection, id: &str) -> Result<usize, CapTableError> {
    Ok(conn.execute(
        "UPDATE convertible_instruments SET status = 'converted' WHERE id = ?1 AND status = 'outstanding'",
        params![id],
    )?)
}

pub fn insert_entry(conn: &Connection, e: &CapTableEntry) -> Result<(), CapTableError> {
    conn.execute(
        "INSERT INTO cap_table_entries (id, company_id, holder_name, holder_email, holder_type, equity_type,
            shares, price_per_share, total_value, issue_date, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            e.id,
            e.company_id,
            e.holder_name,
            e.holder_email,
            e.holder_type.as_str(),
            e.equity_type.as_str(),
            e.shares,
            e.price_per_share,
            e.total_value,
            e.issue_date,
            e.notes,
        ],
    )?;
    Ok(())
}

pub fn insert_grant(conn: &Connection, g: &EquityGrant) -> Result<(), CapTableError> {
    conn.execute(
        "INSERT INTO equity_grants (id, company_id, recipient_name, recipient_email, grant_date, total_shares,
            vested_shares, exercised_shares, cancelled_shares, vesting_start_date, vesting_duration_months,
            cliff_months, exercise_price, expiration_date, grant_type, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            g.id,
            g.company_id,
            g.recipient_name,
            g.recipient_email,
            g.grant_date,
            g.total_shares,
            g.vested_shares,
            g.exercised_shares,
            g.cancelled_shares,
            g.vesting_start_date,
            g.vesting_duration_months,
            g.cliff_months,
            g.exercise_price,
            g.expiration_date,
            g.grant_type.as_str(),
            g.status.as_str(),
        ],
    )?;
    Ok(())
}

pub fn insert_pool(conn: &Connection, p: &OptionPool) -> Result<(), CapTableError> {
    conn.execute(
        "INSERT INTO option_pools (id, company_id, pool_name, total_shares, granted_shares, available_shares)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![p.id, p.company_id, p.pool_name, p.total_shares, p.granted_shares, p.available_shares],
    )?;
    Ok(())
}

pub fn insert_instrument(conn: &Connection, i: &ConvertibleInstrument) -> Result<(), CapTableError> {
    conn.execute(
        "INSERT INTO convertible_instruments (id, company_id, investor_name, investor_email, instrument_type,
            principal_amount, discount_rate, valuation_cap, interest_rate, issue_date, maturity_date, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            i.id,
            i.company_id,
            i.investor_name,
            i.investor_email,
            i.instrument_type.as_str(),
            i.principal_amount,
            i.discount_rate,
            i.valuation_cap,
            i.interest_rate,
            i.issue_date,
            i.maturity_date,
            i.status.as_str(),
        ],
    )?;
    Ok(())
}

pub fn insert_round(conn: &Connection, r: &FundraisingRound) -> Result<(), CapTableError> {
    conn.execute(
        "INSERT INTO fundraising_rounds (id, company_id, round_name, round_type, close_date, valuation_pre_money,
            valuation_post_money, amount_raised, shares_issued, price_per_share, lead_investor)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            r.id,
            r.company_id,
            r.round_name,
            r.round_type.as_str(),
            r.close_date,
            r.valuation_pre_money,
            r.valuation_post_money,
            r.amount_raised,
            r.shares_issued,
            r.price_per_share,
            r.lead_investor,
        ],
    )?;
    Ok(())
}

pub fn insert_transaction(conn: &Connection, t: &EquityTransaction) -> Result<(), CapTableError> {
    conn.execute(
        "INSERT INTO equity_transactions (id, company_id, transaction_type, transaction_date, from_holder,
            to_holder, equity_type, shares, price_per_share, total_amount, related_grant_id, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            t.id,
            t.company_id,
            t.transaction_type.as_str(),
            t.transaction_date,
            t.from_holder,
            t.to_holder,
            t.equity_type.as_str(),
            t.shares,
            t.price_per_share,
            t.total_amount,
            t.related_grant_id,
            t.notes,
        ],
    )?;
    Ok(())
}
