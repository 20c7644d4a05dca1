//! Profiles, companies and memberships

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::models::{Company, CompanyMember, MemberRole, MemberStatus, Profile};
use crate::error::CapTableError;

pub fn insert_profile(conn: &Connection, profile: &Profile) -> Result<(), CapTableError> {
    conn.execute(
        "INSERT INTO profiles (id, email, full_name) VALUES (?1, ?2, ?3)",
        params![profile.id, profile.email, profile.full_name],
    )?;
    Ok(())
}

pub fn get_profile(conn: &Connection, id: &str) -> Result<Option<Profile>, CapTableError> {
    Ok(conn
        .query_row("SELECT * FROM profiles WHERE id = ?1", params![id], Profile::from_row)
        .optional()?)
}

/// Case-insensitive lookup by email.
pub fn find_profile_by_email(conn: &Connection, email: &str) -> Result<Option<Profile>, CapTableError> {
    Ok(conn
        .query_row(
            "SELECT * FROM profiles WHERE email = ?1 COLLATE NOCASE",
            params![email],
            Profile::from_row,
        )
        .optional()?)
}

pub fn insert_company(conn: &Connection, company: &Company) -> Result<(), CapTableError> {
    conn.execute(
        "INSERT INTO companies (id, name, owner_id, authorized_shares, share_calculation_method, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            company.id,
            company.name,
            company.owner_id,
            company.authorized_shares,
            company.share_calculation_method.as_str(),
            company.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_company(conn: &Connection, id: &str) -> Result<Option<Company>, CapTableError> {
    Ok(conn
        .query_row("SELECT * FROM companies WHERE id = ?1", params![id], Company::from_row)
        .optional()?)
}

pub fn get_membership(
    conn: &Connection,
    company_id: &str,
    user_id: &str,
) -> Result<Option<CompanyMember>, CapTableError> {
    Ok(conn
        .query_row(
            "SELECT * FROM company_members WHERE company_id = ?1 AND user_id = ?2",
            params![company_id, user_id],
            CompanyMember::from_row,
        )
        .optional()?)
}

pub fn insert_member(conn: &Connection, member: &CompanyMember) -> Result<(), CapTableError> {
    conn.execute(
        "INSERT INTO company_members (id, company_id, user_id, role, status, invited_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            member.id,
            member.company_id,
            member.user_id,
            member.role.as_str(),
            member.status.as_str(),
            member.invited_by,
            member.created_at,
        ],
    )?;
    Ok(())
}

/// Returns the number of rows changed.
pub fn set_member_status(
    conn: &Connection,
    member_id: &str,
    status: MemberStatus,
    role: MemberRole,
) -> Result<usize, CapTableError> {
    Ok(conn.execute(
        "UPDATE company_members SET status = ?2, role = ?3 WHERE id = ?1",
        params![member_id, status.as_str(), role.as_str()],
    )?)
}

pub fn list_members(conn: &Connection, company_id: &str) -> Result<Vec<CompanyMember>, CapTableError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM company_members WHERE company_id = ?1 ORDER BY created_at, id",
    )?;
    let rows = stmt.query_map(params![company_id], CompanyMember::from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Whether `user_id` is an active board member of the company.
pub fn is_active_board_member(conn: &Connection, company_id: &str, user_id: &str) -> Result<bool, CapTableError> {
    Ok(matches!(
        get_membership(conn, company_id, user_id)?,
        Some(CompanyMember { role: MemberRole::BoardMember, status: MemberStatus::Active, .. })
    ))
}

/// Convenience constructor for a new membership row.
pub fn new_member(
    company_id: &str,
    user_id: &str,
    role: MemberRole,
    invited_by: Option<&str>,
    now: DateTime<Utc>,
) -> CompanyMember {
    CompanyMember {
        id: uuid::Uuid::new_v4().to_string(),
        company_id: company_id.to_string(),
        user_id: user_id.to_string(),
        role,
        status: MemberStatus::Active,
        invited_by: invited_by.map(str::to_string),
        created_at: now,
    }
}
