//! Share counts and ownership percentages

use crate::types::{CapTableEntry, EquityGrant, OptionPool};

/// Total of issued (non-option) cap table shares.
pub fn issued_shares(entries: &[CapTableEntry]) -> f64 {
    entries
        .iter()
        .filter(|entry| entry.equity_type.is_issued())
        .map(|entry| entry.shares)
        .sum()
}

/// Issued shares plus every granted option and every pool reserve.
pub fn fully_diluted_shares(issued: f64, grants: &[EquityGrant], pools: &[OptionPool]) -> f64 {
    let granted: i64 = grants.iter().map(|g| g.total_shares).sum();
    let reserved: i64 = pools.iter().map(|p| p.total_shares).sum();
    issued + granted as f64 + reserved as f64
}

/// `holder / total * 100`, or 0 when the total is zero.
///
/// Never returns NaN or infinity.
pub fn ownership_percentage(holder_shares: f64, total_shares: f64) -> f64 {
    if total_shares <= 0.0 || !total_shares.is_finite() || !holder_shares.is_finite() {
        return 0.0;
    }
    holder_shares / total_shares * 100.0
}
