//! Cap table aggregation
//!
//! Composes an ownership snapshot from the row sets of one company. The
//! share calculation method is read once and the resulting denominator is
//! used for every percentage in the snapshot.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::dilution::{fully_diluted_shares, issued_shares, ownership_percentage};
use crate::types::*;
use crate::vesting::vested_shares;

/// Row sets feeding a snapshot.
#[derive(Debug, Clone, Copy)]
pub struct CapTableInputs<'a> {
    pub entries: &'a [CapTableEntry],
    pub grants: &'a [EquityGrant],
    pub pools: &'a [OptionPool],
    pub instruments: &'a [ConvertibleInstrument],
    pub rounds: &'a [FundraisingRound],
}

/// Shares and percentage for one holder type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HolderTypeOwnership {
    pub shares: f64,
    pub percentage: f64,
}

/// Ownership of a single cap table line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryOwnership {
    pub entry_id: String,
    pub holder_name: String,
    pub holder_type: HolderType,
    pub equity_type: EquityType,
    pub shares: f64,
    pub percentage: f64,
}

/// Ownership snapshot of a company as of a date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapTableSnapshot {
    pub as_of: NaiveDate,
    pub method: ShareCalculationMethod,
    pub issued_shares: f64,
    pub fully_diluted_shares: f64,
    /// Denominator used for every percentage below.
    pub denominator: f64,
    pub total_options_granted: i64,
    pub vested_options: i64,
    pub exercised_options: i64,
    pub outstanding_convertible_principal: f64,
    pub outstanding_convertible_count: usize,
    pub option_pool_total: i64,
    pub option_pool_granted: i64,
    pub option_pool_available: i64,
    pub ownership_by_holder_type: BTreeMap<String, HolderTypeOwnership>,
    pub entries: Vec<EntryOwnership>,
    pub latest_round: Option<FundraisingRound>,
}

impl CapTableSnapshot {
    /// Compose a snapshot. `method` is applied uniformly.
    pub fn compose(inputs: CapTableInputs<'_>, method: ShareCalculationMethod, as_of: NaiveDate) -> Self {
        let issued = issued_shares(inputs.entries);
        let fully_diluted = fully_diluted_shares(issued, inputs.grants, inputs.pools);
        let denominator = method.denominator(issued, fully_diluted);

        let total_options_granted: i64 = inputs.grants.iter().map(|g| g.total_shares).sum();
        let vested_options: i64 = inputs.grants.iter().map(|g| vested_shares(g, as_of)).sum();
        let exercised_options: i64 = inputs.grants.iter().map(|g| g.exercised_shares).sum();

        let outstanding: Vec<&ConvertibleInstrument> = inputs
            .instruments
            .iter()
            .filter(|i| i.status == InstrumentStatus::Outstanding)
            .collect();

        let mut ownership_by_holder_type: BTreeMap<String, HolderTypeOwnership> = BTreeMap::new();
        let mut entries = Vec::with_capacity(inputs.entries.len());

        for entry in inputs.entries.iter().filter(|e| e.equity_type.is_issued()) {
            ownership_by_holder_type
                .entry(entry.holder_type.as_str().to_string())
                .or_insert(HolderTypeOwnership { shares: 0.0, percentage: 0.0 })
                .shares += entry.shares;
        }
        for bucket in ownership_by_holder_type.values_mut() {
            bucket.percentage = ownership_percentage(bucket.shares, denominator);
        }

        for entry in inputs.entries {
            entries.push(EntryOwnership {
                entry_id: entry.id.clone(),
                holder_name: entry.holder_name.clone(),
                holder_type: entry.holder_type,
                equity_type: entry.equity_type,
                shares: entry.shares,
                percentage: ownership_percentage(entry.shares, denominator),
            });
        }

        let latest_round = inputs
            .rounds
            .iter()
            .max_by_key(|r| r.close_date)
            .cloned();

        debug!(
            method = %method,
            issued,
            fully_diluted,
            denominator,
            "Composed cap table snapshot"
        );

        Self {
            as_of,
            method,
            issued_shares: issued,
            fully_diluted_shares: fully_diluted,
            denominator,
            total_options_granted,
            vested_options,
            exercised_options,
            outstanding_convertible_principal: outstanding.iter().map(|i| i.principal_amount).sum(),
            outstanding_convertible_count: outstanding.len(),
            option_pool_total: inputs.pools.iter().map(|p| p.total_shares).sum(),
            option_pool_granted: inputs.pools.iter().map(|p| p.granted_shares).sum(),
            option_pool_available: inputs.pools.iter().map(|p| p.available_shares).sum(),
            ownership_by_holder_type,
            entries,
            latest_round,
        }
    }
}
