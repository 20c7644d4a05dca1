//! Cap table snapshots and instrument conversion

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use equity::{
    CapTableEntry, CapTableInputs, CapTableSnapshot, ConvertibleInstrument, EquityTransaction, EquityType,
    HolderType, InstrumentStatus, TransactionType,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::events::{CapTableEvent, EventBus};
use super::{owned_company, visible_company};
use crate::db::{cap_table, CapTableDb, Company};
use crate::error::CapTableError;
use crate::principal::ActingPrincipal;

/// Terms of a conversion.
///
/// The conversion price is, in order of precedence:
/// - `price_per_share` when given, used as is
/// - the instrument's discount and cap applied to `round_price`
/// - the same applied to the latest fundraising round's price, derived from
///   its pre-money valuation when the round has no price recorded
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConversionRequest {
    #[serde(default)]
    pub price_per_share: Option<f64>,
    /// Price per share of the priced round triggering the conversion.
    #[serde(default)]
    pub round_price: Option<f64>,
    /// Defaults to today.
    #[serde(default)]
    pub conversion_date: Option<NaiveDate>,
    /// Defaults to preferred stock.
    #[serde(default)]
    pub equity_type: Option<EquityType>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutcome {
    pub instrument: ConvertibleInstrument,
    pub entry: CapTableEntry,
    pub transaction: EquityTransaction,
    pub conversion_price: f64,
}

pub struct CapTableService {
    db: Arc<CapTableDb>,
    events: Arc<EventBus>,
}

impl CapTableService {
    pub fn new(db: Arc<CapTableDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    /// Ownership snapshot of a visible company. `as_of` defaults to today.
    pub fn snapshot(
        &self,
        principal: &ActingPrincipal,
        company_id: &str,
        as_of: Option<NaiveDate>,
    ) -> Result<CapTableSnapshot, CapTableError> {
        let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());

        self.db.with_conn(|conn| {
            let company = visible_company(conn, company_id, principal)?;
            let entries = cap_table::list_entries(conn, company_id)?;
            let grants = cap_table::list_grants(conn, company_id)?;
            let pools = cap_table::list_pools(conn, company_id)?;
            let instruments = cap_table::list_instruments(conn, company_id)?;
            let rounds = cap_table::list_rounds(conn, company_id)?;

            Ok(CapTableSnapshot::compose(
                CapTableInputs {
                    entries: &entries,
                    grants: &grants,
                    pools: &pools,
                    instruments: &instruments,
                    rounds: &rounds,
                },
                company.share_calculation_method,
                as_of,
            ))
        })
    }

    /// Equity ledger of a visible company, oldest first.
    pub fn transactions(
        &self,
        principal: &ActingPrincipal,
        company_id: &str,
    ) -> Result<Vec<EquityTransaction>, CapTableError> {
        self.db.with_conn(|conn| {
            visible_company(conn, company_id, principal)?;
            cap_table::list_transactions(conn, company_id)
        })
    }

    /// Convert an outstanding SAFE or note into shares. Owner only.
    ///
    /// The status flip, the investor's cap table entry and the ledger
    /// record commit together. A second conversion of the same instrument
    /// is a `Conflict`.
    pub fn convert_instrument(
        &self,
        principal: &ActingPrincipal,
        instrument_id: &str,
        request: ConversionRequest,
    ) -> Result<ConversionOutcome, CapTableError> {
        let outcome = self.db.with_conn_mut(|conn| {
            let mut instrument = cap_table::get_instrument(conn, instrument_id)?
                .ok_or_else(|| CapTableError::NotFound(format!("instrument {}", instrument_id)))?;
            let company = owned_company(conn, &instrument.company_id, principal)?;

            if instrument.status != InstrumentStatus::Outstanding {
                return Err(CapTableError::Conflict(format!(
                    "instrument {} is {}",
                    instrument_id, instrument.status
                )));
            }

            let price = conversion_price(conn, &company, &instrument, &request)?;
            let shares = equity::conversion_shares(instrument.principal_amount, price)?;
            let date = request.conversion_date.unwrap_or_else(|| Utc::now().date_naive());
            let equity_type = request.equity_type.unwrap_or(EquityType::PreferredStock);
            let notes = format!("Converted from {} {}", instrument.instrument_type, instrument.id);

            let entry = CapTableEntry {
                id: uuid::Uuid::new_v4().to_string(),
                company_id: instrument.company_id.clone(),
                holder_name: instrument.investor_name.clone(),
                holder_email: instrument.investor_email.clone(),
                holder_type: HolderType::Investor,
                equity_type,
                shares,
                price_per_share: Some(price),
                total_value: Some(instrument.principal_amount),
                issue_date: Some(date),
                notes: Some(notes.clone()),
            };
            let transaction = EquityTransaction {
                id: uuid::Uuid::new_v4().to_string(),
                company_id: instrument.company_id.clone(),
                transaction_type: TransactionType::Conversion,
                transaction_date: date,
                from_holder: None,
                to_holder: instrument.investor_name.clone(),
                equity_type,
                shares,
                price_per_share: Some(price),
                total_amount: Some(instrument.principal_amount),
                related_grant_id: None,
                notes: Some(notes),
            };

            let tx = conn.transaction()?;
            if cap_table::mark_instrument_converted(&tx, instrument_id)? == 0 {
                return Err(CapTableError::Conflict(format!(
                    "instrument {} is no longer outstanding",
                    instrument_id
                )));
            }
            cap_table::insert_entry(&tx, &entry)?;
            cap_table::insert_transaction(&tx, &transaction)?;
            tx.commit()?;

            instrument.status = InstrumentStatus::Converted;
            Ok(ConversionOutcome {
                instrument,
                entry,
                transaction,
                conversion_price: price,
            })
        })?;

        self.events.emit(CapTableEvent::InstrumentConverted {
            instrument_id: instrument_id.to_string(),
            company_id: outcome.instrument.company_id.clone(),
            shares: outcome.entry.shares,
        });
        info!(
            instrument_id = %instrument_id,
            shares = outcome.entry.shares,
            price = outcome.conversion_price,
            "Instrument converted"
        );
        Ok(outcome)
    }
}

/// Resolve the price an instrument converts at.
///
/// Cap prices divide the valuation cap by the pre-conversion share count
/// under the company's method.
fn conversion_price(
    conn: &Connection,
    company: &Company,
    instrument: &ConvertibleInstrument,
    request: &ConversionRequest,
) -> Result<f64, CapTableError> {
    if let Some(price) = request.price_per_share {
        return Ok(price);
    }

    let entries = cap_table::list_entries(conn, &company.id)?;
    let grants = cap_table::list_grants(conn, &company.id)?;
    let pools = cap_table::list_pools(conn, &company.id)?;
    let issued = equity::issued_shares(&entries);
    let fully_diluted = equity::fully_diluted_shares(issued, &grants, &pools);
    let capitalization = company.share_calculation_method.denominator(issued, fully_diluted);

    let round_price = match request.round_price {
        Some(price) => price,
        None => {
            let round = cap_table::list_rounds(conn, &company.id)?
                .into_iter()
                .max_by_key(|r| r.close_date)
                .ok_or_else(|| {
                    CapTableError::Validation("no conversion price given and no fundraising round recorded".into())
                })?;
            match (round.price_per_share, round.valuation_pre_money) {
                (Some(price), _) => price,
                (None, Some(pre_money)) => equity::price_per_share(pre_money, capitalization)?,
                (None, None) => {
                    return Err(CapTableError::Validation(format!(
                        "round {} has neither a share price nor a pre-money valuation",
                        round.round_name
                    )))
                }
            }
        }
    };

    Ok(equity::effective_conversion_price(
        round_price,
        instrument.discount_rate,
        instrument.valuation_cap,
        capitalization,
    )?)
}
