//! Cap table row types
//!
//! Each struct mirrors one table of the relational store with nullable
//! columns as `Option`. Status and type columns are closed enums parsed once
//! at the store boundary.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

string_enum! {
    /// Class of equity held by a cap table line.
    pub enum EquityType {
        CommonStock => "common_stock",
        PreferredStock => "preferred_stock",
        Safe => "safe",
        ConvertibleNote => "convertible_note",
        Option => "option",
    }
}

impl EquityType {
    /// Options are excluded from issued totals.
    pub fn is_issued(&self) -> bool {
        !matches!(self, EquityType::Option)
    }
}

string_enum! {
    /// Who holds a cap table line.
    pub enum HolderType {
        Founder => "founder",
        Employee => "employee",
        Investor => "investor",
        Advisor => "advisor",
        Other => "other",
    }
}

string_enum! {
    pub enum GrantType {
        Iso => "ISO",
        Nso => "NSO",
        Rsu => "RSU",
        Rsa => "RSA",
    }
}

string_enum! {
    pub enum GrantStatus {
        Active => "active",
        Terminated => "terminated",
        FullyExercised => "fully_exercised",
        Expired => "expired",
    }
}

string_enum! {
    pub enum InstrumentType {
        Safe => "SAFE",
        ConvertibleNote => "convertible_note",
    }
}

string_enum! {
    /// Lifecycle of a convertible instrument. Only `Outstanding` may convert.
    pub enum InstrumentStatus {
        Outstanding => "outstanding",
        Converted => "converted",
        Repaid => "repaid",
        Expired => "expired",
    }
}

string_enum! {
    pub enum RoundType {
        Seed => "seed",
        SeriesA => "series_a",
        SeriesB => "series_b",
        SeriesC => "series_c",
        SeriesD => "series_d",
        Bridge => "bridge",
        Other => "other",
    }
}

string_enum! {
    pub enum TransactionType {
        Issuance => "issuance",
        Transfer => "transfer",
        Repurchase => "repurchase",
        Exercise => "exercise",
        Cancellation => "cancellation",
        Conversion => "conversion",
    }
}

string_enum! {
    /// Company setting selecting the ownership denominator.
    pub enum ShareCalculationMethod {
        /// Issued shares plus all granted options and pool reserves.
        FullyDiluted => "fully_diluted",
        /// Only shares issued today.
        IssuedOutstanding => "issued_outstanding",
    }
}

impl Default for ShareCalculationMethod {
    fn default() -> Self {
        ShareCalculationMethod::FullyDiluted
    }
}

impl ShareCalculationMethod {
    /// Pick the ownership denominator for this method.
    pub fn denominator(&self, issued: f64, fully_diluted: f64) -> f64 {
        match self {
            ShareCalculationMethod::FullyDiluted => fully_diluted,
            ShareCalculationMethod::IssuedOutstanding => issued,
        }
    }
}

/// A line of issued equity held by a named party.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapTableEntry {
    pub id: String,
    pub company_id: String,
    pub holder_name: String,
    pub holder_email: Option<String>,
    pub holder_type: HolderType,
    pub equity_type: EquityType,
    /// Fractional shares are permitted (unrounded conversions).
    pub shares: f64,
    pub price_per_share: Option<f64>,
    pub total_value: Option<f64>,
    pub issue_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// An option / RSU grant with its vesting schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityGrant {
    pub id: String,
    pub company_id: String,
    pub recipient_name: String,
    pub recipient_email: Option<String>,
    pub grant_date: NaiveDate,
    pub total_shares: i64,
    /// Cached value, authoritative only when `vesting_start_date` is unset.
    pub vested_shares: i64,
    pub exercised_shares: i64,
    pub cancelled_shares: i64,
    pub vesting_start_date: Option<NaiveDate>,
    pub vesting_duration_months: u32,
    pub cliff_months: u32,
    pub exercise_price: Option<f64>,
    pub expiration_date: Option<NaiveDate>,
    pub grant_type: GrantType,
    pub status: GrantStatus,
}

/// Shares reserved for future grants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionPool {
    pub id: String,
    pub company_id: String,
    pub pool_name: String,
    pub total_shares: i64,
    pub granted_shares: i64,
    pub available_shares: i64,
}

/// A SAFE or convertible note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertibleInstrument {
    pub id: String,
    pub company_id: String,
    pub investor_name: String,
    pub investor_email: Option<String>,
    pub instrument_type: InstrumentType,
    pub principal_amount: f64,
    /// Percentage, e.g. `20.0` for a 20% discount.
    pub discount_rate: Option<f64>,
    pub valuation_cap: Option<f64>,
    pub interest_rate: Option<f64>,
    pub issue_date: NaiveDate,
    pub maturity_date: Option<NaiveDate>,
    pub status: InstrumentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundraisingRound {
    pub id: String,
    pub company_id: String,
    pub round_name: String,
    pub round_type: RoundType,
    pub close_date: NaiveDate,
    pub valuation_pre_money: Option<f64>,
    pub valuation_post_money: Option<f64>,
    pub amount_raised: f64,
    pub shares_issued: Option<f64>,
    pub price_per_share: Option<f64>,
    pub lead_investor: Option<String>,
}

/// Equity ledger record (issuance, exercise, conversion, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityTransaction {
    pub id: String,
    pub company_id: String,
    pub transaction_type: TransactionType,
    pub transaction_date: NaiveDate,
    pub from_holder: Option<String>,
    pub to_holder: String,
    pub equity_type: EquityType,
    pub shares: f64,
    pub price_per_share: Option<f64>,
    pub total_amount: Option<f64>,
    pub related_grant_id: Option<String>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_enum_round_trip_spelling() {
        assert_eq!(EquityType::CommonStock.as_str(), "common_stock");
        assert_eq!("SAFE".parse::<InstrumentType>().unwrap(), InstrumentType::Safe);
        assert_eq!(GrantType::Rsu.to_string(), "RSU");
    }

    #[test]
    fn test_unknown_variant_is_rejected() {
        let err = "warrant".parse::<EquityType>().unwrap_err();
        assert!(matches!(err, crate::EquityError::UnknownVariant { kind: "EquityType", .. }));
    }

    #[test]
    fn test_option_is_not_issued() {
        assert!(!EquityType::Option.is_issued());
        assert!(EquityType::PreferredStock.is_issued());
    }

    #[test]
    fn test_method_selects_denominator() {
        assert_eq!(ShareCalculationMethod::FullyDiluted.denominator(100.0, 150.0), 150.0);
        assert_eq!(ShareCalculationMethod::IssuedOutstanding.denominator(100.0, 150.0), 100.0);
        assert_eq!(ShareCalculationMethod::default(), ShareCalculationMethod::FullyDiluted);
    }
}
