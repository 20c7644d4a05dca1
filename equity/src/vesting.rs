//! Vesting schedule evaluation
//!
//! Months are calendar months: adding one month to Jan 31 lands on the last
//! day of February. The cliff is all-or-nothing and vested counts are floored
//! so fractional shares are never over-issued.

use chrono::{Datelike, Months, NaiveDate};

use crate::types::EquityGrant;

/// Add calendar months, clamping to the end of shorter months.
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}

/// Calendar months from `start` to `end` by year and month alone (0 if
/// `end` precedes `start`).
///
/// The day of month is ignored: Jan 15 to Feb 14 is one month. The cliff is
/// the only day-precise threshold, see [`vested_shares`].
pub fn whole_months_between(start: NaiveDate, end: NaiveDate) -> u32 {
    let months = (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32;
    months.max(0) as u32
}

/// Shares vested for `grant` as of `as_of`.
///
/// Without a vesting start date the stored `vested_shares` cache is returned
/// verbatim.
pub fn vested_shares(grant: &EquityGrant, as_of: NaiveDate) -> i64 {
    let Some(start) = grant.vesting_start_date else {
        return grant.vested_shares;
    };

    let total = grant.total_shares.max(0);
    let cliff_date = add_months(start, grant.cliff_months);
    if as_of < cliff_date {
        return 0;
    }

    if grant.vesting_duration_months == 0 {
        return total;
    }

    let elapsed = whole_months_between(start, as_of);
    let fraction = (elapsed as f64 / grant.vesting_duration_months as f64).min(1.0);

    ((total as f64 * fraction).floor() as i64).clamp(0, total)
}
