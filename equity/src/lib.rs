//! Equity math for company cap tables
//!
//! Pure functions and row types used by every other part of the workspace:
//!
//! - **Vesting**: shares vested from a grant's schedule as of a date
//! - **Dilution**: issued and fully-diluted share counts, ownership percentages
//! - **Conversion**: SAFE / convertible note share counts and conversion prices
//! - **Aggregation**: [`CapTableSnapshot`] composed from the rows of one company
//!
//! Nothing in this crate performs I/O.
//!
//! # Example
//!
//! ```ignore
//! use equity::{vested_shares, ownership_percentage};
//!
//! let vested = vested_shares(&grant, today);
//! let pct = ownership_percentage(vested as f64, fully_diluted);
//! ```

#[macro_use]
mod macros;

pub mod aggregate;
pub mod conversion;
pub mod dilution;
pub mod error;
pub mod types;
pub mod vesting;

pub use aggregate::{CapTableInputs, CapTableSnapshot, EntryOwnership, HolderTypeOwnership};
pub use conversion::{conversion_shares, effective_conversion_price, price_per_share};
pub use dilution::{fully_diluted_shares, issued_shares, ownership_percentage};
pub use error::EquityError;
pub use types::*;
pub use vesting::{add_months, vested_shares, whole_months_between};
