//! Convertible instrument math

use crate::error::EquityError;

/// Shares issued when `principal` converts at `price_per_share`.
///
/// The result is not rounded; fractional shares are allowed at this stage.
pub fn conversion_shares(principal: f64, price_per_share: f64) -> Result<f64, EquityError> {
    if !price_per_share.is_finite() || price_per_share <= 0.0 {
        return Err(EquityError::InvalidInput(format!(
            "conversion price must be positive, got {}",
            price_per_share
        )));
    }
    if !principal.is_finite() || principal < 0.0 {
        return Err(EquityError::InvalidInput(format!(
            "principal must be non-negative, got {}",
            principal
        )));
    }

    Ok(principal / price_per_share)
}

/// Conversion price for a SAFE / note in a priced round.
///
/// The lower of the discounted round price and the cap price
/// (`valuation_cap / capitalization`). `discount_rate` is a percentage.
pub fn effective_conversion_price(
    round_price: f64,
    discount_rate: Option<f64>,
    valuation_cap: Option<f64>,
    capitalization: f64,
) -> Result<f64, EquityError> {
    if !round_price.is_finite() || round_price <= 0.0 {
        return Err(EquityError::InvalidInput("round price must be positive".into()));
    }

    let mut price = round_price;

    if let Some(rate) = discount_rate {
        if !(0.0..100.0).contains(&rate) {
            return Err(EquityError::InvalidInput(format!(
                "discount rate must be in [0, 100), got {}",
                rate
            )));
        }
        price = price.min(round_price * (1.0 - rate / 100.0));
    }

    if let Some(cap) = valuation_cap {
        if cap <= 0.0 || capitalization <= 0.0 {
            return Err(EquityError::InvalidInput(
                "valuation cap and capitalization must be positive".into(),
            ));
        }
        price = price.min(cap / capitalization);
    }

    Ok(price)
}

/// Round price per share from a pre-money valuation and share count.
pub fn price_per_share(pre_money_valuation: f64, shares: f64) -> Result<f64, EquityError> {
    if shares <= 0.0 || !shares.is_finite() {
        return Err(EquityError::InvalidInput("share count must be positive".into()));
    }
    if pre_money_valuation < 0.0 || !pre_money_valuation.is_finite() {
        return Err(EquityError::InvalidInput("valuation must be non-negative".into()));
    }
    Ok(pre_money_valuation / shares)
}
