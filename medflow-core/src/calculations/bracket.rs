//! Progressive bracket resolution.
//!
//! The INSS and IRRF tables are published per fiscal year as a set of
//! contiguous ranges (faixas), each with a rate and a deduction constant
//! that encodes the cumulative effect of the lower brackets. Withholding
//! for a base value is therefore a single-bracket lookup:
//!
//! ```text
//! withholding = base * bracket.rate - bracket.deduction   (clamped >= 0)
//! ```
//!
//! Year resolution is deliberately explicit: when no table exists for the
//! requested fiscal year, the most recent earlier year that has one is
//! used. Callers log the substitution; a request with no table at or
//! before its year fails outright.
//!
//! ```
//! use rust_decimal_macros::dec;
//! use medflow_core::TaxBracket;
//! use medflow_core::calculations::bracket::{find_bracket, withholding_for};
//!
//! let table = vec![TaxBracket {
//!     fiscal_year: 2023,
//!     rank: 1,
//!     lower_bound: dec!(0),
//!     upper_bound: None,
//!     rate: dec!(0.11),
//!     deduction: dec!(0),
//! }];
//!
//! let bracket = find_bracket(dec!(1000.00), &table).unwrap();
//! assert_eq!(withholding_for(dec!(1000.00), bracket), dec!(110.00));
//! ```

use rust_decimal::Decimal;
use thiserror::Error;

use crate::calculations::common::{clamp_non_negative, round_half_up};
use crate::models::TaxBracket;

/// Errors produced while resolving a bracket.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BracketError {
    /// No table exists at or before the requested fiscal year.
    #[error("no bracket table available at or before fiscal year {0}")]
    TableNotFound(i32),

    /// The resolved table has no brackets at all.
    #[error("bracket table is empty")]
    EmptyTable,

    /// No bracket range covers the base value.
    #[error("no tax bracket covers base value {0}")]
    NoMatchingBracket(Decimal),
}

/// Picks the fiscal year whose table applies to `requested`.
///
/// Exact match wins; otherwise the most recent year strictly below the
/// requested one. Returns `None` when nothing at or before the requested
/// year is available.
pub fn resolve_applicable_year(requested: i32, available: &[i32]) -> Option<i32> {
    if available.contains(&requested) {
        return Some(requested);
    }
    available.iter().copied().filter(|year| *year < requested).max()
}

/// Selects the unique bracket whose range contains `base`.
///
/// Brackets are compared in rank order regardless of input ordering. A
/// bracket matches when `lower_bound <= base` and either it is open-ended
/// or `base <= upper_bound`.
pub fn find_bracket(base: Decimal, table: &[TaxBracket]) -> Result<&TaxBracket, BracketError> {
    if table.is_empty() {
        return Err(BracketError::EmptyTable);
    }

    let mut ranked: Vec<&TaxBracket> = table.iter().collect();
    ranked.sort_by_key(|bracket| bracket.rank);

    ranked
        .into_iter()
        .find(|bracket| {
            base >= bracket.lower_bound
                && bracket.upper_bound.is_none_or(|upper| base <= upper)
        })
        .ok_or(BracketError::NoMatchingBracket(base))
}

/// Marginal-rate-with-deduction withholding for a matched bracket,
/// rounded to two decimal places and clamped at zero.
pub fn withholding_for(base: Decimal, bracket: &TaxBracket) -> Decimal {
    clamp_non_negative(round_half_up(base * bracket.rate - bracket.deduction))
}
