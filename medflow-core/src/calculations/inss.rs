//! INSS (social security) withholding.

use rust_decimal::Decimal;

use crate::calculations::bracket::{BracketError, find_bracket, withholding_for};
use crate::calculations::common::{clamp_non_negative, round_half_up};
use crate::models::{FiscalProfile, TaxBracket};

/// Computes INSS withholding from gross pay.
///
/// The calculator holds the bracket table already resolved for the fiscal
/// year in question. A profile that does not withhold INSS yields zero; a
/// custom rate bypasses the table entirely.
///
/// ```
/// use rust_decimal_macros::dec;
/// use medflow_core::{FiscalProfile, TaxBracket};
/// use medflow_core::calculations::InssCalculator;
///
/// let table = vec![TaxBracket {
///     fiscal_year: 2023,
///     rank: 1,
///     lower_bound: dec!(0),
///     upper_bound: None,
///     rate: dec!(0.11),
///     deduction: dec!(0),
/// }];
/// let profile = FiscalProfile {
///     withholds_inss: true,
///     ..FiscalProfile::no_withholding("doc-1")
/// };
///
/// let inss = InssCalculator::new(&table).withhold(dec!(1000.00), &profile).unwrap();
/// assert_eq!(inss, dec!(110.00));
/// ```
#[derive(Debug, Clone)]
pub struct InssCalculator<'a> {
    brackets: &'a [TaxBracket],
}

impl<'a> InssCalculator<'a> {
    pub fn new(brackets: &'a [TaxBracket]) -> Self {
        Self { brackets }
    }

    /// Withholding for `gross`, never negative.
    ///
    /// # Errors
    ///
    /// Returns [`BracketError`] when the profile requires a bracket lookup
    /// and no bracket covers the gross amount.
    pub fn withhold(
        &self,
        gross: Decimal,
        profile: &FiscalProfile,
    ) -> Result<Decimal, BracketError> {
        if !profile.withholds_inss {
            return Ok(Decimal::ZERO);
        }

        if let Some(rate) = profile.custom_inss_rate {
            return Ok(clamp_non_negative(round_half_up(gross * rate)));
        }

        let bracket = find_bracket(gross, self.brackets)?;
        Ok(withholding_for(gross, bracket))
    }
}
