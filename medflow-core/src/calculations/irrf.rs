//! IRRF (income tax) withholding.

use rust_decimal::Decimal;

use crate::calculations::bracket::{BracketError, find_bracket, withholding_for};
use crate::calculations::common::{clamp_non_negative, round_half_up};
use crate::models::{FiscalProfile, TaxBracket};

/// Computes IRRF withholding from a base already net of INSS.
///
/// The base is first reduced by the per-dependent deduction configured for
/// the fiscal year (zero when no fiscal parameters exist for it). A
/// non-positive adjusted base owes nothing; a custom rate on the profile
/// bypasses the bracket table.
#[derive(Debug, Clone)]
pub struct IrrfCalculator<'a> {
    brackets: &'a [TaxBracket],
    per_dependent_deduction: Decimal,
}

impl<'a> IrrfCalculator<'a> {
    pub fn new(brackets: &'a [TaxBracket], per_dependent_deduction: Decimal) -> Self {
        Self {
            brackets,
            per_dependent_deduction,
        }
    }

    /// Withholding for `base` with `dependent_count` dependents, never
    /// negative.
    ///
    /// # Errors
    ///
    /// Returns [`BracketError`] when the profile requires a bracket lookup
    /// and no bracket covers the adjusted base.
    pub fn withhold(
        &self,
        base: Decimal,
        dependent_count: u32,
        profile: &FiscalProfile,
    ) -> Result<Decimal, BracketError> {
        if !profile.withholds_irrf {
            return Ok(Decimal::ZERO);
        }

        let adjusted = base - Decimal::from(dependent_count) * self.per_dependent_deduction;
        if adjusted <= Decimal::ZERO {
            return Ok(Decimal::ZERO);
        }

        if let Some(rate) = profile.custom_irrf_rate {
            return Ok(clamp_non_negative(round_half_up(adjusted * rate)));
        }

        let bracket = find_bracket(adjusted, self.brackets)?;
        Ok(withholding_for(adjusted, bracket))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    fn two_bracket_table() -> Vec<TaxBracket> {
        vec![
            TaxBracket {
                fiscal_year: 2023,
                rank: 1,
                lower_bound: dec!(0),
                upper_bound: Some(dec!(2000.00)),
                rate: dec!(0),
                deduction: dec!(0),
            },
            TaxBracket {
                fiscal_year: 2023,
                rank: 2,
                lower_bound: dec!(2000.01),
                upper_bound: None,
                rate: dec!(0.15),
                deduction: dec!(300.00),
            },
        ]
    }

    fn withholding_profile() -> FiscalProfile {
        FiscalProfile {
            withholds_irrf: true,
            ..FiscalProfile::no_withholding("doc-1")
        }
    }

    #[test]
    fn second_bracket_scenario() {
        let table = two_bracket_table();
        let calc = IrrfCalculator::new(&table, dec!(189.59));

        // No dependents: adjusted base stays 3000, 3000 * 0.15 - 300 = 150.
        let irrf = calc.withhold(dec!(3000.00), 0, &withholding_profile()).unwrap();

        assert_eq!(irrf, dec!(150.00));
    }

    #[test]
    fn exempt_bracket_owes_nothing() {
        let table = two_bracket_table();
        let calc = IrrfCalculator::new(&table, dec!(189.59));

        let irrf = calc.withhold(dec!(1500.00), 0, &withholding_profile()).unwrap();

        assert_eq!(irrf, Decimal::ZERO);
    }

    #[test]
    fn dependents_reduce_the_base() {
        let table = two_bracket_table();
        let calc = IrrfCalculator::new(&table, dec!(189.59));

        // 3000 - 2 * 189.59 = 2620.82; 2620.82 * 0.15 - 300 = 93.12 (rounded).
        let irrf = calc.withhold(dec!(3000.00), 2, &withholding_profile()).unwrap();

        assert_eq!(irrf, dec!(93.12));
    }

    #[test]
    fn non_positive_adjusted_base_owes_nothing() {
        let table = two_bracket_table();
        let calc = IrrfCalculator::new(&table, dec!(189.59));

        // 300 - 2 * 189.59 < 0.
        let irrf = calc.withhold(dec!(300.00), 2, &withholding_profile()).unwrap();

        assert_eq!(irrf, Decimal::ZERO);
    }

    #[test]
    fn profile_without_irrf_withholding_pays_zero() {
        let table = two_bracket_table();
        let calc = IrrfCalculator::new(&table, dec!(189.59));

        let irrf = calc
            .withhold(dec!(3000.00), 0, &FiscalProfile::no_withholding("doc-1"))
            .unwrap();

        assert_eq!(irrf, Decimal::ZERO);
    }

    #[test]
    fn custom_rate_bypasses_brackets() {
        let calc = IrrfCalculator::new(&[], dec!(189.59));
        let profile = FiscalProfile {
            custom_irrf_rate: Some(dec!(0.10)),
            ..withholding_profile()
        };

        let irrf = calc.withhold(dec!(3000.00), 0, &profile).unwrap();

        assert_eq!(irrf, dec!(300.00));
    }

    #[test]
    fn custom_rate_still_honours_dependent_deduction() {
        let calc = IrrfCalculator::new(&[], dec!(200.00));
        let profile = FiscalProfile {
            custom_irrf_rate: Some(dec!(0.10)),
            ..withholding_profile()
        };

        // Adjusted base: 3000 - 1 * 200 = 2800.
        let irrf = calc.withhold(dec!(3000.00), 1, &profile).unwrap();

        assert_eq!(irrf, dec!(280.00));
    }

    #[test]
    fn missing_parameters_mean_zero_dependent_deduction() {
        let table = two_bracket_table();
        let calc = IrrfCalculator::new(&table, Decimal::ZERO);

        let irrf = calc.withhold(dec!(3000.00), 5, &withholding_profile()).unwrap();

        assert_eq!(irrf, dec!(150.00));
    }
}
