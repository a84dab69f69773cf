//! Pro-labore settlement computation.
//!
//! Composes the INSS and IRRF calculators over the confirmed pro-labore
//! payments of a competência:
//!
//! | Step | Value                                         |
//! |------|-----------------------------------------------|
//! | 1    | gross = sum of confirmed pro-labore payments  |
//! | 2    | inss = INSS(gross)                            |
//! | 3    | irrf = IRRF(gross - inss)                     |
//! | 4    | net = gross - inss - irrf - other deductions  |
//!
//! Running a settlement over an empty item set is an error, not a
//! zero-valued result: the caller must confirm items first.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calculations::bracket::BracketError;
use crate::calculations::common::round_half_up;
use crate::calculations::inss::InssCalculator;
use crate::calculations::irrf::IrrfCalculator;
use crate::models::{EarningsCategory, EarningsLineItem, FiscalProfile, LineItemSnapshot, TaxBracket};

/// Errors that can occur while computing a pro-labore settlement.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProLaboreError {
    /// No confirmed pro-labore items were provided.
    #[error("no confirmed pro-labore items to settle")]
    NoEligibleItems,

    /// Bracket resolution failed for INSS or IRRF.
    #[error(transparent)]
    Bracket(#[from] BracketError),
}

/// Computed pro-labore totals with the contributing item snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProLaboreBreakdown {
    pub gross_total: Decimal,
    pub inss_withheld: Decimal,
    pub irrf_withheld: Decimal,
    pub other_deductions: Decimal,
    pub net_total: Decimal,
    pub items: Vec<LineItemSnapshot>,
}

/// Calculator combining both withholding tables for one fiscal year.
#[derive(Debug, Clone)]
pub struct ProLaboreCalculator<'a> {
    inss_brackets: &'a [TaxBracket],
    irrf_brackets: &'a [TaxBracket],
    per_dependent_deduction: Decimal,
}

impl<'a> ProLaboreCalculator<'a> {
    pub fn new(
        inss_brackets: &'a [TaxBracket],
        irrf_brackets: &'a [TaxBracket],
        per_dependent_deduction: Decimal,
    ) -> Self {
        Self {
            inss_brackets,
            irrf_brackets,
            per_dependent_deduction,
        }
    }

    /// Settles the confirmed pro-labore items for one doctor.
    ///
    /// # Errors
    ///
    /// [`ProLaboreError::NoEligibleItems`] when no confirmed pro-labore
    /// item is present; [`ProLaboreError::Bracket`] when a required
    /// bracket lookup fails.
    pub fn calculate(
        &self,
        items: &[EarningsLineItem],
        profile: &FiscalProfile,
        other_deductions: Decimal,
    ) -> Result<ProLaboreBreakdown, ProLaboreError> {
        let eligible: Vec<&EarningsLineItem> = items
            .iter()
            .filter(|item| item.confirmed && item.category == EarningsCategory::ProLabore)
            .collect();
        if eligible.is_empty() {
            return Err(ProLaboreError::NoEligibleItems);
        }

        let gross_total = round_half_up(
            eligible
                .iter()
                .map(|item| item.gross_amount)
                .sum::<Decimal>(),
        );

        let inss_withheld = InssCalculator::new(self.inss_brackets).withhold(gross_total, profile)?;
        let irrf_base = gross_total - inss_withheld;
        let irrf_withheld = IrrfCalculator::new(self.irrf_brackets, self.per_dependent_deduction)
            .withhold(irrf_base, profile.dependent_count, profile)?;

        let other_deductions = round_half_up(other_deductions);
        let net_total =
            round_half_up(gross_total - inss_withheld - irrf_withheld - other_deductions);

        let items = eligible
            .into_iter()
            .map(|item| LineItemSnapshot {
                category: item.category,
                source_id: item.id.clone(),
                description: item.description.clone(),
                occurs_on: item.occurs_on,
                amount: item.gross_amount,
            })
            .collect();

        Ok(ProLaboreBreakdown {
            gross_total,
            inss_withheld,
            irrf_withheld,
            other_deductions,
            net_total,
            items,
        })
    }
}
