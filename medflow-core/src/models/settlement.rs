use chrono::{DateTime, Utc};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Competencia, EarningsCategory};

/// Errors raised by settlement state transitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettlementError {
    /// Finalization was attempted on an already finalized settlement.
    #[error("settlement is already finalized")]
    AlreadyFinalized,

    /// The settlement was cancelled and can no longer change state.
    #[error("settlement is cancelled and can no longer change state")]
    AlreadyCancelled,
}

/// Settlement lifecycle state.
///
/// Modelled as a tagged enum so that illegal transitions (for instance
/// `Cancelled` back to `Finalized`) are unrepresentable. Both terminal
/// states carry their own audit fields; a `Draft` has none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SettlementStatus {
    Draft,
    Finalized {
        finalized_at: DateTime<Utc>,
        finalized_by: String,
    },
    Cancelled {
        cancelled_at: DateTime<Utc>,
        cancelled_by: String,
    },
}

impl SettlementStatus {
    pub fn is_draft(&self) -> bool {
        matches!(self, Self::Draft)
    }

    /// Stable lowercase code used for storage and reporting.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Finalized { .. } => "finalized",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    /// `Draft -> Finalized`. Fails without mutating on any other state.
    pub fn finalize(&mut self, by: &str, at: DateTime<Utc>) -> Result<(), SettlementError> {
        match self {
            Self::Draft => {
                *self = Self::Finalized {
                    finalized_at: at,
                    finalized_by: by.to_string(),
                };
                Ok(())
            }
            Self::Finalized { .. } => Err(SettlementError::AlreadyFinalized),
            Self::Cancelled { .. } => Err(SettlementError::AlreadyCancelled),
        }
    }

    /// `Draft -> Cancelled`. Fails without mutating on any other state.
    pub fn cancel(&mut self, by: &str, at: DateTime<Utc>) -> Result<(), SettlementError> {
        match self {
            Self::Draft => {
                *self = Self::Cancelled {
                    cancelled_at: at,
                    cancelled_by: by.to_string(),
                };
                Ok(())
            }
            Self::Finalized { .. } => Err(SettlementError::AlreadyFinalized),
            Self::Cancelled { .. } => Err(SettlementError::AlreadyCancelled),
        }
    }
}

/// Frozen copy of a line item as it entered a settlement, kept for audit
/// and report purposes. `amount` is signed: discounts are negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemSnapshot {
    pub category: EarningsCategory,
    pub source_id: String,
    pub description: String,
    pub occurs_on: NaiveDate,
    pub amount: Decimal,
}

/// Aggregated production result for a doctor in a competência.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionSettlement {
    pub id: i64,
    pub doctor_id: String,
    pub competencia: Competencia,
    pub gross_total: Decimal,
    pub deductions_total: Decimal,
    pub net_total: Decimal,
    pub items: Vec<LineItemSnapshot>,
    pub status: SettlementStatus,
    pub computed_by: String,
    pub computed_at: DateTime<Utc>,
}

impl ProductionSettlement {
    pub fn finalize(&mut self, by: &str, at: DateTime<Utc>) -> Result<(), SettlementError> {
        self.status.finalize(by, at)
    }

    pub fn cancel(&mut self, by: &str, at: DateTime<Utc>) -> Result<(), SettlementError> {
        self.status.cancel(by, at)
    }
}

/// For creating production settlements (no id or computation timestamp).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProductionSettlement {
    pub doctor_id: String,
    pub competencia: Competencia,
    pub gross_total: Decimal,
    pub deductions_total: Decimal,
    pub net_total: Decimal,
    pub items: Vec<LineItemSnapshot>,
    pub computed_by: String,
}

/// Pro-labore result with INSS/IRRF withholding for a doctor in a
/// competência.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProLaboreSettlement {
    pub id: i64,
    pub doctor_id: String,
    pub competencia: Competencia,
    pub gross_total: Decimal,
    pub inss_withheld: Decimal,
    pub irrf_withheld: Decimal,
    pub other_deductions: Decimal,
    pub net_total: Decimal,
    pub items: Vec<LineItemSnapshot>,
    pub status: SettlementStatus,
    pub computed_by: String,
    pub computed_at: DateTime<Utc>,
}

impl ProLaboreSettlement {
    pub fn finalize(&mut self, by: &str, at: DateTime<Utc>) -> Result<(), SettlementError> {
        self.status.finalize(by, at)
    }

    pub fn cancel(&mut self, by: &str, at: DateTime<Utc>) -> Result<(), SettlementError> {
        self.status.cancel(by, at)
    }
}

/// For creating pro-labore settlements (no id or computation timestamp).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProLaboreSettlement {
    pub doctor_id: String,
    pub competencia: Competencia,
    pub gross_total: Decimal,
    pub inss_withheld: Decimal,
    pub irrf_withheld: Decimal,
    pub other_deductions: Decimal,
    pub net_total: Decimal,
    pub items: Vec<LineItemSnapshot>,
    pub computed_by: String,
}
