use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::Competencia;

/// The kind of earnings record a line item represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EarningsCategory {
    /// A worked shift (plantão).
    Shift,
    /// A private procedure; the item amount carries the net repasse.
    PrivateProcedure,
    /// Administrative production (committee work, coordination, etc.).
    AdministrativeProduction,
    /// A discount against production (reduces the net total).
    Discount,
    /// A credit in favour of the doctor (adds to the gross total).
    Credit,
    /// A pro-labore payment, settled separately with INSS/IRRF withholding.
    ProLabore,
}

impl EarningsCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shift => "shift",
            Self::PrivateProcedure => "private_procedure",
            Self::AdministrativeProduction => "administrative_production",
            Self::Discount => "discount",
            Self::Credit => "credit",
            Self::ProLabore => "pro_labore",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "shift" => Some(Self::Shift),
            "private_procedure" => Some(Self::PrivateProcedure),
            "administrative_production" => Some(Self::AdministrativeProduction),
            "discount" => Some(Self::Discount),
            "credit" => Some(Self::Credit),
            "pro_labore" => Some(Self::ProLabore),
            _ => None,
        }
    }
}

/// A single earnings record for a doctor in a competência.
///
/// Only confirmed items participate in settlement. `gross_amount` is the
/// value the item contributes before any withholding; for discounts it is
/// stored positive and applied as a deduction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningsLineItem {
    pub id: String,
    pub doctor_id: String,
    pub competencia: Competencia,
    pub description: String,
    pub occurs_on: NaiveDate,
    pub gross_amount: Decimal,
    pub confirmed: bool,
    pub category: EarningsCategory,
}

impl EarningsLineItem {
    /// Amount as it appears on reports: discounts display negative.
    pub fn signed_amount(&self) -> Decimal {
        match self.category {
            EarningsCategory::Discount => -self.gross_amount,
            _ => self.gross_amount,
        }
    }
}
