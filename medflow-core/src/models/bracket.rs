use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which withholding table a bracket belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BracketKind {
    Inss,
    Irrf,
}

impl BracketKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inss => "inss",
            Self::Irrf => "irrf",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inss" => Some(Self::Inss),
            "irrf" => Some(Self::Irrf),
            _ => None,
        }
    }
}

/// One range of a progressive withholding table (a "faixa").
///
/// For a fixed fiscal year, ranks are contiguous, non-overlapping and
/// ascending in `lower_bound`; at most one bracket is open-ended
/// (`upper_bound` none) and it must carry the highest rank. `rate` is a
/// fraction (0.075 means 7.5%); `deduction` is the constant that encodes
/// the cumulative effect of the lower brackets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBracket {
    pub fiscal_year: i32,
    pub rank: i32,
    pub lower_bound: Decimal,
    pub upper_bound: Option<Decimal>,
    pub rate: Decimal,
    pub deduction: Decimal,
}

/// Per-year fiscal parameters that sit outside the bracket tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalParameters {
    pub fiscal_year: i32,
    /// IRRF deduction applied per declared dependent.
    pub dependent_deduction: Decimal,
}
