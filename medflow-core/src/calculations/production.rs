//! Production aggregation.
//!
//! Sums a doctor's confirmed earnings for a competência into gross and net
//! totals:
//!
//! | Component                 | Effect on totals            |
//! |---------------------------|-----------------------------|
//! | Shifts                    | adds to gross               |
//! | Private procedures        | adds to gross (net repasse) |
//! | Administrative production | adds to gross               |
//! | Credits                   | adds to gross               |
//! | Discounts                 | adds to deductions          |
//!
//! `net = gross - deductions`. The empty set aggregates to all-zero totals;
//! ordering of the input never changes the result.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calculations::common::round_half_up;
use crate::models::{EarningsCategory, EarningsLineItem, LineItemSnapshot};

/// Aggregated production totals with the contributing item snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionBreakdown {
    pub shifts_total: Decimal,
    pub procedures_total: Decimal,
    pub admin_total: Decimal,
    pub credits_total: Decimal,
    pub gross_total: Decimal,
    pub deductions_total: Decimal,
    pub net_total: Decimal,
    pub items: Vec<LineItemSnapshot>,
}

/// Aggregates confirmed production line items.
///
/// Unconfirmed items and pro-labore payments are ignored; pro-labore is
/// settled separately with withholding applied.
pub fn aggregate_production(items: &[EarningsLineItem]) -> ProductionBreakdown {
    let mut shifts_total = Decimal::ZERO;
    let mut procedures_total = Decimal::ZERO;
    let mut admin_total = Decimal::ZERO;
    let mut credits_total = Decimal::ZERO;
    let mut deductions_total = Decimal::ZERO;
    let mut snapshots = Vec::new();

    for item in items {
        if !item.confirmed {
            continue;
        }
        match item.category {
            EarningsCategory::Shift => shifts_total += item.gross_amount,
            EarningsCategory::PrivateProcedure => procedures_total += item.gross_amount,
            EarningsCategory::AdministrativeProduction => admin_total += item.gross_amount,
            EarningsCategory::Credit => credits_total += item.gross_amount,
            EarningsCategory::Discount => deductions_total += item.gross_amount,
            EarningsCategory::ProLabore => continue,
        }
        snapshots.push(LineItemSnapshot {
            category: item.category,
            source_id: item.id.clone(),
            description: item.description.clone(),
            occurs_on: item.occurs_on,
            amount: item.signed_amount(),
        });
    }

    let gross_total =
        round_half_up(shifts_total + procedures_total + admin_total + credits_total);
    let deductions_total = round_half_up(deductions_total);

    ProductionBreakdown {
        shifts_total: round_half_up(shifts_total),
        procedures_total: round_half_up(procedures_total),
        admin_total: round_half_up(admin_total),
        credits_total: round_half_up(credits_total),
        gross_total,
        deductions_total,
        net_total: round_half_up(gross_total - deductions_total),
        items: snapshots,
    }
}
