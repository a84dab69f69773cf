//! Payroll and withholding calculations.
//!
//! Everything here is pure, synchronous arithmetic over in-memory inputs:
//! bracket resolution, INSS and IRRF withholding, production aggregation
//! and the pro-labore settlement that composes them.

pub mod bracket;
pub mod common;
pub mod inss;
pub mod irrf;
pub mod pro_labore;
pub mod production;

pub use bracket::{BracketError, find_bracket, resolve_applicable_year, withholding_for};
pub use inss::InssCalculator;
pub use irrf::IrrfCalculator;
pub use pro_labore::{ProLaboreBreakdown, ProLaboreCalculator, ProLaboreError};
pub use production::{ProductionBreakdown, aggregate_production};
