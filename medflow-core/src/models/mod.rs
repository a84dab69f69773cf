mod bracket;
mod competencia;
mod fiscal_profile;
mod line_item;
mod permissions;
mod settlement;

pub use bracket::{BracketKind, FiscalParameters, TaxBracket};
pub use competencia::{Competencia, CompetenciaError};
pub use fiscal_profile::FiscalProfile;
pub use line_item::{EarningsCategory, EarningsLineItem};
pub use permissions::{Action, PermissionPolicy, Resource, Role};
pub use settlement::{
    LineItemSnapshot, NewProLaboreSettlement, NewProductionSettlement, ProLaboreSettlement,
    ProductionSettlement, SettlementError, SettlementStatus,
};
