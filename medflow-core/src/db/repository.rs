use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    BracketKind, Competencia, EarningsLineItem, FiscalParameters, FiscalProfile,
    NewProLaboreSettlement, NewProductionSettlement, ProLaboreSettlement, ProductionSettlement,
    SettlementStatus, TaxBracket,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Storage port for the settlement engine.
///
/// Implementations must enforce at most one *finalized* settlement per
/// `(doctor, competência)` per settlement kind, and guard status updates
/// so that only a draft row transitions (reporting
/// [`RepositoryError::Conflict`] otherwise).
#[async_trait]
pub trait MedflowRepository: Send + Sync {
    // Earnings line items
    async fn list_confirmed_production_items(
        &self,
        doctor_id: &str,
        competencia: &Competencia,
    ) -> Result<Vec<EarningsLineItem>, RepositoryError>;

    async fn list_confirmed_pro_labore_items(
        &self,
        doctor_id: &str,
        competencia: &Competencia,
    ) -> Result<Vec<EarningsLineItem>, RepositoryError>;

    // Fiscal tables
    async fn list_bracket_years(&self, kind: BracketKind) -> Result<Vec<i32>, RepositoryError>;

    async fn get_brackets(
        &self,
        kind: BracketKind,
        fiscal_year: i32,
    ) -> Result<Vec<TaxBracket>, RepositoryError>;

    async fn get_fiscal_profile(
        &self,
        doctor_id: &str,
    ) -> Result<Option<FiscalProfile>, RepositoryError>;

    async fn get_fiscal_parameters(
        &self,
        fiscal_year: i32,
    ) -> Result<Option<FiscalParameters>, RepositoryError>;

    // Production settlements
    async fn create_production_settlement(
        &self,
        settlement: NewProductionSettlement,
    ) -> Result<ProductionSettlement, RepositoryError>;

    async fn get_production_settlement(
        &self,
        id: i64,
    ) -> Result<ProductionSettlement, RepositoryError>;

    async fn update_production_status(
        &self,
        id: i64,
        status: &SettlementStatus,
    ) -> Result<(), RepositoryError>;

    async fn list_production_settlements(
        &self,
        doctor_id: Option<&str>,
    ) -> Result<Vec<ProductionSettlement>, RepositoryError>;

    // Pro-labore settlements
    async fn create_pro_labore_settlement(
        &self,
        settlement: NewProLaboreSettlement,
    ) -> Result<ProLaboreSettlement, RepositoryError>;

    async fn get_pro_labore_settlement(
        &self,
        id: i64,
    ) -> Result<ProLaboreSettlement, RepositoryError>;

    async fn update_pro_labore_status(
        &self,
        id: i64,
        status: &SettlementStatus,
    ) -> Result<(), RepositoryError>;

    async fn list_pro_labore_settlements(
        &self,
        doctor_id: Option<&str>,
    ) -> Result<Vec<ProLaboreSettlement>, RepositoryError>;
}
