//! Settlement engine.
//!
//! Orchestrates one settlement run: read a consistent snapshot of
//! confirmed line items and fiscal tables, compute deterministically, and
//! persist exactly one result record. Nothing is written when a
//! computation fails. Duplicate-finalization races are handled by the
//! repository's draft-guarded status updates and its unique
//! finalized-settlement constraint.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::warn;

use crate::calculations::bracket::{BracketError, resolve_applicable_year};
use crate::calculations::pro_labore::{ProLaboreCalculator, ProLaboreError};
use crate::calculations::production::aggregate_production;
use crate::db::repository::{MedflowRepository, RepositoryError};
use crate::models::{
    BracketKind, Competencia, CompetenciaError, FiscalProfile, NewProLaboreSettlement,
    NewProductionSettlement, ProLaboreSettlement, ProductionSettlement, SettlementError,
    TaxBracket,
};

use thiserror::Error;

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The competência string is malformed; rejected before any lookup.
    #[error(transparent)]
    InvalidCompetencia(#[from] CompetenciaError),

    /// No confirmed pro-labore items exist for the requested period.
    #[error("no confirmed pro-labore items for doctor {doctor_id} in {competencia}")]
    NoEligibleItems {
        doctor_id: String,
        competencia: Competencia,
    },

    /// Bracket resolution failed.
    #[error(transparent)]
    Bracket(#[from] BracketError),

    /// An illegal settlement state transition was attempted.
    #[error(transparent)]
    Settlement(#[from] SettlementError),

    /// The storage layer failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Front door for settlement computation and lifecycle operations.
pub struct SettlementEngine {
    repo: Box<dyn MedflowRepository>,
}

impl SettlementEngine {
    pub fn new(repo: Box<dyn MedflowRepository>) -> Self {
        Self { repo }
    }

    /// Aggregates the confirmed production items of `(doctor, competência)`
    /// and persists the result as a draft settlement.
    ///
    /// An empty period is valid and produces an all-zero draft.
    pub async fn compute_production(
        &self,
        doctor_id: &str,
        competencia: &str,
        acting_user: &str,
    ) -> Result<ProductionSettlement, EngineError> {
        let competencia: Competencia = competencia.parse()?;

        let items = self
            .repo
            .list_confirmed_production_items(doctor_id, &competencia)
            .await?;
        let breakdown = aggregate_production(&items);

        let settlement = self
            .repo
            .create_production_settlement(NewProductionSettlement {
                doctor_id: doctor_id.to_string(),
                competencia,
                gross_total: breakdown.gross_total,
                deductions_total: breakdown.deductions_total,
                net_total: breakdown.net_total,
                items: breakdown.items,
                computed_by: acting_user.to_string(),
            })
            .await?;
        Ok(settlement)
    }

    /// Settles the confirmed pro-labore payments of `(doctor, competência)`
    /// with INSS/IRRF withholding and persists the result as a draft.
    ///
    /// Fails with [`EngineError::NoEligibleItems`] when nothing is
    /// confirmed for the period; items must be confirmed before settling.
    pub async fn compute_pro_labore(
        &self,
        doctor_id: &str,
        competencia: &str,
        acting_user: &str,
    ) -> Result<ProLaboreSettlement, EngineError> {
        let competencia: Competencia = competencia.parse()?;

        let items = self
            .repo
            .list_confirmed_pro_labore_items(doctor_id, &competencia)
            .await?;
        if items.is_empty() {
            return Err(EngineError::NoEligibleItems {
                doctor_id: doctor_id.to_string(),
                competencia,
            });
        }

        let profile = match self.repo.get_fiscal_profile(doctor_id).await? {
            Some(profile) => profile,
            None => {
                warn!(doctor_id, "no fiscal profile on file, withholding nothing");
                FiscalProfile::no_withholding(doctor_id)
            }
        };

        let fiscal_year = competencia.fiscal_year();

        // Tables are only loaded when the profile will actually consult
        // them; custom rates and disabled withholding skip the lookup.
        let inss_table = if profile.withholds_inss && profile.custom_inss_rate.is_none() {
            self.resolve_table(BracketKind::Inss, fiscal_year).await?
        } else {
            Vec::new()
        };
        let irrf_table = if profile.withholds_irrf && profile.custom_irrf_rate.is_none() {
            self.resolve_table(BracketKind::Irrf, fiscal_year).await?
        } else {
            Vec::new()
        };

        let dependent_deduction = match self.repo.get_fiscal_parameters(fiscal_year).await? {
            Some(parameters) => parameters.dependent_deduction,
            None => {
                warn!(
                    fiscal_year,
                    "no fiscal parameters for year, using zero dependent deduction"
                );
                Decimal::ZERO
            }
        };

        let breakdown = ProLaboreCalculator::new(&inss_table, &irrf_table, dependent_deduction)
            .calculate(&items, &profile, Decimal::ZERO)
            .map_err(|err| match err {
                ProLaboreError::NoEligibleItems => EngineError::NoEligibleItems {
                    doctor_id: doctor_id.to_string(),
                    competencia,
                },
                ProLaboreError::Bracket(err) => EngineError::Bracket(err),
            })?;

        let settlement = self
            .repo
            .create_pro_labore_settlement(NewProLaboreSettlement {
                doctor_id: doctor_id.to_string(),
                competencia,
                gross_total: breakdown.gross_total,
                inss_withheld: breakdown.inss_withheld,
                irrf_withheld: breakdown.irrf_withheld,
                other_deductions: breakdown.other_deductions,
                net_total: breakdown.net_total,
                items: breakdown.items,
                computed_by: acting_user.to_string(),
            })
            .await?;
        Ok(settlement)
    }

    /// Finalizes a draft production settlement, freezing its totals.
    pub async fn finalize_production(
        &self,
        settlement_id: i64,
        acting_user: &str,
    ) -> Result<ProductionSettlement, EngineError> {
        let mut settlement = self.repo.get_production_settlement(settlement_id).await?;
        settlement.finalize(acting_user, Utc::now())?;
        self.repo
            .update_production_status(settlement_id, &settlement.status)
            .await?;
        Ok(settlement)
    }

    /// Cancels a draft production settlement.
    pub async fn cancel_production(
        &self,
        settlement_id: i64,
        acting_user: &str,
    ) -> Result<ProductionSettlement, EngineError> {
        let mut settlement = self.repo.get_production_settlement(settlement_id).await?;
        settlement.cancel(acting_user, Utc::now())?;
        self.repo
            .update_production_status(settlement_id, &settlement.status)
            .await?;
        Ok(settlement)
    }

    /// Finalizes a draft pro-labore settlement, freezing its totals.
    pub async fn finalize_pro_labore(
        &self,
        settlement_id: i64,
        acting_user: &str,
    ) -> Result<ProLaboreSettlement, EngineError> {
        let mut settlement = self.repo.get_pro_labore_settlement(settlement_id).await?;
        settlement.finalize(acting_user, Utc::now())?;
        self.repo
            .update_pro_labore_status(settlement_id, &settlement.status)
            .await?;
        Ok(settlement)
    }

    /// Cancels a draft pro-labore settlement.
    pub async fn cancel_pro_labore(
        &self,
        settlement_id: i64,
        acting_user: &str,
    ) -> Result<ProLaboreSettlement, EngineError> {
        let mut settlement = self.repo.get_pro_labore_settlement(settlement_id).await?;
        settlement.cancel(acting_user, Utc::now())?;
        self.repo
            .update_pro_labore_status(settlement_id, &settlement.status)
            .await?;
        Ok(settlement)
    }

    /// Loads the bracket table applying to `requested_year`, falling back
    /// to the most recent earlier year that has one.
    async fn resolve_table(
        &self,
        kind: BracketKind,
        requested_year: i32,
    ) -> Result<Vec<TaxBracket>, EngineError> {
        let available = self.repo.list_bracket_years(kind).await?;
        let resolved_year = resolve_applicable_year(requested_year, &available)
            .ok_or(BracketError::TableNotFound(requested_year))?;
        if resolved_year != requested_year {
            warn!(
                kind = kind.as_str(),
                requested_year,
                resolved_year,
                "no bracket table for requested fiscal year, using most recent earlier table"
            );
        }
        Ok(self.repo.get_brackets(kind, resolved_year).await?)
    }
}
