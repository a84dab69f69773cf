use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use medflow_core::{
    BracketKind, Competencia, EarningsCategory, EarningsLineItem, FiscalParameters, FiscalProfile,
    LineItemSnapshot, MedflowRepository, NewProLaboreSettlement, NewProductionSettlement,
    ProLaboreSettlement, ProductionSettlement, RepositoryError, SettlementStatus, TaxBracket,
};
use rust_decimal::Decimal;
use sqlx::{FromRow, Sqlite, Transaction, sqlite::SqlitePool};
use tracing::debug;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub async fn new(database_url: &str) -> Result<Self, RepositoryError> {
        let pool = SqlitePool::connect(database_url)
            .await
            .map_err(|e| RepositoryError::Connection(e.to_string()))?;
        Ok(Self { pool })
    }

    pub async fn new_with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<(), RepositoryError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        Ok(())
    }

    /// Load and execute all SQL seed files from the specified directory.
    /// Files are executed in alphabetical order by filename.
    pub async fn run_seeds(&self, seeds_dir: &Path) -> Result<()> {
        let mut entries: Vec<_> = std::fs::read_dir(seeds_dir)
            .with_context(|| format!("Failed to read seeds directory '{}'", seeds_dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "sql"))
            .collect();

        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            let sql = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read seed file '{}'", path.display()))?;

            sqlx::raw_sql(&sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to execute seed file '{}'", path.display()))?;
            debug!(seed = %path.display(), "applied seed file");
        }

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn load_snapshots(
        &self,
        table: &str,
        settlement_id: i64,
    ) -> Result<Vec<LineItemSnapshot>, RepositoryError> {
        let rows: Vec<SettlementItemRow> = sqlx::query_as(&format!(
            "SELECT category, source_id, description, occurs_on, amount
             FROM {table} WHERE settlement_id = ? ORDER BY id"
        ))
        .bind(settlement_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn insert_snapshots(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        table: &str,
        settlement_id: i64,
        items: &[LineItemSnapshot],
    ) -> Result<(), RepositoryError> {
        for item in items {
            sqlx::query(&format!(
                "INSERT INTO {table} (settlement_id, category, source_id, description, occurs_on, amount)
                 VALUES (?, ?, ?, ?, ?, ?)"
            ))
            .bind(settlement_id)
            .bind(item.category.as_str())
            .bind(&item.source_id)
            .bind(&item.description)
            .bind(item.occurs_on.format("%Y-%m-%d").to_string())
            .bind(item.amount.to_string())
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
        }
        Ok(())
    }

    /// Draft-guarded status transition shared by both settlement tables.
    ///
    /// The `AND status = 'draft'` guard makes concurrent finalizations
    /// race-safe: exactly one update wins, the rest see a conflict.
    async fn update_status(
        &self,
        table: &str,
        id: i64,
        status: &SettlementStatus,
    ) -> Result<(), RepositoryError> {
        let (finalized_at, finalized_by, cancelled_at, cancelled_by) = match status {
            SettlementStatus::Draft => (None, None, None, None),
            SettlementStatus::Finalized {
                finalized_at,
                finalized_by,
            } => (
                Some(finalized_at.format(DATETIME_FORMAT).to_string()),
                Some(finalized_by.as_str()),
                None,
                None,
            ),
            SettlementStatus::Cancelled {
                cancelled_at,
                cancelled_by,
            } => (
                None,
                None,
                Some(cancelled_at.format(DATETIME_FORMAT).to_string()),
                Some(cancelled_by.as_str()),
            ),
        };

        let result = sqlx::query(&format!(
            "UPDATE {table} SET
                status = ?, finalized_at = ?, finalized_by = ?,
                cancelled_at = ?, cancelled_by = ?
             WHERE id = ? AND status = 'draft'"
        ))
        .bind(status.code())
        .bind(finalized_at)
        .bind(finalized_by)
        .bind(cancelled_at)
        .bind(cancelled_by)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            let existing: Option<(String,)> =
                sqlx::query_as(&format!("SELECT status FROM {table} WHERE id = ?"))
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| RepositoryError::Database(e.to_string()))?;

            return Err(match existing {
                Some((code,)) => RepositoryError::Conflict(format!(
                    "settlement {} is already {}",
                    id, code
                )),
                None => RepositoryError::NotFound,
            });
        }

        Ok(())
    }
}

#[derive(FromRow)]
struct TaxBracketRow {
    fiscal_year: i32,
    rank: i32,
    lower_bound: String,
    upper_bound: Option<String>,
    rate: String,
    deduction: String,
}

impl TryFrom<TaxBracketRow> for TaxBracket {
    type Error = RepositoryError;

    fn try_from(row: TaxBracketRow) -> Result<Self, Self::Error> {
        Ok(TaxBracket {
            fiscal_year: row.fiscal_year,
            rank: row.rank,
            lower_bound: parse_decimal(&row.lower_bound)?,
            upper_bound: row.upper_bound.as_ref().map(|s| parse_decimal(s)).transpose()?,
            rate: parse_decimal(&row.rate)?,
            deduction: parse_decimal(&row.deduction)?,
        })
    }
}

#[derive(FromRow)]
struct FiscalProfileRow {
    doctor_id: String,
    dependent_count: u32,
    withholds_inss: bool,
    withholds_irrf: bool,
    custom_inss_rate: Option<String>,
    custom_irrf_rate: Option<String>,
}

impl TryFrom<FiscalProfileRow> for FiscalProfile {
    type Error = RepositoryError;

    fn try_from(row: FiscalProfileRow) -> Result<Self, Self::Error> {
        Ok(FiscalProfile {
            doctor_id: row.doctor_id,
            dependent_count: row.dependent_count,
            withholds_inss: row.withholds_inss,
            withholds_irrf: row.withholds_irrf,
            custom_inss_rate: row
                .custom_inss_rate
                .as_ref()
                .map(|s| parse_decimal(s))
                .transpose()?,
            custom_irrf_rate: row
                .custom_irrf_rate
                .as_ref()
                .map(|s| parse_decimal(s))
                .transpose()?,
        })
    }
}

#[derive(FromRow)]
struct EarningsItemRow {
    id: String,
    doctor_id: String,
    competencia: String,
    category: String,
    description: String,
    occurs_on: String,
    gross_amount: String,
    confirmed: bool,
}

impl TryFrom<EarningsItemRow> for EarningsLineItem {
    type Error = RepositoryError;

    fn try_from(row: EarningsItemRow) -> Result<Self, Self::Error> {
        Ok(EarningsLineItem {
            id: row.id,
            doctor_id: row.doctor_id,
            competencia: parse_competencia(&row.competencia)?,
            description: row.description,
            occurs_on: parse_date(&row.occurs_on)?,
            gross_amount: parse_decimal(&row.gross_amount)?,
            confirmed: row.confirmed,
            category: parse_category(&row.category)?,
        })
    }
}

#[derive(FromRow)]
struct SettlementItemRow {
    category: String,
    source_id: String,
    description: String,
    occurs_on: String,
    amount: String,
}

impl TryFrom<SettlementItemRow> for LineItemSnapshot {
    type Error = RepositoryError;

    fn try_from(row: SettlementItemRow) -> Result<Self, Self::Error> {
        Ok(LineItemSnapshot {
            category: parse_category(&row.category)?,
            source_id: row.source_id,
            description: row.description,
            occurs_on: parse_date(&row.occurs_on)?,
            amount: parse_decimal(&row.amount)?,
        })
    }
}

#[derive(FromRow)]
struct ProductionSettlementRow {
    id: i64,
    doctor_id: String,
    competencia: String,
    gross_total: String,
    deductions_total: String,
    net_total: String,
    status: String,
    finalized_at: Option<String>,
    finalized_by: Option<String>,
    cancelled_at: Option<String>,
    cancelled_by: Option<String>,
    computed_by: String,
    computed_at: String,
}

impl ProductionSettlementRow {
    fn into_settlement(
        self,
        items: Vec<LineItemSnapshot>,
    ) -> Result<ProductionSettlement, RepositoryError> {
        let status = parse_status(
            &self.status,
            self.finalized_at,
            self.finalized_by,
            self.cancelled_at,
            self.cancelled_by,
        )?;
        Ok(ProductionSettlement {
            id: self.id,
            doctor_id: self.doctor_id,
            competencia: parse_competencia(&self.competencia)?,
            gross_total: parse_decimal(&self.gross_total)?,
            deductions_total: parse_decimal(&self.deductions_total)?,
            net_total: parse_decimal(&self.net_total)?,
            items,
            status,
            computed_by: self.computed_by,
            computed_at: parse_datetime(&self.computed_at)?,
        })
    }
}

#[derive(FromRow)]
struct ProLaboreSettlementRow {
    id: i64,
    doctor_id: String,
    competencia: String,
    gross_total: String,
    inss_withheld: String,
    irrf_withheld: String,
    other_deductions: String,
    net_total: String,
    status: String,
    finalized_at: Option<String>,
    finalized_by: Option<String>,
    cancelled_at: Option<String>,
    cancelled_by: Option<String>,
    computed_by: String,
    computed_at: String,
}

impl ProLaboreSettlementRow {
    fn into_settlement(
        self,
        items: Vec<LineItemSnapshot>,
    ) -> Result<ProLaboreSettlement, RepositoryError> {
        let status = parse_status(
            &self.status,
            self.finalized_at,
            self.finalized_by,
            self.cancelled_at,
            self.cancelled_by,
        )?;
        Ok(ProLaboreSettlement {
            id: self.id,
            doctor_id: self.doctor_id,
            competencia: parse_competencia(&self.competencia)?,
            gross_total: parse_decimal(&self.gross_total)?,
            inss_withheld: parse_decimal(&self.inss_withheld)?,
            irrf_withheld: parse_decimal(&self.irrf_withheld)?,
            other_deductions: parse_decimal(&self.other_deductions)?,
            net_total: parse_decimal(&self.net_total)?,
            items,
            status,
            computed_by: self.computed_by,
            computed_at: parse_datetime(&self.computed_at)?,
        })
    }
}

fn parse_decimal(s: &str) -> Result<Decimal, RepositoryError> {
    s.parse::<Decimal>()
        .map_err(|e| RepositoryError::Database(format!("Failed to parse decimal '{}': {}", s, e)))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    // SQLite stores timestamps in various formats, try common ones
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|e| RepositoryError::Database(format!("Failed to parse datetime '{}': {}", s, e)))
}

fn parse_date(s: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| RepositoryError::Database(format!("Failed to parse date '{}': {}", s, e)))
}

fn parse_competencia(s: &str) -> Result<Competencia, RepositoryError> {
    s.parse::<Competencia>()
        .map_err(|e| RepositoryError::Database(format!("Invalid competência '{}': {}", s, e)))
}

fn parse_category(s: &str) -> Result<EarningsCategory, RepositoryError> {
    EarningsCategory::parse(s)
        .ok_or_else(|| RepositoryError::Database(format!("Invalid earnings category: {}", s)))
}

fn parse_status(
    code: &str,
    finalized_at: Option<String>,
    finalized_by: Option<String>,
    cancelled_at: Option<String>,
    cancelled_by: Option<String>,
) -> Result<SettlementStatus, RepositoryError> {
    match code {
        "draft" => Ok(SettlementStatus::Draft),
        "finalized" => Ok(SettlementStatus::Finalized {
            finalized_at: parse_datetime(&finalized_at.ok_or_else(|| {
                RepositoryError::Database("finalized settlement without finalized_at".to_string())
            })?)?,
            finalized_by: finalized_by.ok_or_else(|| {
                RepositoryError::Database("finalized settlement without finalized_by".to_string())
            })?,
        }),
        "cancelled" => Ok(SettlementStatus::Cancelled {
            cancelled_at: parse_datetime(&cancelled_at.ok_or_else(|| {
                RepositoryError::Database("cancelled settlement without cancelled_at".to_string())
            })?)?,
            cancelled_by: cancelled_by.ok_or_else(|| {
                RepositoryError::Database("cancelled settlement without cancelled_by".to_string())
            })?,
        }),
        other => Err(RepositoryError::Database(format!(
            "Invalid settlement status: {}",
            other
        ))),
    }
}

fn map_sqlx_error(e: sqlx::Error) -> RepositoryError {
    let msg = e.to_string();
    if msg.contains("UNIQUE constraint failed") {
        RepositoryError::Conflict(msg)
    } else {
        RepositoryError::Database(msg)
    }
}

const EARNINGS_ITEM_COLUMNS: &str =
    "id, doctor_id, competencia, category, description, occurs_on, gross_amount, confirmed";

const PRODUCTION_COLUMNS: &str =
    "id, doctor_id, competencia, gross_total, deductions_total, net_total,
     status, finalized_at, finalized_by, cancelled_at, cancelled_by,
     computed_by, computed_at";

const PRO_LABORE_COLUMNS: &str =
    "id, doctor_id, competencia, gross_total, inss_withheld, irrf_withheld,
     other_deductions, net_total,
     status, finalized_at, finalized_by, cancelled_at, cancelled_by,
     computed_by, computed_at";

#[async_trait]
impl MedflowRepository for SqliteRepository {
    async fn list_confirmed_production_items(
        &self,
        doctor_id: &str,
        competencia: &Competencia,
    ) -> Result<Vec<EarningsLineItem>, RepositoryError> {
        let rows: Vec<EarningsItemRow> = sqlx::query_as(&format!(
            "SELECT {EARNINGS_ITEM_COLUMNS} FROM earnings_items
             WHERE doctor_id = ? AND competencia = ? AND confirmed = 1
               AND category != 'pro_labore'
             ORDER BY occurs_on, id"
        ))
        .bind(doctor_id)
        .bind(competencia.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn list_confirmed_pro_labore_items(
        &self,
        doctor_id: &str,
        competencia: &Competencia,
    ) -> Result<Vec<EarningsLineItem>, RepositoryError> {
        let rows: Vec<EarningsItemRow> = sqlx::query_as(&format!(
            "SELECT {EARNINGS_ITEM_COLUMNS} FROM earnings_items
             WHERE doctor_id = ? AND competencia = ? AND confirmed = 1
               AND category = 'pro_labore'
             ORDER BY occurs_on, id"
        ))
        .bind(doctor_id)
        .bind(competencia.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn list_bracket_years(&self, kind: BracketKind) -> Result<Vec<i32>, RepositoryError> {
        let rows: Vec<(i32,)> = sqlx::query_as(
            "SELECT DISTINCT fiscal_year FROM tax_brackets WHERE kind = ? ORDER BY fiscal_year",
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(|(year,)| year).collect())
    }

    async fn get_brackets(
        &self,
        kind: BracketKind,
        fiscal_year: i32,
    ) -> Result<Vec<TaxBracket>, RepositoryError> {
        let rows: Vec<TaxBracketRow> = sqlx::query_as(
            "SELECT fiscal_year, rank, lower_bound, upper_bound, rate, deduction
             FROM tax_brackets
             WHERE kind = ? AND fiscal_year = ?
             ORDER BY rank",
        )
        .bind(kind.as_str())
        .bind(fiscal_year)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn get_fiscal_profile(
        &self,
        doctor_id: &str,
    ) -> Result<Option<FiscalProfile>, RepositoryError> {
        let row: Option<FiscalProfileRow> = sqlx::query_as(
            "SELECT doctor_id, dependent_count, withholds_inss, withholds_irrf,
                    custom_inss_rate, custom_irrf_rate
             FROM fiscal_profiles WHERE doctor_id = ?",
        )
        .bind(doctor_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        row.map(|r| r.try_into()).transpose()
    }

    async fn get_fiscal_parameters(
        &self,
        fiscal_year: i32,
    ) -> Result<Option<FiscalParameters>, RepositoryError> {
        let row: Option<(i32, String)> = sqlx::query_as(
            "SELECT fiscal_year, dependent_deduction FROM fiscal_parameters
             WHERE fiscal_year = ?",
        )
        .bind(fiscal_year)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        row.map(|(fiscal_year, dependent_deduction)| {
            Ok(FiscalParameters {
                fiscal_year,
                dependent_deduction: parse_decimal(&dependent_deduction)?,
            })
        })
        .transpose()
    }

    async fn create_production_settlement(
        &self,
        settlement: NewProductionSettlement,
    ) -> Result<ProductionSettlement, RepositoryError> {
        let now = Utc::now().format(DATETIME_FORMAT).to_string();

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let result = sqlx::query(
            "INSERT INTO production_settlements (
                doctor_id, competencia, gross_total, deductions_total, net_total,
                status, computed_by, computed_at
            ) VALUES (?, ?, ?, ?, ?, 'draft', ?, ?)",
        )
        .bind(&settlement.doctor_id)
        .bind(settlement.competencia.to_string())
        .bind(settlement.gross_total.to_string())
        .bind(settlement.deductions_total.to_string())
        .bind(settlement.net_total.to_string())
        .bind(&settlement.computed_by)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let id = result.last_insert_rowid();
        self.insert_snapshots(&mut tx, "production_settlement_items", id, &settlement.items)
            .await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        self.get_production_settlement(id).await
    }

    async fn get_production_settlement(
        &self,
        id: i64,
    ) -> Result<ProductionSettlement, RepositoryError> {
        let row: ProductionSettlementRow = sqlx::query_as(&format!(
            "SELECT {PRODUCTION_COLUMNS} FROM production_settlements WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?
        .ok_or(RepositoryError::NotFound)?;

        let items = self
            .load_snapshots("production_settlement_items", id)
            .await?;
        row.into_settlement(items)
    }

    async fn update_production_status(
        &self,
        id: i64,
        status: &SettlementStatus,
    ) -> Result<(), RepositoryError> {
        self.update_status("production_settlements", id, status).await
    }

    async fn list_production_settlements(
        &self,
        doctor_id: Option<&str>,
    ) -> Result<Vec<ProductionSettlement>, RepositoryError> {
        let rows: Vec<ProductionSettlementRow> = match doctor_id {
            Some(doctor) => {
                sqlx::query_as(&format!(
                    "SELECT {PRODUCTION_COLUMNS} FROM production_settlements
                     WHERE doctor_id = ? ORDER BY competencia DESC, id DESC"
                ))
                .bind(doctor)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {PRODUCTION_COLUMNS} FROM production_settlements
                     ORDER BY competencia DESC, id DESC"
                ))
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        let mut settlements = Vec::with_capacity(rows.len());
        for row in rows {
            let items = self
                .load_snapshots("production_settlement_items", row.id)
                .await?;
            settlements.push(row.into_settlement(items)?);
        }
        Ok(settlements)
    }

    async fn create_pro_labore_settlement(
        &self,
        settlement: NewProLaboreSettlement,
    ) -> Result<ProLaboreSettlement, RepositoryError> {
        let now = Utc::now().format(DATETIME_FORMAT).to_string();

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let result = sqlx::query(
            "INSERT INTO pro_labore_settlements (
                doctor_id, competencia, gross_total, inss_withheld, irrf_withheld,
                other_deductions, net_total, status, computed_by, computed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 'draft', ?, ?)",
        )
        .bind(&settlement.doctor_id)
        .bind(settlement.competencia.to_string())
        .bind(settlement.gross_total.to_string())
        .bind(settlement.inss_withheld.to_string())
        .bind(settlement.irrf_withheld.to_string())
        .bind(settlement.other_deductions.to_string())
        .bind(settlement.net_total.to_string())
        .bind(&settlement.computed_by)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let id = result.last_insert_rowid();
        self.insert_snapshots(&mut tx, "pro_labore_settlement_items", id, &settlement.items)
            .await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        self.get_pro_labore_settlement(id).await
    }

    async fn get_pro_labore_settlement(
        &self,
        id: i64,
    ) -> Result<ProLaboreSettlement, RepositoryError> {
        let row: ProLaboreSettlementRow = sqlx::query_as(&format!(
            "SELECT {PRO_LABORE_COLUMNS} FROM pro_labore_settlements WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?
        .ok_or(RepositoryError::NotFound)?;

        let items = self
            .load_snapshots("pro_labore_settlement_items", id)
            .await?;
        row.into_settlement(items)
    }

    async fn update_pro_labore_status(
        &self,
        id: i64,
        status: &SettlementStatus,
    ) -> Result<(), RepositoryError> {
        self.update_status("pro_labore_settlements", id, status).await
    }

    async fn list_pro_labore_settlements(
        &self,
        doctor_id: Option<&str>,
    ) -> Result<Vec<ProLaboreSettlement>, RepositoryError> {
        let rows: Vec<ProLaboreSettlementRow> = match doctor_id {
            Some(doctor) => {
                sqlx::query_as(&format!(
                    "SELECT {PRO_LABORE_COLUMNS} FROM pro_labore_settlements
                     WHERE doctor_id = ? ORDER BY competencia DESC, id DESC"
                ))
                .bind(doctor)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {PRO_LABORE_COLUMNS} FROM pro_labore_settlements
                     ORDER BY competencia DESC, id DESC"
                ))
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        let mut settlements = Vec::with_capacity(rows.len());
        for row in rows {
            let items = self
                .load_snapshots("pro_labore_settlement_items", row.id)
                .await?;
            settlements.push(row.into_settlement(items)?);
        }
        Ok(settlements)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;

    async fn setup_test_db() -> SqliteRepository {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");

        let repo = SqliteRepository::new_with_pool(pool).await;
        repo.run_migrations()
            .await
            .expect("Failed to run migrations");
        repo
    }

    async fn setup_seeded_db() -> SqliteRepository {
        let repo = setup_test_db().await;
        repo.run_seeds(Path::new("./seeds"))
            .await
            .expect("Failed to run seeds");
        repo
    }

    async fn insert_item(
        repo: &SqliteRepository,
        id: &str,
        category: &str,
        amount: &str,
        confirmed: bool,
    ) {
        sqlx::query(
            "INSERT INTO earnings_items (
                id, doctor_id, competencia, category, description,
                occurs_on, gross_amount, confirmed
            ) VALUES (?, 'doc-1', '2023-05', ?, ?, '2023-05-10', ?, ?)",
        )
        .bind(id)
        .bind(category)
        .bind(format!("{} {}", category, id))
        .bind(amount)
        .bind(confirmed)
        .execute(repo.pool())
        .await
        .expect("Failed to insert earnings item");
    }

    fn competencia() -> Competencia {
        "2023-05".parse().unwrap()
    }

    fn new_production(items: Vec<LineItemSnapshot>) -> NewProductionSettlement {
        NewProductionSettlement {
            doctor_id: "doc-1".to_string(),
            competencia: competencia(),
            gross_total: dec!(500.00),
            deductions_total: dec!(50.00),
            net_total: dec!(450.00),
            items,
            computed_by: "user-1".to_string(),
        }
    }

    fn new_pro_labore() -> NewProLaboreSettlement {
        NewProLaboreSettlement {
            doctor_id: "doc-1".to_string(),
            competencia: competencia(),
            gross_total: dec!(3000.00),
            inss_withheld: dec!(263.06),
            irrf_withheld: dec!(46.87),
            other_deductions: dec!(0),
            net_total: dec!(2690.07),
            items: vec![snapshot()],
            computed_by: "user-1".to_string(),
        }
    }

    fn snapshot() -> LineItemSnapshot {
        LineItemSnapshot {
            category: EarningsCategory::Shift,
            source_id: "item-1".to_string(),
            description: "night shift".to_string(),
            occurs_on: NaiveDate::from_ymd_opt(2023, 5, 10).unwrap(),
            amount: dec!(500.00),
        }
    }

    #[tokio::test]
    async fn seeds_load_2023_bracket_tables() {
        let repo = setup_seeded_db().await;

        let inss = repo
            .get_brackets(BracketKind::Inss, 2023)
            .await
            .expect("Should load INSS brackets");
        let irrf = repo
            .get_brackets(BracketKind::Irrf, 2023)
            .await
            .expect("Should load IRRF brackets");

        assert_eq!(inss.len(), 4);
        assert_eq!(inss[0].rate, dec!(0.075));
        assert_eq!(inss[3].upper_bound, Some(dec!(7507.49)));
        assert_eq!(irrf.len(), 5);
        assert_eq!(irrf[4].rate, dec!(0.275));
        assert!(irrf[4].upper_bound.is_none());
    }

    #[tokio::test]
    async fn seeds_load_fiscal_parameters() {
        let repo = setup_seeded_db().await;

        let parameters = repo
            .get_fiscal_parameters(2023)
            .await
            .expect("Should query fiscal parameters")
            .expect("Should find 2023 parameters");

        assert_eq!(parameters.dependent_deduction, dec!(189.59));
    }

    #[tokio::test]
    async fn seeds_are_idempotent() {
        let repo = setup_seeded_db().await;

        repo.run_seeds(Path::new("./seeds"))
            .await
            .expect("Re-running seeds should not fail");

        let inss = repo.get_brackets(BracketKind::Inss, 2023).await.unwrap();
        assert_eq!(inss.len(), 4);
    }

    #[tokio::test]
    async fn list_bracket_years_is_per_kind() {
        let repo = setup_seeded_db().await;
        sqlx::query(
            "INSERT INTO tax_brackets (kind, fiscal_year, rank, lower_bound, upper_bound, rate, deduction)
             VALUES ('inss', 2024, 1, '0.00', NULL, '0.075', '0.00')",
        )
        .execute(repo.pool())
        .await
        .expect("Failed to insert bracket");

        let inss_years = repo.list_bracket_years(BracketKind::Inss).await.unwrap();
        let irrf_years = repo.list_bracket_years(BracketKind::Irrf).await.unwrap();

        assert_eq!(inss_years, vec![2023, 2024]);
        assert_eq!(irrf_years, vec![2023]);
    }

    #[tokio::test]
    async fn missing_fiscal_parameters_year_is_none() {
        let repo = setup_seeded_db().await;

        let parameters = repo.get_fiscal_parameters(1999).await.unwrap();

        assert!(parameters.is_none());
    }

    #[tokio::test]
    async fn production_items_exclude_unconfirmed_and_pro_labore() {
        let repo = setup_test_db().await;
        insert_item(&repo, "i1", "shift", "500.00", true).await;
        insert_item(&repo, "i2", "discount", "50.00", true).await;
        insert_item(&repo, "i3", "shift", "700.00", false).await;
        insert_item(&repo, "i4", "pro_labore", "3000.00", true).await;

        let items = repo
            .list_confirmed_production_items("doc-1", &competencia())
            .await
            .expect("Should list items");

        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.confirmed));
        assert!(items.iter().all(|i| i.category != EarningsCategory::ProLabore));
        assert_eq!(items[0].gross_amount, dec!(500.00));
    }

    #[tokio::test]
    async fn pro_labore_items_are_only_confirmed_pro_labore() {
        let repo = setup_test_db().await;
        insert_item(&repo, "i1", "shift", "500.00", true).await;
        insert_item(&repo, "i2", "pro_labore", "3000.00", true).await;
        insert_item(&repo, "i3", "pro_labore", "1000.00", false).await;

        let items = repo
            .list_confirmed_pro_labore_items("doc-1", &competencia())
            .await
            .expect("Should list items");

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].gross_amount, dec!(3000.00));
        assert_eq!(items[0].category, EarningsCategory::ProLabore);
    }

    #[tokio::test]
    async fn missing_fiscal_profile_is_none() {
        let repo = setup_test_db().await;

        let profile = repo.get_fiscal_profile("doc-1").await.unwrap();

        assert!(profile.is_none());
    }

    #[tokio::test]
    async fn fiscal_profile_round_trips_custom_rates() {
        let repo = setup_test_db().await;
        sqlx::query(
            "INSERT INTO fiscal_profiles (
                doctor_id, dependent_count, withholds_inss, withholds_irrf,
                custom_inss_rate, custom_irrf_rate
            ) VALUES ('doc-1', 2, 1, 1, '0.11', NULL)",
        )
        .execute(repo.pool())
        .await
        .expect("Failed to insert profile");

        let profile = repo
            .get_fiscal_profile("doc-1")
            .await
            .expect("Should query profile")
            .expect("Should find profile");

        assert_eq!(profile.dependent_count, 2);
        assert!(profile.withholds_inss);
        assert!(profile.withholds_irrf);
        assert_eq!(profile.custom_inss_rate, Some(dec!(0.11)));
        assert_eq!(profile.custom_irrf_rate, None);
    }

    #[tokio::test]
    async fn create_and_get_production_settlement() {
        let repo = setup_test_db().await;

        let created = repo
            .create_production_settlement(new_production(vec![snapshot()]))
            .await
            .expect("Should create settlement");

        assert!(created.id > 0);
        assert_eq!(created.status, SettlementStatus::Draft);
        assert_eq!(created.gross_total, dec!(500.00));
        assert_eq!(created.net_total, dec!(450.00));
        assert_eq!(created.items.len(), 1);
        assert_eq!(created.items[0].source_id, "item-1");

        let fetched = repo
            .get_production_settlement(created.id)
            .await
            .expect("Should fetch settlement");
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn get_production_settlement_not_found() {
        let repo = setup_test_db().await;

        let result = repo.get_production_settlement(99999).await;

        assert_eq!(result, Err(RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn finalize_production_settlement_persists_audit_fields() {
        let repo = setup_test_db().await;
        let created = repo
            .create_production_settlement(new_production(vec![]))
            .await
            .expect("Should create settlement");

        let mut settlement = created.clone();
        settlement.finalize("user-2", Utc::now()).unwrap();
        repo.update_production_status(created.id, &settlement.status)
            .await
            .expect("Should finalize");

        let fetched = repo.get_production_settlement(created.id).await.unwrap();
        match fetched.status {
            SettlementStatus::Finalized { finalized_by, .. } => {
                assert_eq!(finalized_by, "user-2");
            }
            other => panic!("expected finalized status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn status_update_on_non_draft_is_a_conflict() {
        let repo = setup_test_db().await;
        let created = repo
            .create_production_settlement(new_production(vec![]))
            .await
            .expect("Should create settlement");

        let mut finalized = SettlementStatus::Draft;
        finalized.finalize("user-2", Utc::now()).unwrap();
        repo.update_production_status(created.id, &finalized)
            .await
            .expect("First transition should succeed");

        let mut cancelled = SettlementStatus::Draft;
        cancelled.cancel("user-3", Utc::now()).unwrap();
        let result = repo.update_production_status(created.id, &cancelled).await;

        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn status_update_on_unknown_id_is_not_found() {
        let repo = setup_test_db().await;

        let mut status = SettlementStatus::Draft;
        status.finalize("user-1", Utc::now()).unwrap();
        let result = repo.update_production_status(99999, &status).await;

        assert_eq!(result, Err(RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn only_one_finalized_settlement_per_period() {
        let repo = setup_test_db().await;
        let first = repo
            .create_production_settlement(new_production(vec![]))
            .await
            .expect("Should create first draft");
        let second = repo
            .create_production_settlement(new_production(vec![]))
            .await
            .expect("Should create second draft");

        let mut status = SettlementStatus::Draft;
        status.finalize("user-1", Utc::now()).unwrap();
        repo.update_production_status(first.id, &status)
            .await
            .expect("First finalize should succeed");

        let result = repo.update_production_status(second.id, &status).await;

        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn list_production_settlements_filters_by_doctor() {
        let repo = setup_test_db().await;
        repo.create_production_settlement(new_production(vec![]))
            .await
            .unwrap();
        let mut other = new_production(vec![]);
        other.doctor_id = "doc-2".to_string();
        repo.create_production_settlement(other).await.unwrap();

        let all = repo.list_production_settlements(None).await.unwrap();
        let doc1 = repo.list_production_settlements(Some("doc-1")).await.unwrap();

        assert_eq!(all.len(), 2);
        assert_eq!(doc1.len(), 1);
        assert_eq!(doc1[0].doctor_id, "doc-1");
    }

    #[tokio::test]
    async fn create_and_get_pro_labore_settlement() {
        let repo = setup_test_db().await;

        let created = repo
            .create_pro_labore_settlement(new_pro_labore())
            .await
            .expect("Should create settlement");

        assert!(created.id > 0);
        assert_eq!(created.status, SettlementStatus::Draft);
        assert_eq!(created.inss_withheld, dec!(263.06));
        assert_eq!(created.irrf_withheld, dec!(46.87));
        assert_eq!(created.net_total, dec!(2690.07));

        let fetched = repo
            .get_pro_labore_settlement(created.id)
            .await
            .expect("Should fetch settlement");
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn cancel_pro_labore_settlement_persists_audit_fields() {
        let repo = setup_test_db().await;
        let created = repo
            .create_pro_labore_settlement(new_pro_labore())
            .await
            .expect("Should create settlement");

        let mut status = SettlementStatus::Draft;
        status.cancel("user-2", Utc::now()).unwrap();
        repo.update_pro_labore_status(created.id, &status)
            .await
            .expect("Should cancel");

        let fetched = repo.get_pro_labore_settlement(created.id).await.unwrap();
        match fetched.status {
            SettlementStatus::Cancelled { cancelled_by, .. } => {
                assert_eq!(cancelled_by, "user-2");
            }
            other => panic!("expected cancelled status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn run_seeds_nonexistent_directory() {
        let repo = setup_test_db().await;

        let result = repo.run_seeds(Path::new("./nonexistent")).await;

        let err = result.expect_err("Should fail for nonexistent directory");
        assert_eq!(
            err.to_string(),
            "Failed to read seeds directory './nonexistent'"
        );
    }
}
