use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when parsing a competência string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompetenciaError {
    /// The input does not follow the `YYYY-MM` format.
    #[error("competência must use the YYYY-MM format, got '{0}'")]
    Malformed(String),

    /// The month component is outside 01..=12.
    #[error("competência month must be between 01 and 12, got {0:02}")]
    MonthOutOfRange(u32),
}

/// A billing period identified by year and month, written `YYYY-MM`.
///
/// All settlement computations are scoped to a competência; the fiscal
/// year used for bracket resolution is its year component.
///
/// ```
/// use medflow_core::Competencia;
///
/// let comp: Competencia = "2023-07".parse().unwrap();
/// assert_eq!(comp.year(), 2023);
/// assert_eq!(comp.month(), 7);
/// assert_eq!(comp.to_string(), "2023-07");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Competencia {
    year: i32,
    month: u32,
}

impl Competencia {
    pub fn new(year: i32, month: u32) -> Result<Self, CompetenciaError> {
        if !(1..=12).contains(&month) {
            return Err(CompetenciaError::MonthOutOfRange(month));
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The fiscal year governing bracket-table resolution for this period.
    pub fn fiscal_year(&self) -> i32 {
        self.year
    }
}

impl FromStr for Competencia {
    type Err = CompetenciaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || CompetenciaError::Malformed(s.to_string());

        let (year_part, month_part) = s.split_once('-').ok_or_else(malformed)?;
        if year_part.len() != 4 || month_part.len() != 2 {
            return Err(malformed());
        }
        if !year_part.chars().all(|c| c.is_ascii_digit())
            || !month_part.chars().all(|c| c.is_ascii_digit())
        {
            return Err(malformed());
        }

        let year: i32 = year_part.parse().map_err(|_| malformed())?;
        let month: u32 = month_part.parse().map_err(|_| malformed())?;
        Self::new(year, month)
    }
}

impl fmt::Display for Competencia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}
