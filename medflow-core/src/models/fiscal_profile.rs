use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Per-doctor withholding configuration.
///
/// Custom rates, when present, bypass bracket lookup entirely. A doctor
/// without a stored profile withholds nothing; use [`Self::no_withholding`]
/// for that default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalProfile {
    pub doctor_id: String,
    pub dependent_count: u32,
    pub withholds_inss: bool,
    pub withholds_irrf: bool,
    pub custom_inss_rate: Option<Decimal>,
    pub custom_irrf_rate: Option<Decimal>,
}

impl FiscalProfile {
    /// Default profile for doctors with no fiscal record on file.
    pub fn no_withholding(doctor_id: &str) -> Self {
        Self {
            doctor_id: doctor_id.to_string(),
            dependent_count: 0,
            withholds_inss: false,
            withholds_irrf: false,
            custom_inss_rate: None,
            custom_irrf_rate: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn no_withholding_profile_retains_nothing() {
        let profile = FiscalProfile::no_withholding("doc-7");
        assert_eq!(profile.doctor_id, "doc-7");
        assert!(!profile.withholds_inss);
        assert!(!profile.withholds_irrf);
        assert_eq!(profile.dependent_count, 0);
        assert_eq!(profile.custom_inss_rate, None);
        assert_eq!(profile.custom_irrf_rate, None);
    }
}
