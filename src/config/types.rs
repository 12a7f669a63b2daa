//! Configuration types for compensation resolution and attendance.
//!
//! This module contains the strongly-typed configuration structures that
//! are deserialized from YAML configuration files. Every recognized option
//! is enumerated here; call sites never invent their own fallbacks.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Hard ceiling for `max_annual_ctc`. Every other configured amount is
/// bounded by `max_annual_ctc`, which keeps resolver arithmetic far from
/// `Decimal` overflow.
pub const AMOUNT_CEILING: Decimal = dec!(1000000000000000);

/// A fixed monthly allowance added verbatim to the earnings list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedAllowance {
    /// Component code (e.g., "CONVEYANCE").
    pub code: String,
    /// Human-readable component name.
    pub name: String,
    /// The monthly amount.
    pub monthly: Decimal,
    /// Keep the line even when the amount is zero.
    #[serde(default)]
    pub required: bool,
    /// Scale the amount by payable days in payroll runs.
    #[serde(default)]
    pub prorated: bool,
}

impl FixedAllowance {
    /// Creates a non-prorated, optional allowance.
    pub fn new(code: &str, name: &str, monthly: Decimal) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            monthly,
            required: false,
            prorated: false,
        }
    }
}

/// Employees' State Insurance settings.
///
/// ESI applies only while the provisional monthly gross is at or below
/// `wage_ceiling`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EsiSettings {
    /// Whether ESI is computed at all.
    pub enabled: bool,
    /// Employer contribution as a fraction of gross.
    pub employer_fraction: Decimal,
    /// Employee contribution as a fraction of gross.
    pub employee_fraction: Decimal,
    /// Monthly gross at or below which ESI applies.
    pub wage_ceiling: Decimal,
}

impl Default for EsiSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            employer_fraction: dec!(0.0325),
            employee_fraction: dec!(0.0075),
            wage_ceiling: dec!(21000),
        }
    }
}

/// The single source of defaults for the compensation structure resolver.
///
/// Overrides supplied per template or per preview replace individual
/// fields; anything not overridden comes from here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompensationDefaults {
    /// Basic salary as a fraction of monthly CTC.
    pub basic_fraction: Decimal,
    /// HRA as a fraction of basic.
    pub hra_fraction: Decimal,
    /// Fixed monthly allowances.
    pub fixed_allowances: Vec<FixedAllowance>,
    /// Employer PF as a fraction of the PF wage.
    pub employer_pf_fraction: Decimal,
    /// Employee PF as a fraction of the PF wage.
    pub employee_pf_fraction: Decimal,
    /// Upper bound on the PF wage; `None` means basic is used uncapped.
    pub pf_wage_cap: Option<Decimal>,
    /// Gratuity as a fraction of basic.
    pub gratuity_fraction: Decimal,
    /// Flat monthly employer insurance premium (omitted when zero).
    pub insurance_monthly: Decimal,
    /// Flat monthly professional tax.
    pub professional_tax: Decimal,
    /// ESI settings.
    pub esi: EsiSettings,
    /// Whether HRA scales with payable days.
    pub prorate_hra: bool,
    /// Whether the balancing special allowance scales with payable days.
    pub prorate_special_allowance: bool,
    /// Allowed drift between calculated and input CTC before warning.
    pub reconciliation_tolerance: Decimal,
    /// Largest annual CTC accepted.
    pub max_annual_ctc: Decimal,
}

impl Default for CompensationDefaults {
    fn default() -> Self {
        Self {
            basic_fraction: dec!(0.40),
            hra_fraction: dec!(0.40),
            fixed_allowances: vec![
                FixedAllowance::new("CONVEYANCE", "Conveyance Allowance", dec!(1600)),
                FixedAllowance::new("MEDICAL", "Medical Allowance", dec!(1250)),
                FixedAllowance::new("EDUCATION", "Children Education Allowance", dec!(100)),
            ],
            employer_pf_fraction: dec!(0.11),
            employee_pf_fraction: dec!(0.12),
            pf_wage_cap: None,
            gratuity_fraction: dec!(0.0481),
            insurance_monthly: Decimal::ZERO,
            professional_tax: dec!(200),
            esi: EsiSettings::default(),
            prorate_hra: true,
            prorate_special_allowance: true,
            reconciliation_tolerance: Decimal::ONE,
            max_annual_ctc: dec!(1000000000),
        }
    }
}

impl CompensationDefaults {
    /// Checks that every fraction and amount is in range.
    pub fn validate(&self) -> EngineResult<()> {
        if self.max_annual_ctc <= Decimal::ZERO || self.max_annual_ctc > AMOUNT_CEILING {
            return Err(EngineError::validation(
                "max_annual_ctc",
                format!("must be greater than zero and at most {}", AMOUNT_CEILING),
            ));
        }
        check_fraction("basic_fraction", self.basic_fraction)?;
        if self.basic_fraction.is_zero() {
            return Err(EngineError::validation(
                "basic_fraction",
                "must be greater than zero",
            ));
        }
        check_fraction("hra_fraction", self.hra_fraction)?;
        check_fraction("employer_pf_fraction", self.employer_pf_fraction)?;
        check_fraction("employee_pf_fraction", self.employee_pf_fraction)?;
        check_fraction("gratuity_fraction", self.gratuity_fraction)?;
        check_fraction("esi.employer_fraction", self.esi.employer_fraction)?;
        check_fraction("esi.employee_fraction", self.esi.employee_fraction)?;
        let max = self.max_annual_ctc;
        check_amount("insurance_monthly", self.insurance_monthly, max)?;
        check_amount("professional_tax", self.professional_tax, max)?;
        check_amount("esi.wage_ceiling", self.esi.wage_ceiling, max)?;
        check_amount("reconciliation_tolerance", self.reconciliation_tolerance, max)?;
        if let Some(cap) = self.pf_wage_cap {
            check_amount("pf_wage_cap", cap, max)?;
        }
        for allowance in &self.fixed_allowances {
            check_amount(
                &format!("fixed_allowances.{}", allowance.code),
                allowance.monthly,
                max,
            )?;
        }
        Ok(())
    }
}

/// Settings for summarizing raw attendance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendanceSettings {
    /// How much of a day a half-day mark counts as present.
    pub half_day_weight: Decimal,
    /// Whether weekly-offs count toward payable days.
    pub weekly_offs_payable: bool,
}

impl Default for AttendanceSettings {
    fn default() -> Self {
        Self {
            half_day_weight: dec!(0.5),
            weekly_offs_payable: true,
        }
    }
}

/// The complete engine configuration loaded from YAML files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Compensation resolver defaults.
    pub compensation: CompensationDefaults,
    /// Attendance summary settings.
    pub attendance: AttendanceSettings,
}

pub(crate) fn check_fraction(field: &str, value: Decimal) -> EngineResult<()> {
    if value < Decimal::ZERO || value > Decimal::ONE {
        return Err(EngineError::validation(
            field,
            format!("fraction {} must be between 0 and 1", value),
        ));
    }
    Ok(())
}

/// Checks that an amount is neither negative nor above `max`.
pub(crate) fn check_amount(field: &str, value: Decimal, max: Decimal) -> EngineResult<()> {
    if value < Decimal::ZERO {
        return Err(EngineError::validation(
            field,
            format!("amount {} must not be negative", value),
        ));
    }
    if value > max {
        return Err(EngineError::validation(
            field,
            format!("amount {} must not exceed {}", value, max),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_fixed_allowances_total_2950() {
        let defaults = CompensationDefaults::default();
        let total: Decimal = defaults.fixed_allowances.iter().map(|a| a.monthly).sum();
        assert_eq!(total, dec!(2950));
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(CompensationDefaults::default().validate().is_ok());
    }

    #[test]
    fn test_fraction_above_one_is_rejected() {
        let defaults = CompensationDefaults {
            hra_fraction: dec!(1.5),
            ..CompensationDefaults::default()
        };
        match defaults.validate() {
            Err(EngineError::Validation { field, .. }) => assert_eq!(field, "hra_fraction"),
            other => panic!("Expected Validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_basic_fraction_is_rejected() {
        let defaults = CompensationDefaults {
            basic_fraction: Decimal::ZERO,
            ..CompensationDefaults::default()
        };
        assert!(defaults.validate().is_err());
    }

    #[test]
    fn test_amounts_above_max_ctc_are_rejected() {
        let defaults = CompensationDefaults {
            fixed_allowances: vec![FixedAllowance::new("BIG", "Big", Decimal::MAX / dec!(2))],
            ..CompensationDefaults::default()
        };
        match defaults.validate() {
            Err(EngineError::Validation { field, .. }) => {
                assert_eq!(field, "fixed_allowances.BIG")
            }
            other => panic!("Expected Validation error, got {:?}", other),
        }

        let defaults = CompensationDefaults {
            professional_tax: dec!(1000000001),
            ..CompensationDefaults::default()
        };
        assert!(defaults.validate().is_err());
    }

    #[test]
    fn test_max_annual_ctc_is_bounded() {
        let defaults = CompensationDefaults {
            max_annual_ctc: AMOUNT_CEILING + Decimal::ONE,
            ..CompensationDefaults::default()
        };
        match defaults.validate() {
            Err(EngineError::Validation { field, .. }) => assert_eq!(field, "max_annual_ctc"),
            other => panic!("Expected Validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_partial_yaml_falls_back_to_defaults() {
        let yaml = "basic_fraction: \"0.50\"\n";
        let defaults: CompensationDefaults = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(defaults.basic_fraction, dec!(0.50));
        assert_eq!(defaults.hra_fraction, dec!(0.40));
        assert_eq!(defaults.professional_tax, dec!(200));
        assert!(defaults.esi.enabled);
    }
}
