//! The canonical compensation breakdown.
//!
//! This module contains the [`Breakdown`] type produced by the structure
//! resolver and frozen into snapshots, its component lines and totals, and
//! the audit trace recording every resolution step.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calculation::round_currency;

/// Well-known component codes.
pub mod codes {
    /// Basic salary.
    pub const BASIC: &str = "BASIC";
    /// House rent allowance.
    pub const HRA: &str = "HRA";
    /// The balancing special allowance.
    pub const SPECIAL_ALLOWANCE: &str = "SPECIAL_ALLOWANCE";
    /// Employer provident fund contribution.
    pub const EMPLOYER_PF: &str = "EMPLOYER_PF";
    /// Gratuity provision.
    pub const GRATUITY: &str = "GRATUITY";
    /// Flat employer insurance premium.
    pub const INSURANCE: &str = "INSURANCE";
    /// Employer ESI contribution.
    pub const EMPLOYER_ESI: &str = "EMPLOYER_ESI";
    /// Employee provident fund contribution.
    pub const EMPLOYEE_PF: &str = "EMPLOYEE_PF";
    /// Professional tax.
    pub const PROFESSIONAL_TAX: &str = "PROFESSIONAL_TAX";
    /// Employee ESI contribution.
    pub const EMPLOYEE_ESI: &str = "EMPLOYEE_ESI";
}

/// A monthly amount with its annualized counterpart.
///
/// # Example
///
/// ```
/// use payroll_engine::models::Amount;
/// use rust_decimal_macros::dec;
///
/// let amount = Amount::from_monthly(dec!(1333.33));
/// assert_eq!(amount.annual, dec!(15999.96));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Amount {
    /// The monthly amount.
    pub monthly: Decimal,
    /// The annual amount.
    pub annual: Decimal,
}

impl Amount {
    /// A zero amount.
    pub const ZERO: Amount = Amount {
        monthly: Decimal::ZERO,
        annual: Decimal::ZERO,
    };

    /// Builds an amount from a monthly figure; the annual figure is
    /// `monthly × 12`, rounded.
    pub fn from_monthly(monthly: Decimal) -> Self {
        let monthly = round_currency(monthly);
        Self {
            monthly,
            annual: round_currency(monthly * Decimal::from(12)),
        }
    }

    /// Builds an amount from an annual figure; the monthly figure is
    /// `annual / 12`, rounded.
    pub fn from_annual(annual: Decimal) -> Self {
        let annual = round_currency(annual);
        Self {
            monthly: round_currency(annual / Decimal::from(12)),
            annual,
        }
    }

    /// Component-wise sum.
    pub fn plus(self, other: Amount) -> Amount {
        Amount {
            monthly: self.monthly + other.monthly,
            annual: self.annual + other.annual,
        }
    }

    /// Component-wise difference.
    pub fn minus(self, other: Amount) -> Amount {
        Amount {
            monthly: self.monthly - other.monthly,
            annual: self.annual - other.annual,
        }
    }

    /// Sums a sequence of amounts.
    pub fn sum<'a>(amounts: impl IntoIterator<Item = &'a Amount>) -> Amount {
        amounts.into_iter().fold(Amount::ZERO, |acc, a| acc.plus(*a))
    }

    /// Like [`Amount::from_monthly`], but `None` on overflow.
    pub fn checked_from_monthly(monthly: Decimal) -> Option<Self> {
        let monthly = round_currency(monthly);
        let annual = monthly.checked_mul(Decimal::from(12))?;
        Some(Self {
            monthly,
            annual: round_currency(annual),
        })
    }

    /// Component-wise sum, `None` on overflow.
    pub fn checked_plus(self, other: Amount) -> Option<Amount> {
        Some(Amount {
            monthly: self.monthly.checked_add(other.monthly)?,
            annual: self.annual.checked_add(other.annual)?,
        })
    }

    /// Sums a sequence of amounts, `None` on overflow.
    pub fn checked_sum<'a>(amounts: impl IntoIterator<Item = &'a Amount>) -> Option<Amount> {
        amounts
            .into_iter()
            .try_fold(Amount::ZERO, |acc, a| acc.checked_plus(*a))
    }
}

/// How a component's amount was derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CalculationKind {
    /// A fixed monthly amount.
    Flat,
    /// A fraction of monthly basic.
    PercentOfBasic {
        /// The fraction applied (0.40 = 40%).
        fraction: Decimal,
    },
    /// A fraction of monthly CTC.
    PercentOfCtc {
        /// The fraction applied.
        fraction: Decimal,
    },
    /// An evaluated formula expression.
    Formula,
    /// The residual that reconciles the breakdown with CTC.
    Balancing,
}

/// One itemized line of a breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentLine {
    /// Component code (e.g., "BASIC").
    pub code: String,
    /// Human-readable name.
    pub name: String,
    /// How the amount was derived.
    pub calculation: CalculationKind,
    /// The resolved amount.
    pub amount: Amount,
    /// The derivation as an expression (e.g., "BASIC * 0.40").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    /// Whether the amount was computed by the resolver rather than imported.
    pub resolved: bool,
    /// Whether the amount scales with payable days in a payroll run.
    pub prorated: bool,
}

/// Aggregate totals of a breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownTotals {
    /// Gross A: sum of earnings.
    pub gross_a: Amount,
    /// Gross B: Gross A plus gratuity.
    pub gross_b: Amount,
    /// Gross C: Gross A plus every employer benefit.
    pub gross_c: Amount,
    /// Sum of employer benefits.
    pub total_benefits: Amount,
    /// Sum of employee deductions.
    pub total_deductions: Amount,
    /// Take-home: Gross A minus deductions.
    pub net_pay: Amount,
    /// Annual earnings plus annual benefits.
    pub calculated_ctc: Decimal,
}

impl BreakdownTotals {
    /// Derives totals from the three component lists.
    pub fn from_lines(
        earnings: &[ComponentLine],
        benefits: &[ComponentLine],
        deductions: &[ComponentLine],
    ) -> Self {
        let gross_a = Amount::sum(earnings.iter().map(|l| &l.amount));
        let total_benefits = Amount::sum(benefits.iter().map(|l| &l.amount));
        let total_deductions = Amount::sum(deductions.iter().map(|l| &l.amount));
        let gratuity = benefits
            .iter()
            .find(|l| l.code == codes::GRATUITY)
            .map(|l| l.amount)
            .unwrap_or(Amount::ZERO);

        Self {
            gross_a,
            gross_b: gross_a.plus(gratuity),
            gross_c: gross_a.plus(total_benefits),
            total_benefits,
            total_deductions,
            net_pay: gross_a.minus(total_deductions),
            calculated_ctc: gross_a.annual + total_benefits.annual,
        }
    }
}

/// A single step in the audit trace recording a resolution decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStep {
    /// The sequential step number.
    pub step_number: u32,
    /// The unique identifier of the rule that was applied.
    pub rule_id: String,
    /// The human-readable name of the rule.
    pub rule_name: String,
    /// The input data for this step.
    pub input: serde_json::Value,
    /// The output data from this step.
    pub output: serde_json::Value,
    /// Human-readable explanation of the decision.
    pub reasoning: String,
}

/// A warning generated during resolution.
///
/// Warnings indicate potential issues that don't prevent resolution
/// but may require attention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditWarning {
    /// A code identifying the type of warning.
    pub code: String,
    /// A human-readable description of the warning.
    pub message: String,
    /// The severity level (e.g., "low", "medium", "high").
    pub severity: String,
}

/// The complete audit trace for a resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTrace {
    /// The sequence of resolution steps.
    pub steps: Vec<AuditStep>,
    /// Any warnings generated during resolution.
    pub warnings: Vec<AuditWarning>,
}

/// A complete, reconciled compensation breakdown.
///
/// This is the one canonical representation of a compensation structure.
/// Templates, snapshots and revisions all hold a `Breakdown`; legacy row
/// formats are produced only through [`crate::calculation::legacy`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakdown {
    /// The annual cost-to-company this breakdown reconciles against.
    pub annual_ctc: Decimal,
    /// `annual_ctc / 12`, rounded.
    pub monthly_ctc: Decimal,
    /// Earnings paid to the employee.
    pub earnings: Vec<ComponentLine>,
    /// Employer-side costs that are part of CTC but not paid out.
    pub employer_benefits: Vec<ComponentLine>,
    /// Employee-side deductions from gross.
    pub employee_deductions: Vec<ComponentLine>,
    /// Aggregate totals.
    pub totals: BreakdownTotals,
    /// How the breakdown was derived.
    pub audit_trace: AuditTrace,
}

impl Breakdown {
    /// Finds an earning by code.
    pub fn earning(&self, code: &str) -> Option<&ComponentLine> {
        self.earnings.iter().find(|l| l.code == code)
    }

    /// Finds an employer benefit by code.
    pub fn benefit(&self, code: &str) -> Option<&ComponentLine> {
        self.employer_benefits.iter().find(|l| l.code == code)
    }

    /// Finds an employee deduction by code.
    pub fn deduction(&self, code: &str) -> Option<&ComponentLine> {
        self.employee_deductions.iter().find(|l| l.code == code)
    }

    /// Difference between the calculated and stated annual CTC.
    pub fn reconciliation_difference(&self) -> Decimal {
        self.totals.calculated_ctc - self.annual_ctc
    }

    /// Whether the breakdown reconciles with its CTC within `tolerance`.
    pub fn is_reconciled(&self, tolerance: Decimal) -> bool {
        self.reconciliation_difference().abs() <= tolerance
    }
}
