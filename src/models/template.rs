//! Compensation templates and the overrides they carry.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::FixedAllowance;

use super::Breakdown;

/// How an additional template earning is computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleKind {
    /// A fixed monthly amount.
    Flat {
        /// The monthly amount.
        monthly: Decimal,
    },
    /// A fraction of monthly basic.
    PercentOfBasic {
        /// The fraction applied.
        fraction: Decimal,
    },
    /// A fraction of monthly CTC.
    PercentOfCtc {
        /// The fraction applied.
        fraction: Decimal,
    },
    /// A restricted arithmetic expression over `CTC`, `MONTHLY_CTC`,
    /// `BASIC`, `HRA` and other rule codes; yields a monthly amount.
    Formula {
        /// The expression source.
        expression: String,
    },
}

/// An additional earning defined by a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningRule {
    /// Component code; also the identifier formulas use to refer to it.
    pub code: String,
    /// Human-readable name.
    pub name: String,
    /// How the amount is computed.
    pub kind: RuleKind,
    /// Whether the amount scales with payable days.
    #[serde(default)]
    pub prorated: bool,
}

/// Per-template or per-preview replacements for [`CompensationDefaults`].
///
/// `None` keeps the configured default.
///
/// [`CompensationDefaults`]: crate::config::CompensationDefaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureOverrides {
    /// Basic as a fraction of monthly CTC.
    pub basic_fraction: Option<Decimal>,
    /// HRA as a fraction of basic.
    pub hra_fraction: Option<Decimal>,
    /// Replaces the default fixed allowances entirely.
    pub fixed_allowances: Option<Vec<FixedAllowance>>,
    /// Employer PF fraction.
    pub employer_pf_fraction: Option<Decimal>,
    /// Employee PF fraction.
    pub employee_pf_fraction: Option<Decimal>,
    /// PF wage cap.
    pub pf_wage_cap: Option<Decimal>,
    /// Gratuity fraction.
    pub gratuity_fraction: Option<Decimal>,
    /// Flat monthly employer insurance.
    pub insurance_monthly: Option<Decimal>,
    /// Flat monthly professional tax.
    pub professional_tax: Option<Decimal>,
    /// Turns ESI on or off.
    pub esi_enabled: Option<bool>,
    /// Earnings added before the balancing allowance.
    pub additional_earnings: Vec<EarningRule>,
}

/// A tenant-owned reusable compensation structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensationTemplate {
    /// Unique identifier.
    pub id: Uuid,
    /// Display name (e.g., "Engineer L2").
    pub name: String,
    /// Free-form description; the only field editable once locked.
    pub description: Option<String>,
    /// Annual CTC.
    pub annual_ctc: Decimal,
    /// Monthly CTC.
    pub monthly_ctc: Decimal,
    /// The overrides the breakdown was resolved with.
    pub overrides: StructureOverrides,
    /// The resolved breakdown.
    pub breakdown: Breakdown,
    /// Set once an assignment references the template.
    pub locked: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTemplate {
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Annual CTC.
    pub annual_ctc: Decimal,
    /// Overrides for the resolver.
    #[serde(default)]
    pub overrides: StructureOverrides,
}

/// A structural change to an unlocked template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateChanges {
    /// New display name.
    pub name: Option<String>,
    /// New annual CTC.
    pub annual_ctc: Option<Decimal>,
    /// New overrides.
    pub overrides: Option<StructureOverrides>,
}

impl TemplateChanges {
    /// Returns true if nothing would change.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.annual_ctc.is_none() && self.overrides.is_none()
    }
}
