//! The tenant-scoped engine facade.
//!
//! [`PayrollEngine`] ties the resolver, the ledger and the payroll
//! orchestrator to one [`Store`] and one [`EngineConfig`]. Every operation
//! runs as a single unit of work under the store lock, so a failed call
//! leaves no partial state behind.

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::calculation::{self, LegacyRow};
use crate::config::{ConfigLoader, EngineConfig};
use crate::error::{EngineError, EngineResult};
use crate::ledger;
use crate::models::{
    Assignee, AttendanceRecord, AttendanceSnapshot, Breakdown, CompensationSnapshot,
    CompensationTemplate, Employee, NewRevision, NewTemplate, PayrollRun, PayslipItem, Period,
    Revision, StructureOverrides, TemplateChanges, TimelineEntry,
};
use crate::payroll;
use crate::store::Store;

/// What to preview a compensation structure from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum PreviewInput {
    /// An existing template's structure, optionally at a different CTC.
    Template {
        /// The template.
        template_id: Uuid,
        /// Overrides the template's CTC.
        #[serde(default)]
        annual_ctc: Option<Decimal>,
    },
    /// A CTC with optional structure overrides.
    Ctc {
        /// Annual cost to company.
        annual_ctc: Decimal,
        /// Structure overrides on top of the defaults.
        #[serde(default)]
        overrides: StructureOverrides,
    },
    /// Rows in the legacy tabular format.
    Rows {
        /// Annual cost to company the rows were drawn up for.
        annual_ctc: Decimal,
        /// The rows.
        rows: Vec<LegacyRow>,
    },
}

/// The payroll engine.
///
/// Cloning is cheap; clones share the same store.
///
/// # Example
///
/// ```
/// use payroll_engine::engine::{PayrollEngine, PreviewInput};
/// use payroll_engine::models::StructureOverrides;
/// use rust_decimal_macros::dec;
/// use uuid::Uuid;
///
/// let engine = PayrollEngine::with_defaults();
/// let breakdown = engine
///     .preview_compensation(
///         Uuid::new_v4(),
///         PreviewInput::Ctc {
///             annual_ctc: dec!(600000),
///             overrides: StructureOverrides::default(),
///         },
///     )
///     .unwrap();
/// assert_eq!(breakdown.totals.net_pay.monthly, dec!(44238));
/// ```
#[derive(Debug, Clone)]
pub struct PayrollEngine {
    store: Arc<Store>,
    config: Arc<EngineConfig>,
}

impl PayrollEngine {
    /// Creates an engine with an empty store.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            store: Arc::new(Store::new()),
            config: Arc::new(config),
        }
    }

    /// Creates an engine with the built-in defaults.
    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }

    /// Creates an engine from a configuration directory.
    pub fn from_config_dir<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let loader = ConfigLoader::load(path)?;
        Ok(Self::new(loader.into_config()))
    }

    /// The active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolves a structure without persisting anything.
    pub fn preview_compensation(
        &self,
        tenant_id: Uuid,
        input: PreviewInput,
    ) -> EngineResult<Breakdown> {
        let defaults = &self.config.compensation;
        let breakdown = match input {
            PreviewInput::Template {
                template_id,
                annual_ctc,
            } => {
                let (template_ctc, overrides) = self.store.read(tenant_id, |data| {
                    let template = data.template(template_id)?;
                    Ok((template.annual_ctc, template.overrides.clone()))
                })?;
                calculation::resolve(annual_ctc.unwrap_or(template_ctc), &overrides, defaults)?
            }
            PreviewInput::Ctc {
                annual_ctc,
                overrides,
            } => calculation::resolve(annual_ctc, &overrides, defaults)?,
            PreviewInput::Rows { annual_ctc, rows } => {
                calculation::breakdown_from_rows(&rows, annual_ctc, defaults)?
            }
        };
        debug!(
            tenant_id = %tenant_id,
            annual_ctc = %breakdown.annual_ctc,
            "Compensation previewed"
        );
        Ok(breakdown)
    }

    /// Creates a template, resolving its breakdown.
    pub fn create_template(
        &self,
        tenant_id: Uuid,
        new: NewTemplate,
    ) -> EngineResult<CompensationTemplate> {
        self.store.write(tenant_id, |data| {
            ledger::create_template(data, new, &self.config.compensation)
        })
    }

    /// Fetches a template.
    pub fn get_template(
        &self,
        tenant_id: Uuid,
        template_id: Uuid,
    ) -> EngineResult<CompensationTemplate> {
        self.store
            .read(tenant_id, |data| data.template(template_id).cloned())
    }

    /// Changes a template's description; allowed even when locked.
    pub fn update_template_description(
        &self,
        tenant_id: Uuid,
        template_id: Uuid,
        description: Option<String>,
    ) -> EngineResult<CompensationTemplate> {
        self.store.write(tenant_id, |data| {
            ledger::update_template_description(data, template_id, description)
        })
    }

    /// Changes a template's name, CTC or structure.
    pub fn update_template(
        &self,
        tenant_id: Uuid,
        template_id: Uuid,
        changes: TemplateChanges,
    ) -> EngineResult<CompensationTemplate> {
        self.store.write(tenant_id, |data| {
            ledger::update_template(data, template_id, changes, &self.config.compensation)
        })
    }

    /// Adds an employee record supplied by the HR platform.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the code or name is blank, or if the id is
    /// already registered.
    pub fn register_employee(&self, tenant_id: Uuid, employee: Employee) -> EngineResult<Employee> {
        if employee.code.trim().is_empty() {
            return Err(EngineError::validation("code", "must not be empty"));
        }
        if employee.name.trim().is_empty() {
            return Err(EngineError::validation("name", "must not be empty"));
        }
        self.store.write(tenant_id, |data| {
            if data.employees.contains_key(&employee.id) {
                return Err(EngineError::validation(
                    "id",
                    format!("employee {} is already registered", employee.id),
                ));
            }
            info!(
                tenant_id = %tenant_id,
                employee_id = %employee.id,
                "Employee registered"
            );
            data.employees.insert(employee.id, employee.clone());
            Ok(employee)
        })
    }

    /// Fetches an employee.
    pub fn get_employee(&self, tenant_id: Uuid, employee_id: Uuid) -> EngineResult<Employee> {
        self.store
            .read(tenant_id, |data| data.employee(employee_id).cloned())
    }

    /// Freezes a template as an employee's or applicant's first snapshot.
    pub fn assign_compensation(
        &self,
        tenant_id: Uuid,
        assignee: Assignee,
        template_id: Uuid,
        effective_from: NaiveDate,
    ) -> EngineResult<CompensationSnapshot> {
        self.store.write(tenant_id, |data| {
            ledger::assign_compensation(data, assignee, template_id, effective_from)
        })
    }

    /// Drafts a revision against the employee's current snapshot.
    pub fn create_revision(&self, tenant_id: Uuid, new: NewRevision) -> EngineResult<Revision> {
        self.store.write(tenant_id, |data| {
            ledger::create_revision(data, new, &self.config.compensation)
        })
    }

    /// Fetches a revision.
    pub fn get_revision(&self, tenant_id: Uuid, revision_id: Uuid) -> EngineResult<Revision> {
        self.store
            .read(tenant_id, |data| data.revision(revision_id).cloned())
    }

    /// Moves a draft revision to pending approval.
    pub fn submit_revision(&self, tenant_id: Uuid, revision_id: Uuid) -> EngineResult<Revision> {
        self.store
            .write(tenant_id, |data| ledger::submit_revision(data, revision_id))
    }

    /// Approves a revision, appending the next snapshot version.
    ///
    /// Both `DRAFT` and `PENDING_APPROVAL` revisions can be approved; a
    /// draft does not need to be submitted first.
    pub fn approve_revision(
        &self,
        tenant_id: Uuid,
        revision_id: Uuid,
        approved_by: &str,
    ) -> EngineResult<(Revision, CompensationSnapshot)> {
        self.store.write(tenant_id, |data| {
            ledger::approve_revision(data, revision_id, approved_by)
        })
    }

    /// Rejects a revision with a reason.
    pub fn reject_revision(
        &self,
        tenant_id: Uuid,
        revision_id: Uuid,
        rejected_by: &str,
        reason: &str,
    ) -> EngineResult<Revision> {
        self.store.write(tenant_id, |data| {
            ledger::reject_revision(data, revision_id, rejected_by, reason)
        })
    }

    /// Deletes a draft revision.
    pub fn delete_revision(&self, tenant_id: Uuid, revision_id: Uuid) -> EngineResult<()> {
        self.store
            .write(tenant_id, |data| ledger::delete_revision(data, revision_id))
    }

    /// An employee's compensation history, most recent first.
    pub fn get_timeline(
        &self,
        tenant_id: Uuid,
        employee_id: Uuid,
    ) -> EngineResult<Vec<TimelineEntry>> {
        self.store
            .read(tenant_id, |data| ledger::get_timeline(data, employee_id))
    }

    /// Every snapshot of an assignee, oldest version first.
    pub fn snapshot_history(
        &self,
        tenant_id: Uuid,
        assignee: Assignee,
    ) -> EngineResult<Vec<CompensationSnapshot>> {
        self.store
            .read(tenant_id, |data| Ok(data.snapshots_for(assignee).to_vec()))
    }

    /// The highest snapshot version of an assignee.
    pub fn current_snapshot(
        &self,
        tenant_id: Uuid,
        assignee: Assignee,
    ) -> EngineResult<CompensationSnapshot> {
        self.store.read(tenant_id, |data| {
            data.current_snapshot(assignee)
                .cloned()
                .ok_or_else(|| EngineError::not_found("Compensation snapshot", assignee))
        })
    }

    /// Stores raw attendance records.
    pub fn record_attendance(
        &self,
        tenant_id: Uuid,
        records: Vec<AttendanceRecord>,
    ) -> EngineResult<usize> {
        self.store
            .write(tenant_id, |data| payroll::record_attendance(data, records))
    }

    /// Freezes attendance summaries for a period.
    pub fn freeze_attendance(
        &self,
        tenant_id: Uuid,
        period: Period,
    ) -> EngineResult<Vec<AttendanceSnapshot>> {
        self.store.write(tenant_id, |data| {
            payroll::freeze_attendance(data, period, &self.config.attendance)
        })
    }

    /// Starts or restarts the run for a month.
    pub fn initiate_run(
        &self,
        tenant_id: Uuid,
        month: u32,
        year: i32,
        initiated_by: &str,
    ) -> EngineResult<PayrollRun> {
        let period = Period::new(year, month)?;
        self.store.write(tenant_id, |data| {
            payroll::initiate_run(data, tenant_id, period, initiated_by)
        })
    }

    /// Fetches a run.
    pub fn get_run(&self, tenant_id: Uuid, run_id: Uuid) -> EngineResult<PayrollRun> {
        self.store.read(tenant_id, |data| data.run(run_id).cloned())
    }

    /// Generates payslips for a run.
    pub fn calculate_run(&self, tenant_id: Uuid, run_id: Uuid) -> EngineResult<PayrollRun> {
        self.store
            .write(tenant_id, |data| payroll::calculate_run(data, run_id))
    }

    /// A run's payslips.
    pub fn payslips(&self, tenant_id: Uuid, run_id: Uuid) -> EngineResult<Vec<PayslipItem>> {
        self.store
            .read(tenant_id, |data| payroll::payslips(data, run_id))
    }

    /// Approves a calculated run.
    pub fn approve_run(
        &self,
        tenant_id: Uuid,
        run_id: Uuid,
        approved_by: &str,
    ) -> EngineResult<PayrollRun> {
        self.store
            .write(tenant_id, |data| payroll::approve_run(data, run_id, approved_by))
    }

    /// Marks an approved run as paid.
    pub fn mark_run_paid(
        &self,
        tenant_id: Uuid,
        run_id: Uuid,
        paid_by: &str,
    ) -> EngineResult<PayrollRun> {
        self.store
            .write(tenant_id, |data| payroll::mark_run_paid(data, run_id, paid_by))
    }

    /// Cancels a run that is not yet paid.
    pub fn cancel_run(&self, tenant_id: Uuid, run_id: Uuid) -> EngineResult<PayrollRun> {
        self.store
            .write(tenant_id, |data| payroll::cancel_run(data, run_id))
    }
}

impl Default for PayrollEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}
