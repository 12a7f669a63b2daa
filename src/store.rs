//! Tenant-scoped in-memory data store.
//!
//! Each tenant's records live in one [`TenantData`]. Reads and writes go
//! through closures executed under a single `RwLock`, so every engine
//! operation is one unit of work. Write closures validate before they
//! mutate; an `Err` from a closure leaves the tenant untouched.
//!
//! A panic inside a closure poisons the lock. Since closures validate
//! before they mutate, the data is still consistent and the store keeps
//! serving every tenant from the recovered guard.

use std::collections::{BTreeMap, HashMap};
use std::sync::{LockResult, RwLock};

use chrono::NaiveDate;
use tracing::warn;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::{
    Assignee, AttendanceRecord, AttendanceSnapshot, CompensationSnapshot, CompensationTemplate,
    Employee, PayrollRun, PayslipItem, Period, Revision,
};

/// Everything the engine stores for one tenant.
#[derive(Debug, Clone, Default)]
pub struct TenantData {
    /// Employee directory.
    pub employees: HashMap<Uuid, Employee>,
    /// Compensation templates.
    pub templates: HashMap<Uuid, CompensationTemplate>,
    /// Snapshot history per assignee, in version order. Append-only.
    pub(crate) snapshots: HashMap<Assignee, Vec<CompensationSnapshot>>,
    /// Revisions by id.
    pub revisions: HashMap<Uuid, Revision>,
    /// Raw attendance per employee, one record per date.
    pub attendance_records: HashMap<Uuid, BTreeMap<NaiveDate, AttendanceRecord>>,
    /// Frozen attendance per employee and period.
    pub attendance_snapshots: HashMap<(Uuid, Period), AttendanceSnapshot>,
    /// Payroll runs by id.
    pub runs: HashMap<Uuid, PayrollRun>,
    /// Payslip items per run.
    pub payslips: HashMap<Uuid, Vec<PayslipItem>>,
}

impl TenantData {
    /// Looks up an employee.
    pub fn employee(&self, id: Uuid) -> EngineResult<&Employee> {
        self.employees
            .get(&id)
            .ok_or_else(|| EngineError::not_found("Employee", id))
    }

    /// Looks up a template.
    pub fn template(&self, id: Uuid) -> EngineResult<&CompensationTemplate> {
        self.templates
            .get(&id)
            .ok_or_else(|| EngineError::not_found("Template", id))
    }

    /// Looks up a revision.
    pub fn revision(&self, id: Uuid) -> EngineResult<&Revision> {
        self.revisions
            .get(&id)
            .ok_or_else(|| EngineError::not_found("Revision", id))
    }

    /// Looks up a payroll run.
    pub fn run(&self, id: Uuid) -> EngineResult<&PayrollRun> {
        self.runs
            .get(&id)
            .ok_or_else(|| EngineError::not_found("Payroll run", id))
    }

    /// The run for a period, if one was ever initiated.
    pub fn run_for_period(&self, period: Period) -> Option<&PayrollRun> {
        self.runs.values().find(|r| r.period == period)
    }

    /// Fails with `AttendanceLocked` if a run has consumed the period.
    pub fn ensure_attendance_unlocked(&self, period: Period) -> EngineResult<()> {
        match self.run_for_period(period) {
            Some(run) if run.status.locks_attendance() => Err(EngineError::AttendanceLocked {
                period: period.to_string(),
                run_id: run.id,
            }),
            _ => Ok(()),
        }
    }

    /// An assignee's snapshots in version order.
    pub fn snapshots_for(&self, assignee: Assignee) -> &[CompensationSnapshot] {
        self.snapshots
            .get(&assignee)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The latest snapshot for an assignee.
    pub fn current_snapshot(&self, assignee: Assignee) -> Option<&CompensationSnapshot> {
        self.snapshots_for(assignee).last()
    }

    /// The latest snapshot already in effect on `date`.
    pub fn effective_snapshot(
        &self,
        assignee: Assignee,
        date: NaiveDate,
    ) -> Option<&CompensationSnapshot> {
        self.snapshots_for(assignee)
            .iter()
            .rev()
            .find(|s| s.effective_from <= date)
    }

    /// Appends a snapshot to its assignee's history.
    ///
    /// The snapshot's version must be exactly one past the current one.
    pub(crate) fn append_snapshot(&mut self, snapshot: CompensationSnapshot) -> EngineResult<()> {
        let expected = self
            .current_snapshot(snapshot.assignee)
            .map_or(1, |s| s.version + 1);
        if snapshot.version != expected {
            return Err(EngineError::Storage {
                message: format!(
                    "snapshot version {} for {} does not follow version {}",
                    snapshot.version,
                    snapshot.assignee,
                    expected - 1
                ),
            });
        }
        self.snapshots
            .entry(snapshot.assignee)
            .or_default()
            .push(snapshot);
        Ok(())
    }
}

/// The engine's data store.
///
/// # Example
///
/// ```
/// use payroll_engine::store::Store;
/// use uuid::Uuid;
///
/// let store = Store::new();
/// let tenant = Uuid::new_v4();
/// let count = store.read(tenant, |data| Ok(data.employees.len())).unwrap();
/// assert_eq!(count, 0);
/// ```
#[derive(Debug, Default)]
pub struct Store {
    tenants: RwLock<HashMap<Uuid, TenantData>>,
}

impl Store {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` against a tenant's data under the read lock.
    ///
    /// Unknown tenants read as empty.
    pub fn read<T>(
        &self,
        tenant_id: Uuid,
        f: impl FnOnce(&TenantData) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let tenants = recover(self.tenants.read());
        match tenants.get(&tenant_id) {
            Some(data) => f(data),
            None => f(&TenantData::default()),
        }
    }

    /// Runs `f` against a tenant's data under the write lock.
    pub fn write<T>(
        &self,
        tenant_id: Uuid,
        f: impl FnOnce(&mut TenantData) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let mut tenants = recover(self.tenants.write());
        f(tenants.entry(tenant_id).or_default())
    }
}

fn recover<G>(result: LockResult<G>) -> G {
    result.unwrap_or_else(|poisoned| {
        warn!("Store lock was poisoned by a panicking operation; recovering");
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculation::resolve_with_defaults;
    use crate::models::{RunStatus, SnapshotSource};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn snapshot(assignee: Assignee, version: u32, effective_from: NaiveDate) -> CompensationSnapshot {
        CompensationSnapshot {
            id: Uuid::new_v4(),
            assignee,
            version,
            effective_from,
            annual_ctc: dec!(600000),
            breakdown: resolve_with_defaults(dec!(600000)).unwrap(),
            template_id: None,
            source: SnapshotSource::Assignment,
            locked: true,
            locked_at: Utc::now(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_append_requires_consecutive_versions() {
        let mut data = TenantData::default();
        let assignee = Assignee::Employee(Uuid::new_v4());

        assert!(data.append_snapshot(snapshot(assignee, 2, date(2025, 1, 1))).is_err());
        data.append_snapshot(snapshot(assignee, 1, date(2025, 1, 1))).unwrap();
        assert!(data.append_snapshot(snapshot(assignee, 1, date(2025, 6, 1))).is_err());
        data.append_snapshot(snapshot(assignee, 2, date(2025, 6, 1))).unwrap();

        assert_eq!(data.snapshots_for(assignee).len(), 2);
        assert_eq!(data.current_snapshot(assignee).unwrap().version, 2);
    }

    #[test]
    fn test_effective_snapshot_respects_dates() {
        let mut data = TenantData::default();
        let assignee = Assignee::Employee(Uuid::new_v4());
        data.append_snapshot(snapshot(assignee, 1, date(2025, 1, 1))).unwrap();
        data.append_snapshot(snapshot(assignee, 2, date(2025, 7, 1))).unwrap();

        assert!(data.effective_snapshot(assignee, date(2024, 12, 31)).is_none());
        assert_eq!(
            data.effective_snapshot(assignee, date(2025, 6, 30)).unwrap().version,
            1
        );
        assert_eq!(
            data.effective_snapshot(assignee, date(2025, 7, 31)).unwrap().version,
            2
        );
    }

    #[test]
    fn test_attendance_lock_follows_run_status() {
        let mut data = TenantData::default();
        let period = Period::new(2026, 3).unwrap();
        assert!(data.ensure_attendance_unlocked(period).is_ok());

        let mut run = PayrollRun::new(Uuid::new_v4(), period, "hr");
        data.runs.insert(run.id, run.clone());
        assert!(data.ensure_attendance_unlocked(period).is_ok());

        run.status = RunStatus::Calculated;
        data.runs.insert(run.id, run.clone());
        assert!(matches!(
            data.ensure_attendance_unlocked(period),
            Err(EngineError::AttendanceLocked { .. })
        ));
    }

    #[test]
    fn test_panicking_write_does_not_take_the_store_down() {
        let store = Store::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            store.write(a, |_| -> EngineResult<()> { panic!("resolver bug") })
        }));
        assert!(outcome.is_err());

        let employee = Employee::new("EMP-1", "Asha", date(2024, 1, 1));
        store
            .write(b, |data| {
                data.employees.insert(employee.id, employee.clone());
                Ok(())
            })
            .unwrap();
        assert_eq!(store.read(b, |d| Ok(d.employees.len())).unwrap(), 1);
        assert_eq!(store.read(a, |d| Ok(d.employees.len())).unwrap(), 0);
    }

    #[test]
    fn test_tenants_are_isolated() {
        let store = Store::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let employee = Employee::new("EMP-1", "Asha", date(2024, 1, 1));

        store
            .write(a, |data| {
                data.employees.insert(employee.id, employee.clone());
                Ok(())
            })
            .unwrap();

        assert_eq!(store.read(a, |d| Ok(d.employees.len())).unwrap(), 1);
        assert_eq!(store.read(b, |d| Ok(d.employees.len())).unwrap(), 0);
        assert!(matches!(
            store.read(b, |d| d.employee(employee.id).cloned()),
            Err(EngineError::NotFound { .. })
        ));
    }
}
