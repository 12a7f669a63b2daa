//! Compensation revisions and the derived history timeline.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Breakdown;

/// The kind of change a revision proposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevisionType {
    /// A pay increase within the same role.
    Increment,
    /// A structural change to the compensation.
    Revision,
    /// A pay change tied to a designation/department/grade change.
    Promotion,
}

/// Approval workflow status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevisionStatus {
    /// Editable proposal.
    Draft,
    /// Submitted for approval.
    PendingApproval,
    /// Approved; a snapshot was minted.
    Approved,
    /// Rejected; no snapshot was minted.
    Rejected,
}

impl RevisionStatus {
    /// Whether approval or rejection is still possible.
    pub fn is_open(&self) -> bool {
        matches!(self, RevisionStatus::Draft | RevisionStatus::PendingApproval)
    }
}

impl fmt::Display for RevisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RevisionStatus::Draft => "DRAFT",
            RevisionStatus::PendingApproval => "PENDING_APPROVAL",
            RevisionStatus::Approved => "APPROVED",
            RevisionStatus::Rejected => "REJECTED",
        };
        f.write_str(s)
    }
}

/// Designation, department and grade changes carried by a promotion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromotionDetails {
    /// New designation.
    pub designation: Option<String>,
    /// New department.
    pub department: Option<String>,
    /// New grade.
    pub grade: Option<String>,
    /// Designation before the promotion.
    pub previous_designation: Option<String>,
    /// Department before the promotion.
    pub previous_department: Option<String>,
    /// Grade before the promotion.
    pub previous_grade: Option<String>,
}

impl PromotionDetails {
    /// Returns true if no target field is set.
    pub fn is_empty(&self) -> bool {
        self.designation.is_none() && self.department.is_none() && self.grade.is_none()
    }
}

/// Difference between the old and new annual CTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    /// Annual CTC before.
    pub previous_ctc: Decimal,
    /// Annual CTC after.
    pub new_ctc: Decimal,
    /// `new - previous`.
    pub absolute_change: Decimal,
    /// `absolute / previous × 100`, rounded to 2 places.
    pub percentage_change: Decimal,
}

/// A proposed change to an employee's compensation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    /// Unique identifier.
    pub id: Uuid,
    /// The employee being revised.
    pub employee_id: Uuid,
    /// Kind of change.
    pub revision_type: RevisionType,
    /// Workflow status.
    pub status: RevisionStatus,
    /// First day the new compensation applies.
    pub effective_from: NaiveDate,
    /// The template the new breakdown was resolved from.
    pub template_id: Option<Uuid>,
    /// Why the change is proposed.
    pub reason: Option<String>,
    /// Snapshot version the proposal was computed against.
    pub baseline_version: u32,
    /// Snapshot the proposal was computed against.
    pub baseline_snapshot_id: Uuid,
    /// Copy of the baseline breakdown.
    pub old_breakdown: Breakdown,
    /// The proposed breakdown.
    pub new_breakdown: Breakdown,
    /// CTC delta.
    pub change: ChangeSummary,
    /// Promotion changes, for `PROMOTION` revisions.
    pub promotion: Option<PromotionDetails>,
    /// Who drafted the revision.
    pub created_by: String,
    /// When it was drafted.
    pub created_at: DateTime<Utc>,
    /// When it was submitted for approval.
    pub submitted_at: Option<DateTime<Utc>>,
    /// Who approved or rejected it.
    pub decided_by: Option<String>,
    /// When it was approved or rejected.
    pub decided_at: Option<DateTime<Utc>>,
    /// Why it was rejected.
    pub rejection_reason: Option<String>,
    /// The snapshot minted on approval.
    pub resulting_snapshot_id: Option<Uuid>,
}

/// Input for drafting a revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRevision {
    /// The employee being revised.
    pub employee_id: Uuid,
    /// Kind of change.
    pub revision_type: RevisionType,
    /// Template to resolve the new structure from.
    #[serde(default)]
    pub template_id: Option<Uuid>,
    /// New annual CTC, resolved with the baseline template's overrides
    /// when no template is given.
    #[serde(default)]
    pub annual_ctc: Option<Decimal>,
    /// First day the new compensation applies.
    pub effective_from: NaiveDate,
    /// Why the change is proposed.
    #[serde(default)]
    pub reason: Option<String>,
    /// Promotion changes; required for `PROMOTION`.
    #[serde(default)]
    pub promotion: Option<PromotionDetails>,
    /// Who is drafting it.
    pub created_by: String,
}

/// What a timeline entry represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimelineEventKind {
    /// The first assignment of compensation.
    Joining,
    /// A revision in any status.
    Revision {
        /// Kind of change.
        revision_type: RevisionType,
        /// Its workflow status.
        status: RevisionStatus,
    },
}

/// One entry of an employee's compensation history view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// What the entry represents.
    pub kind: TimelineEventKind,
    /// The snapshot or revision identifier.
    pub reference_id: Uuid,
    /// Effective date.
    pub effective_from: NaiveDate,
    /// Annual CTC after the event.
    pub annual_ctc: Decimal,
    /// Annual CTC before the event, for revisions.
    pub previous_ctc: Option<Decimal>,
    /// Percentage change, for revisions.
    pub percentage_change: Option<Decimal>,
    /// Why the revision was proposed.
    pub reason: Option<String>,
}
