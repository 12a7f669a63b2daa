//! Immutable compensation snapshots.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Assignee, Breakdown};

/// What minted a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "revision_id", rename_all = "snake_case")]
pub enum SnapshotSource {
    /// The first assignment of compensation.
    Assignment,
    /// An approved revision.
    Revision(Uuid),
}

/// An immutable, dated, versioned compensation record for one assignee.
///
/// Snapshots are only ever appended to an assignee's history; they are
/// never updated in place or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensationSnapshot {
    /// Unique identifier.
    pub id: Uuid,
    /// Who the compensation belongs to.
    pub assignee: Assignee,
    /// Position in the assignee's history, starting at 1.
    pub version: u32,
    /// First day the compensation applies.
    pub effective_from: NaiveDate,
    /// Annual CTC.
    pub annual_ctc: Decimal,
    /// The frozen breakdown.
    pub breakdown: Breakdown,
    /// The template the breakdown came from, if any.
    pub template_id: Option<Uuid>,
    /// What minted the snapshot.
    pub source: SnapshotSource,
    /// Always true.
    pub locked: bool,
    /// When the snapshot was locked.
    pub locked_at: DateTime<Utc>,
}
