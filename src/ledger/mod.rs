//! Snapshot and revision ledger.
//!
//! This module owns every write to compensation history: templates and
//! their locking, first assignments, and revisions through approval.
//! Snapshots are only ever appended; nothing here updates or deletes one.

mod assignment;
mod revision;
mod template;
mod timeline;

pub use assignment::assign_compensation;
pub use revision::{
    approve_revision, change_summary, create_revision, delete_revision, reject_revision,
    submit_revision,
};
pub use template::{create_template, update_template, update_template_description};
pub use timeline::get_timeline;
