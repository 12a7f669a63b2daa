//! Calculation logic for the Payroll Engine.
//!
//! This module contains the pure computations: currency rounding, formula
//! evaluation, compensation structure resolution, attendance summaries and
//! proration, and the legacy row adapters. Nothing here touches the store.

pub mod formula;
pub mod legacy;
mod proration;
mod rounding;
mod structure;

pub use formula::FormulaResolver;
pub use legacy::{LegacyRow, breakdown_from_rows, to_legacy_rows};
pub use proration::{prorate, summarize};
pub use rounding::{CURRENCY_DP, mul_round, round_currency};
pub use structure::{RECONCILIATION_WARNING, effective_settings, resolve, resolve_with_defaults};
