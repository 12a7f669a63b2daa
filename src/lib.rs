//! Payroll Computation & Snapshot Engine
//!
//! This crate resolves an annual cost-to-company figure into a balanced
//! Indian salary structure, freezes structures into versioned compensation
//! snapshots, and runs monthly payroll against frozen attendance.
//!
//! The main entry point is [`engine::PayrollEngine`]; [`api::create_router`]
//! serves the same operations over HTTP.

#![warn(missing_docs)]

pub mod api;
pub mod calculation;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod models;
pub mod payroll;
pub mod store;
