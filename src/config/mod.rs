//! Configuration loading and management for the Payroll Engine.
//!
//! This module loads the compensation defaults and attendance settings from
//! YAML files. Every type also implements `Default` with the same values as
//! the shipped `config/default` directory.
//!
//! # Example
//!
//! ```no_run
//! use payroll_engine::config::ConfigLoader;
//!
//! let config = ConfigLoader::load("./config/default").unwrap();
//! println!("HRA fraction: {}", config.compensation().hra_fraction);
//! ```

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{
    AMOUNT_CEILING, AttendanceSettings, CompensationDefaults, EngineConfig, EsiSettings,
    FixedAllowance,
};
pub(crate) use types::{check_amount, check_fraction};
