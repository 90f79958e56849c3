//! One-dimensional cutting-stock optimizer for aluminum window profiles.
//!
//! Demand rows (profile code, length, quantity) are expanded into items,
//! packed onto stock bars per profile code under a blade kerf, and returned
//! as result rows, cutting patterns and per-profile summaries.

pub mod assemble;
pub mod config;
pub mod demand;
pub mod error;
pub mod exact;
pub mod history;
pub mod input;
pub mod packer;
pub mod solver;
pub mod strategy;
pub mod types;

pub use config::{ExactConfig, OptimizeConfig};
pub use error::{Error, Result};
pub use solver::optimize;
pub use types::{CuttingPlan, DemandRow, GapPolicy, Objective};
