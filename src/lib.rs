// src/lib.rs

pub mod config;
pub mod core;
pub mod diagnostics;
pub mod host;
pub mod plan;

// Re-export
pub use crate::core::AutoconfError;
pub use crate::plan::{ProvisioningOutcome, ProvisioningPlan};
