//! Context Management Service
//!
//! Keeps oracle requests within the configured message and byte budgets.

mod optimizer;

pub use optimizer::{ContextOptimizer, OptimizedContext};
