//! Statistics for the Media Activity Agent.
//!
//! Counts observations, emissions and drops so the stream's behaviour can be
//! audited after the fact.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, ActivityLog, ActivityStats,
    SharedActivityLog,
};
