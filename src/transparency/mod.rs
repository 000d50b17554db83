//! Transparency module for Burnout Sentinel.
//!
//! Exposes how analyses were produced so users can see when the external
//! service was involved.

pub mod log;

// Re-export commonly used types
pub use log::{create_shared_log, SharedTransparencyLog, TransparencyLog, TransparencyStats};
