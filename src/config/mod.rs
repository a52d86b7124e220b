pub mod types;
mod validators;

// Re-export all public types
pub use types::*;
pub(crate) use validators::{parse_size_string, validate_metrics_path};
