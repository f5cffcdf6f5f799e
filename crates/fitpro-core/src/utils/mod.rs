//! Utility functions for timestamp handling and display formatting.

pub mod format;

// Re-export commonly used functions at module level
pub use format::{
    format_height, format_local_iso, format_measurement, format_optional, parse_timestamp,
};
pub(crate) use format::serialize_optional_local_iso;
