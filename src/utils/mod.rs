//! Utility functions and helpers
//!
//! Atomic file rewrites and timestamp helpers.

pub mod atomic;
pub mod time;

pub use atomic::{atomic_write_with, cleanup_temp_files};
pub use time::format_timestamp;
