//! ARQ CLI Library
//!
//! Shared functionality for the ARQ benchmark binary.

pub mod config;
pub mod stats;

pub use config::{BenchConfig, ConfigError, TestMode, DEFAULT_PORT};
pub use stats::{
    display_receiver_summary, display_report, display_sweep_table, format_bandwidth,
    format_bytes, format_duration, RunReport,
};
