//! Output module for exports and run reports
//!
//! This module handles:
//! - Rendering extracted records as CSV, TSV, JSON or an xlsx workbook
//! - Summaries printed at the end of a run
//! - Statistics read back from the checkpoint store

pub mod stats;
mod tabular;

pub use stats::{
    print_run_summary, print_statistics, PhaseSummary, ProgressStatistics, RunSummary,
};
pub use tabular::{export_records, render_table};

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write table: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to write JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to write workbook: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
