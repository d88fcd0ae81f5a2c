//! Run reporting.
//!
//! Final per-file statistics are aggregated into [`SummaryMetrics`],
//! assembled with the run's configuration and file listings into a
//! [`ReportModel`], and rendered as HTML and JSON.

pub mod format;
pub mod metrics;
pub mod model;
pub mod render;

pub use format::{format_bytes, format_duration};
pub use metrics::{aggregate, SummaryMetrics};
pub use model::{
    assemble, AutoTuneSummary, ConfigSummary, FileTuneSummary, InputFile, OutputFile,
    ReportModel, SessionInfo, NOT_AVAILABLE,
};
pub use render::{
    render_html, render_json, write_reports, ReportPaths, HTML_REPORT_FILE, JSON_REPORT_FILE,
};
