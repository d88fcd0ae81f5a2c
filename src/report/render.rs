//! HTML and JSON renderers for [`ReportModel`].

use std::path::{Path, PathBuf};

use tera::{Context, Tera};
use tracing::info;

use super::model::ReportModel;
use crate::error::Result;

/// File name of the HTML report inside a session directory.
pub const HTML_REPORT_FILE: &str = "obfuscation_report.html";
/// File name of the JSON report inside a session directory.
pub const JSON_REPORT_FILE: &str = "obfuscation_report.json";

const HTML_TEMPLATE: &str = include_str!("templates/report.html.tera");

/// Renders the HTML report.
pub fn render_html(report: &ReportModel) -> Result<String> {
    let context = Context::from_serialize(report)?;
    Ok(Tera::one_off(HTML_TEMPLATE, &context, true)?)
}

/// Renders the JSON report.
pub fn render_json(report: &ReportModel) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Paths of the written reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub html: PathBuf,
    pub json: PathBuf,
}

/// Writes both reports into `dir`.
pub async fn write_reports(report: &ReportModel, dir: &Path) -> Result<ReportPaths> {
    tokio::fs::create_dir_all(dir).await?;
    let paths = ReportPaths {
        html: dir.join(HTML_REPORT_FILE),
        json: dir.join(JSON_REPORT_FILE),
    };

    tokio::fs::write(&paths.html, render_html(report)?).await?;
    tokio::fs::write(&paths.json, render_json(report)?).await?;
    info!("Report written to {}", paths.html.display());

    Ok(paths)
}
