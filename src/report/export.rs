//! JSON and CSV projections of a report plus the export file naming rule

use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

use super::error::ReportResult;
use super::types::AnalysisReport;
use super::ExportFormat;

/// CSV header row
pub const CSV_HEADER: [&str; 3] = ["Section", "Key", "Value"];

static UNSAFE_ID_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_-]").expect("valid regex"));

/// Verbatim pretty-printed report.
///
/// Serialization is deterministic, so exporting the same report twice yields
/// identical bytes.
pub fn to_json(report: &AnalysisReport) -> ReportResult<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Fixed three-row projection: summary, defendant fault and rationale
pub fn to_csv(report: &AnalysisReport) -> String {
    let rows: [[String; 3]; 4] = [
        CSV_HEADER.map(String::from),
        [
            "Executive Summary".into(),
            "Summary".into(),
            quoted(&report.executive_summary),
        ],
        [
            "Liability".into(),
            "Defendant Fault".into(),
            csv_field(&format!("{}%", report.liability.defendant_percentage)),
        ],
        [
            "Liability".into(),
            "Rationale".into(),
            quoted(&report.liability.rationale),
        ],
    ];

    rows.iter()
        .map(|row| row.join(","))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Quote a field only when it holds a delimiter, quote or line break
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        quoted(value)
    } else {
        value.to_string()
    }
}

/// Always-quoted field with embedded quotes doubled
fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// `ForensicReport_<case id>_<YYYY-MM-DD>.<ext>` with every character
/// outside `[A-Za-z0-9_-]` in the case id replaced by `-`
pub fn export_filename(case_id: &str, date: NaiveDate, format: ExportFormat) -> String {
    let safe_id = UNSAFE_ID_CHARS.replace_all(case_id, "-");
    format!(
        "ForensicReport_{}_{}.{}",
        safe_id,
        date.format("%Y-%m-%d"),
        format.extension()
    )
}
