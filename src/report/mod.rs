//! Forensic analysis report
//!
//! The report contract produced by the analysis orchestrator and consumed by
//! the case store and the presentation layer, plus the data-fidelity exports.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     AnalysisReport                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐   │
//! │  │    types     │───▶│ conformance  │───▶│   metrics    │   │
//! │  │ (contract)   │    │ (rules)      │    │ (derived)    │   │
//! │  └──────────────┘    └──────────────┘    └──────────────┘   │
//! │         │                                                   │
//! │         ▼                                                   │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │                  Export Formats                      │   │
//! │  │    ┌────────┐      ┌────────┐      ┌────────┐        │   │
//! │  │    │  JSON  │      │  CSV   │      │  PDF   │        │   │
//! │  │    │ serde  │      │ 3 rows │      │ genpdf │        │   │
//! │  │    └────────┘      └────────┘      └────────┘        │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use accident_analytics_lib::report::{ExportFormat, ReportExporter};
//!
//! let exporter = ReportExporter::new();
//! let path = exporter.export(&report, "CASE-2025-4821", ExportFormat::Pdf, "out/")?;
//! ```

pub mod types;
pub mod conformance;
pub mod metrics;
pub mod export;
pub mod pdf;
pub mod error;

// Re-exports for convenience
pub use types::*;
pub use conformance::{ConformanceIssue, ConformanceReport, Severity};
pub use metrics::{EnvironmentalRiskProfile, HydroplaningAssessment};
pub use pdf::PdfGenerator;
pub use error::{ReportError, ReportResult};

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Verbatim report (serde_json, pretty)
    Json,
    /// Summary / defendant fault / rationale rows
    Csv,
    /// Paginated text rendering (genpdf)
    Pdf,
}

impl ExportFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Pdf => "pdf",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "pdf" => Ok(ExportFormat::Pdf),
            other => Err(format!("Unsupported export format: {}", other)),
        }
    }
}

/// Writes reports to disk in any export format
pub struct ReportExporter {
    pdf_generator: PdfGenerator,
}

impl ReportExporter {
    pub fn new() -> Self {
        Self { pdf_generator: PdfGenerator::new() }
    }

    pub fn with_pdf_generator(pdf_generator: PdfGenerator) -> Self {
        Self { pdf_generator }
    }

    /// Export into `output_dir` under the standard file name for today's date
    pub fn export(
        &self,
        report: &AnalysisReport,
        case_id: &str,
        format: ExportFormat,
        output_dir: impl AsRef<Path>,
    ) -> ReportResult<PathBuf> {
        self.export_dated(report, case_id, format, output_dir, Utc::now().date_naive())
    }

    /// Export using an explicit generation date
    pub fn export_dated(
        &self,
        report: &AnalysisReport,
        case_id: &str,
        format: ExportFormat,
        output_dir: impl AsRef<Path>,
        date: NaiveDate,
    ) -> ReportResult<PathBuf> {
        let path = output_dir
            .as_ref()
            .join(export::export_filename(case_id, date, format));

        match format {
            ExportFormat::Json => std::fs::write(&path, export::to_json(report)?)?,
            ExportFormat::Csv => std::fs::write(&path, export::to_csv(report))?,
            ExportFormat::Pdf => {
                self.pdf_generator.generate(report, case_id, date, &path)?;
            }
        }

        crate::audit::log_report_export(case_id, format.extension(), &path);
        Ok(path)
    }
}

impl Default for ReportExporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_format_extensions() {
        assert_eq!(ExportFormat::Json.extension(), "json");
        assert_eq!(ExportFormat::Csv.extension(), "csv");
        assert_eq!(ExportFormat::Pdf.extension(), "pdf");
    }

    #[test]
    fn test_export_format_parse() {
        assert_eq!("PDF".parse::<ExportFormat>().unwrap(), ExportFormat::Pdf);
        assert!("docx".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_export_writes_json_and_csv() {
        let dir = tempfile::tempdir().unwrap();
        let report = AnalysisReport::placeholder().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let exporter = ReportExporter::new();

        let json_path = exporter
            .export_dated(&report, "c-101", ExportFormat::Json, dir.path(), date)
            .unwrap();
        assert_eq!(
            json_path.file_name().unwrap().to_str().unwrap(),
            "ForensicReport_c-101_2025-06-01.json"
        );
        let written = std::fs::read_to_string(&json_path).unwrap();
        assert_eq!(written, export::to_json(&report).unwrap());

        let csv_path = exporter
            .export_dated(&report, "c-101", ExportFormat::Csv, dir.path(), date)
            .unwrap();
        let csv = std::fs::read_to_string(csv_path).unwrap();
        assert!(csv.contains("Liability,Defendant Fault,100%"));
    }
}
