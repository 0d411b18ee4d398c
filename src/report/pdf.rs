//! PDF report generator using genpdf
//!
//! The report is first laid out as plain sections and lines, then rendered.
//! Rendering runs twice: the first pass only counts pages so the second can
//! stamp "Page X of Y" on every page.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use genpdf::{
    elements::{Break, Paragraph},
    fonts, style, Alignment, Document, Element, SimplePageDecorator,
};

use super::error::{ReportError, ReportResult};
use super::types::{AnalysisReport, Section};

/// Trailer stamped after the page counter
pub const PAGE_STAMP_SUFFIX: &str = "Generated by AccidentAnalytics v2.0 - Admissible Forensic Evidence";

/// Document title line
pub const DOCUMENT_TITLE: &str = "ACCIDENT ANALYTICS - FORENSIC REPORT";

/// One line of body text
#[derive(Debug, Clone, PartialEq)]
pub struct PdfLine {
    pub text: String,
    pub bold: bool,
}

impl PdfLine {
    fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into(), bold: false }
    }

    fn bold(text: impl Into<String>) -> Self {
        Self { text: text.into(), bold: true }
    }
}

/// Titled block of lines
#[derive(Debug, Clone, PartialEq)]
pub struct PdfSection {
    pub title: String,
    pub lines: Vec<PdfLine>,
}

/// Page stamp text for page `page` of `total`
pub fn page_stamp(page: usize, total: usize) -> String {
    format!("Page {} of {} - {}", page, total, PAGE_STAMP_SUFFIX)
}

/// Lay the report out as a title block followed by titled sections.
///
/// Optional sections that were not produced are left out entirely.
pub fn layout(report: &AnalysisReport, case_id: &str, generated: NaiveDate) -> (Vec<PdfLine>, Vec<PdfSection>) {
    let jurisdiction = report
        .official_docs
        .as_present()
        .map(|docs| docs.jurisdiction.as_str())
        .unwrap_or("N/A");

    let mut header = vec![
        PdfLine::plain(format!("Case Ref: {}", case_id)),
        PdfLine::plain(format!("Date Generated: {}", generated.format("%Y-%m-%d"))),
        PdfLine::plain(format!("Jurisdiction: {}", jurisdiction)),
    ];
    if report.is_simulated() {
        header.push(PdfLine::bold(format!(
            "Provenance: {} (not derived from the submitted evidence)",
            report.provenance.as_str()
        )));
    }

    let mut sections = vec![
        PdfSection {
            title: "Executive Summary".into(),
            lines: vec![PdfLine::plain(&report.executive_summary)],
        },
        PdfSection {
            title: "Liability Determination".into(),
            lines: vec![
                PdfLine::bold(format!("Defendant Liability: {}%", report.liability.defendant_percentage)),
                PdfLine::bold(format!("Plaintiff Liability: {}%", report.liability.plaintiff_percentage)),
                PdfLine::bold("Rationale:"),
                PdfLine::plain(&report.liability.rationale),
                PdfLine::bold(format!("Statute Cited: {}", report.liability.code_cited)),
            ],
        },
        PdfSection {
            title: "Physics Reconstruction".into(),
            lines: vec![
                PdfLine::plain(format!("Vehicle A Speed: {} mph", report.physics.vehicle_a_speed)),
                PdfLine::plain(format!("Vehicle B Speed: {} mph", report.physics.vehicle_b_speed)),
                PdfLine::plain(format!("Impact Angle: {} degrees", report.physics.impact_angle)),
                PdfLine::plain(format!(
                    "Methodology: {} (Confidence: {}%)",
                    report.physics.method, report.physics.confidence
                )),
            ],
        },
    ];

    if let Section::Present(human) = &report.human_impact {
        sections.push(PdfSection {
            title: "Human Impact & Biomechanics".into(),
            lines: vec![
                PdfLine::plain(format!("Delta-V: {} mph", human.delta_v)),
                PdfLine::plain(format!("PDOF: {}", human.principal_direction)),
                PdfLine::plain(format!("Seatbelt Status: {}", human.seatbelt_status.as_str())),
                PdfLine::plain(format!("Predicted AIS Score: {}", human.ais_score)),
            ],
        });
    }

    if let Section::Present(driver) = &report.driver_behavior {
        sections.push(PdfSection {
            title: "Driver Behavior Analysis".into(),
            lines: vec![
                PdfLine::plain(format!("Risk Percentile: {}th", driver.risk_percentile)),
                PdfLine::plain(format!("Detected Actions: {}", driver.detected_actions.join(", "))),
                PdfLine::plain(format!("Court Recommendation: {}", driver.court_recommendation)),
            ],
        });
    }

    if let Section::Present(env) = &report.environmental {
        sections.push(PdfSection {
            title: "Environmental Conditions".into(),
            lines: vec![
                PdfLine::plain(format!("Weather: {}", env.weather_condition)),
                PdfLine::plain(format!("Road Surface: {}", env.road_surface_condition)),
                PdfLine::plain(format!("Friction Coefficient: {}", env.road_friction_coefficient)),
                PdfLine::plain(format!("Notes: {}", env.notes)),
            ],
        });
    }

    if !report.timeline_events.is_empty() {
        sections.push(PdfSection {
            title: "Timeline of Events".into(),
            lines: report
                .timeline_events
                .iter()
                .map(|event| {
                    PdfLine::plain(format!(
                        "T{:+.1}s [{}] ({}) {}",
                        event.timestamp,
                        event.event_type.as_str(),
                        event.vehicle.as_str(),
                        event.description
                    ))
                })
                .collect(),
        });
    }

    let checks = &report.evidence_integrity.checks;
    sections.push(PdfSection {
        title: "Evidence Integrity".into(),
        lines: vec![
            PdfLine::plain(format!("Integrity Score: {}%", report.evidence_integrity.score)),
            PdfLine::plain(format!("Certificate: {}", report.evidence_integrity.certificate_id)),
            PdfLine::plain(format!(
                "Frame Duplication: {} | Compression Artifacts: {} | GPS Metadata: {} | Audio Splicing: {}",
                pass_fail(checks.frame_duplication),
                pass_fail(checks.compression_artifacts),
                pass_fail(checks.gps_metadata),
                pass_fail(checks.audio_splicing)
            )),
        ],
    });

    (header, sections)
}

fn pass_fail(passed: bool) -> &'static str {
    if passed {
        "Pass"
    } else {
        "Fail"
    }
}

/// PDF generator for analysis reports
pub struct PdfGenerator {
    font_dir: Option<PathBuf>,
}

impl PdfGenerator {
    /// Create a new PDF generator using system fonts
    pub fn new() -> Self {
        Self { font_dir: None }
    }

    /// Look for `LiberationSans-*.ttf` in `dir` before the system locations
    pub fn with_font_dir(dir: impl AsRef<Path>) -> Self {
        Self { font_dir: Some(dir.as_ref().to_path_buf()) }
    }

    /// Try to load fonts from various locations
    fn load_fonts(&self) -> ReportResult<fonts::FontFamily<fonts::FontData>> {
        if let Some(dir) = &self.font_dir {
            if let Ok(font) = fonts::from_files(dir, "LiberationSans", None) {
                return Ok(font);
            }
        }

        let candidates = [
            ("./fonts", "LiberationSans"),
            ("/Library/Fonts", "Arial"),
            ("/usr/share/fonts/truetype/liberation", "LiberationSans"),
            ("/usr/share/fonts/truetype/dejavu", "DejaVuSans"),
            ("C:\\Windows\\Fonts", "arial"),
        ];
        for (dir, name) in candidates {
            if let Ok(font) = fonts::from_files(dir, name, None) {
                return Ok(font);
            }
        }

        Err(ReportError::Pdf(
            "No suitable fonts found. PDF generation requires TrueType fonts in ./fonts/, \
            /Library/Fonts/ (macOS) or /usr/share/fonts/truetype/ (Linux)."
                .to_string(),
        ))
    }

    /// Render the report to `output_path`, returning the page count
    pub fn generate(
        &self,
        report: &AnalysisReport,
        case_id: &str,
        generated: NaiveDate,
        output_path: impl AsRef<Path>,
    ) -> ReportResult<usize> {
        let font_family = self.load_fonts()?;
        let (header, sections) = layout(report, case_id, generated);

        // Pass 1: count pages
        let pages = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pages);
        let doc = build_document(font_family.clone(), &header, &sections, move |page| {
            counter.fetch_max(page, Ordering::Relaxed);
            page_stamp(page, page)
        });
        doc.render(io::sink())?;
        let total = pages.load(Ordering::Relaxed).max(1);

        // Pass 2: stamp with the known total
        let doc = build_document(font_family, &header, &sections, move |page| page_stamp(page, total));
        let file = std::fs::File::create(output_path)?;
        doc.render(io::BufWriter::new(file))?;

        tracing::debug!(case_id = %case_id, pages = total, "Rendered PDF report");
        Ok(total)
    }
}

impl Default for PdfGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn build_document<F>(
    font_family: fonts::FontFamily<fonts::FontData>,
    header: &[PdfLine],
    sections: &[PdfSection],
    stamp: F,
) -> Document
where
    F: Fn(usize) -> String + 'static,
{
    let mut doc = Document::new(font_family);
    doc.set_title(DOCUMENT_TITLE);
    doc.set_minimal_conformance();

    let mut decorator = SimplePageDecorator::new();
    decorator.set_margins(10);
    decorator.set_header(move |page| {
        Paragraph::new(stamp(page))
            .aligned(Alignment::Center)
            .styled(style::Style::new().with_font_size(8))
    });
    doc.set_page_decorator(decorator);

    doc.push(
        Paragraph::new(DOCUMENT_TITLE)
            .styled(style::Style::new().bold().with_font_size(18)),
    );
    for line in header {
        doc.push(styled_line(line));
    }
    doc.push(Break::new(1.0));

    for section in sections {
        doc.push(
            Paragraph::new(section.title.to_uppercase())
                .styled(style::Style::new().bold().with_font_size(12)),
        );
        doc.push(Break::new(0.5));
        for line in &section.lines {
            doc.push(styled_line(line));
        }
        doc.push(Break::new(1.0));
    }

    doc
}

fn styled_line(line: &PdfLine) -> impl Element {
    let style = if line.bold {
        style::Style::new().bold().with_font_size(10)
    } else {
        style::Style::new().with_font_size(10)
    };
    Paragraph::new(line.text.as_str()).styled(style)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::types::tests::minimal_report;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()
    }

    fn titles(sections: &[PdfSection]) -> Vec<&str> {
        sections.iter().map(|s| s.title.as_str()).collect()
    }

    #[test]
    fn test_page_stamp() {
        assert_eq!(
            page_stamp(2, 5),
            "Page 2 of 5 - Generated by AccidentAnalytics v2.0 - Admissible Forensic Evidence"
        );
    }

    #[test]
    fn test_layout_skips_absent_sections() {
        let (header, sections) = layout(&minimal_report(), "CASE-2025-1234", date());
        assert_eq!(header[0].text, "Case Ref: CASE-2025-1234");
        assert_eq!(header[2].text, "Jurisdiction: N/A");
        assert_eq!(
            titles(&sections),
            vec![
                "Executive Summary",
                "Liability Determination",
                "Physics Reconstruction",
                "Timeline of Events",
                "Evidence Integrity"
            ]
        );
        assert_eq!(sections[1].lines[0].text, "Defendant Liability: 80%");
        assert!(sections[1].lines[0].bold);
    }

    #[test]
    fn test_layout_full_report() {
        let report = AnalysisReport::placeholder().unwrap();
        let (header, sections) = layout(&report, "c-101", date());
        assert_eq!(header[2].text, "Jurisdiction: California");
        assert!(header.iter().any(|l| l.text.starts_with("Provenance: placeholder")));
        let names = titles(&sections);
        assert!(names.contains(&"Human Impact & Biomechanics"));
        assert!(names.contains(&"Driver Behavior Analysis"));
        assert!(names.contains(&"Environmental Conditions"));

        let timeline = sections.iter().find(|s| s.title == "Timeline of Events").unwrap();
        assert_eq!(timeline.lines.len(), 5);
        assert_eq!(timeline.lines[0].text, "T-2.0s [Critical] (A) Vehicle A maintains 65mph (Speed Limit 55)");
    }
}
