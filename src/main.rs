//! Command-line front end
//!
//! ```bash
//! accident-analytics --video dashcam.mp4 --audio call.wav --jurisdiction Oregon --out reports/
//! ```
//!
//! Control log level with RUST_LOG:
//!   RUST_LOG=debug accident-analytics ...
//!   RUST_LOG=accident_analytics_lib::analysis=trace accident-analytics ...

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{ArgGroup, Parser, ValueEnum};

use accident_analytics_lib::analysis::{AnalysisEvent, AnalysisOrchestrator, AnalysisProvider};
use accident_analytics_lib::config::AppConfig;
use accident_analytics_lib::evidence::{EvidenceSource, MediaKind};
use accident_analytics_lib::logging;
use accident_analytics_lib::report::{ExportFormat, ReportExporter};

#[derive(Parser, Debug)]
#[command(name = "accident-analytics", version, about = "Forensic accident analysis from crash evidence")]
#[command(group(ArgGroup::new("evidence").required(true).multiple(true).args(["video", "document", "audio"])))]
struct Cli {
    /// Video evidence (dashcam, CCTV)
    #[arg(long, value_name = "PATH")]
    video: Vec<PathBuf>,

    /// Scene photos and official documents
    #[arg(long, value_name = "PATH")]
    document: Vec<PathBuf>,

    /// Audio evidence (calls, in-cabin recordings)
    #[arg(long, value_name = "PATH")]
    audio: Vec<PathBuf>,

    /// Jurisdiction for the liability analysis (defaults to config)
    #[arg(long)]
    jurisdiction: Option<String>,

    /// Directory for exported reports
    #[arg(long = "out", default_value = ".")]
    out_dir: PathBuf,

    /// Export format, repeatable
    #[arg(long = "format", value_enum, default_value = "json")]
    formats: Vec<FormatArg>,

    /// Verbose logging with file and line
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Queued evidence: video, then documents, then audio
    fn evidence(&self) -> Vec<(MediaKind, PathBuf)> {
        let tagged = |kind: MediaKind, paths: &[PathBuf]| {
            paths.iter().map(move |p| (kind, p.clone())).collect::<Vec<_>>()
        };
        [
            tagged(MediaKind::Video, &self.video),
            tagged(MediaKind::Document, &self.document),
            tagged(MediaKind::Audio, &self.audio),
        ]
        .concat()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Json,
    Csv,
    Pdf,
}

impl From<FormatArg> for ExportFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Json => ExportFormat::Json,
            FormatArg::Csv => ExportFormat::Csv,
            FormatArg::Pdf => ExportFormat::Pdf,
        }
    }
}

#[cfg(feature = "ai-assistant")]
fn build_provider(config: &AppConfig) -> Result<Arc<dyn AnalysisProvider>, String> {
    use accident_analytics_lib::ai::AiAnalysisProvider;

    let provider = config.ai_provider().ok_or_else(|| {
        "No analysis model configured (set ACCIDENT_ANALYTICS_AI_PROVIDER or OPENAI_API_KEY)".to_string()
    })?;
    let provider = AiAnalysisProvider::new(provider).map_err(|e| e.to_string())?;
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "ai-assistant"))]
fn build_provider(_config: &AppConfig) -> Result<Arc<dyn AnalysisProvider>, String> {
    Err("Built without the ai-assistant feature; no analysis provider available".to_string())
}

async fn run(cli: Cli) -> Result<(), String> {
    let config = AppConfig::load().map_err(|e| e.to_string())?;
    let provider = build_provider(&config)?;
    let store = config.case_store().map_err(|e| e.to_string())?;

    let mut orchestrator = AnalysisOrchestrator::new(provider, config.orchestrator_settings());
    let mut events = orchestrator.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                AnalysisEvent::Status(text) => eprintln!("{}", text),
                AnalysisEvent::Advisory(text) => eprintln!("warning: {}", text),
                AnalysisEvent::Failure(text) => eprintln!("{}", text),
                AnalysisEvent::Check(check) if check.to.is_terminal() => {
                    eprintln!("[{:?}] {}", check.to, check.label)
                }
                _ => {}
            }
        }
    });

    let jurisdiction = cli.jurisdiction.as_deref().unwrap_or(&config.analysis.jurisdiction);
    orchestrator.begin_case(jurisdiction).map_err(|e| e.to_string())?;
    for (kind, path) in cli.evidence() {
        orchestrator
            .add_evidence([EvidenceSource::file(path)], kind)
            .map_err(|e| e.to_string())?;
    }

    if let Err(e) = orchestrator.run().await {
        tracing::error!("Analysis failed: {}", e);
        orchestrator.cancel().map_err(|e| e.to_string())?;
        drop(orchestrator);
        let _ = printer.await;
        return Err(e.operator_message().to_string());
    }

    let committed = orchestrator.commit(&store).await.map_err(|e| e.to_string())?;
    drop(orchestrator);
    let _ = printer.await;

    std::fs::create_dir_all(&cli.out_dir).map_err(|e| e.to_string())?;
    let exporter = ReportExporter::new();
    for format in cli.formats {
        let path = exporter
            .export(&committed.report, &committed.case_id, format.into(), &cli.out_dir)
            .map_err(|e| e.to_string())?;
        println!("{}", path.display());
    }
    eprintln!("Case {} created", committed.case_id);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    logging::init(cli.verbose);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_evidence_and_formats() {
        let cli = Cli::try_parse_from([
            "accident-analytics",
            "--video", "a.mp4",
            "--audio", "b.wav",
            "--document", "scene.jpg",
            "--video", "c.mp4",
            "--jurisdiction", "Ohio",
            "--format", "pdf",
            "--format", "csv",
        ])
        .unwrap();

        let evidence = cli.evidence();
        let kinds: Vec<MediaKind> = evidence.iter().map(|(kind, _)| *kind).collect();
        assert_eq!(kinds, vec![MediaKind::Video, MediaKind::Video, MediaKind::Document, MediaKind::Audio]);
        assert_eq!(evidence[1].1, PathBuf::from("c.mp4"));
        assert_eq!(cli.jurisdiction.as_deref(), Some("Ohio"));
        assert_eq!(cli.formats, vec![FormatArg::Pdf, FormatArg::Csv]);
        assert_eq!(ExportFormat::from(cli.formats[0]), ExportFormat::Pdf);
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["accident-analytics", "--document", "report.pdf"]).unwrap();
        assert_eq!(cli.formats, vec![FormatArg::Json]);
        assert_eq!(cli.out_dir, PathBuf::from("."));
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_rejects_bad_input() {
        assert!(Cli::try_parse_from(["accident-analytics"]).is_err());
        assert!(Cli::try_parse_from(["accident-analytics", "--video"]).is_err());
        assert!(Cli::try_parse_from(["accident-analytics", "--video", "a.mp4", "--bogus"]).is_err());
        assert!(Cli::try_parse_from(["accident-analytics", "--video", "a.mp4", "--format", "docx"]).is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
