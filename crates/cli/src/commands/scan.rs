//! The scan command. Feeds Python sources through the hybrid engine and
//! renders merged findings, per-file risk scores and the run summary.

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use colored::*;
use pyguard_engine::{
    EngineConfig, FindingSource, MemoryHistory, OpenAIProvider, ScanEngine, ScanResult, ScanUnit,
    Severity,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Python file or directory to audit
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// YAML configuration file; defaults apply when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Console)]
    pub format: OutputFormat,

    /// Skip the model pass; results are marked degraded
    #[arg(long)]
    pub no_model: bool,

    /// Exit non-zero when any finding at or above this severity remains
    #[arg(long, value_enum)]
    pub fail_on: Option<SeverityArg>,

    /// Hide findings below this confidence in console output
    #[arg(long, value_enum, default_value_t = ConfidenceLevel::Low)]
    pub min_confidence: ConfidenceLevel,

    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum OutputFormat {
    Console,
    Json,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn threshold(&self) -> f64 {
        match self {
            ConfidenceLevel::Low => 0.3,
            ConfidenceLevel::Medium => 0.6,
            ConfidenceLevel::High => 0.9,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum SeverityArg {
    Low,
    Medium,
    High,
    Critical,
}

impl From<SeverityArg> for Severity {
    fn from(level: SeverityArg) -> Self {
        match level {
            SeverityArg::Low => Severity::Low,
            SeverityArg::Medium => Severity::Medium,
            SeverityArg::High => Severity::High,
            SeverityArg::Critical => Severity::Critical,
        }
    }
}

pub async fn execute(args: ScanArgs) -> Result<()> {
    init_tracing(args.verbose);
    let started = Instant::now();

    let config = match &args.config {
        Some(path) => EngineConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load configuration: {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let files = collect_python_files(&args.path)?;
    if files.is_empty() {
        println!("⚠️  No Python files found under {}", args.path.display());
        return Ok(());
    }
    tracing::debug!(files = files.len(), "collected python sources");

    let history = Arc::new(MemoryHistory::with_capacity(files.len().max(100)));
    let mut builder = ScanEngine::builder(config.clone()).with_history(history.clone());

    if args.no_model {
        if args.verbose {
            println!("🤖 Model pass disabled by flag");
        }
    } else {
        match config.resolve_api_key() {
            Some(api_key) => {
                let provider = OpenAIProvider::new(api_key, &config.model);
                builder = builder.with_provider(Arc::new(provider));
            }
            None => eprintln!(
                "⚠️  No API key configured (set OPENAI_API_KEY); model pass disabled, results will be degraded"
            ),
        }
    }

    let engine = Arc::new(builder.build()?);

    if args.verbose {
        println!(
            "🔍 Scanning {} file(s), model pass {}",
            files.len(),
            if engine.model_enabled() { "enabled" } else { "off" }
        );
    }

    let mut handles = Vec::new();
    for file in files {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            let unit = ScanUnit::from_file(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            engine.scan(&unit).await.map_err(anyhow::Error::from)
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        match handle.await? {
            Ok(result) => results.push(result),
            Err(err) => eprintln!("⚠️  {err:#}"),
        }
    }

    engine.flush()?;

    match args.format {
        OutputFormat::Json => print_json(&results)?,
        OutputFormat::Console => {
            print_console(&results, &args, &history, &engine, started.elapsed())
        }
    }

    if let Some(level) = args.fail_on {
        let threshold: Severity = level.into();
        let blocking = results
            .iter()
            .filter(|r| r.has_findings_at_or_above(threshold))
            .count();
        if blocking > 0 {
            bail!("{blocking} file(s) carry findings at or above {threshold}");
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose {
        "pyguard_engine=debug,pyguard=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn collect_python_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        bail!("Input path does not exist: {}", path.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path) {
        let entry = entry?;
        if entry.path().is_file() && entry.path().extension().is_some_and(|ext| ext == "py") {
            files.push(entry.path().to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

fn print_json(results: &[Arc<ScanResult>]) -> Result<()> {
    let plain: Vec<&ScanResult> = results.iter().map(|r| r.as_ref()).collect();
    println!("{}", serde_json::to_string_pretty(&plain)?);
    Ok(())
}

fn print_console(
    results: &[Arc<ScanResult>],
    args: &ScanArgs,
    history: &MemoryHistory,
    engine: &ScanEngine,
    elapsed: Duration,
) {
    let threshold = args.min_confidence.threshold();

    for result in results {
        let degraded_tag = if result.degraded {
            "  (degraded)".dimmed().to_string()
        } else {
            String::new()
        };
        println!(
            "\n📄 {}  risk {:.1}{}",
            result.unit.path.bold(),
            result.risk_score,
            degraded_tag
        );
        if let Some(summary) = &result.analysis_summary {
            println!("   {}", summary.dimmed());
        }

        let visible: Vec<_> = result
            .findings
            .iter()
            .filter(|f| f.confidence >= threshold)
            .collect();
        if visible.is_empty() {
            println!("   ✅ No findings at this confidence");
            continue;
        }

        for finding in visible {
            println!(
                "   {} {}  {}  {}  confidence {:.2} ({})",
                severity_icon(finding.severity),
                finding
                    .severity
                    .to_string()
                    .color(finding.severity.color())
                    .bold(),
                finding.category.as_str(),
                finding.location.to_string().dimmed(),
                finding.confidence,
                source_label(finding.source),
            );
            println!("      {}", finding.description);
            if args.verbose {
                if let Some(snippet) = &finding.location.snippet {
                    println!("      {}", snippet.dimmed());
                }
            }
        }
    }

    println!("\n{}", "═".repeat(50).bright_blue());
    println!(
        "📊 {} file(s) scanned in {:.2}s",
        results.len(),
        elapsed.as_secs_f64()
    );

    let mut totals = [0usize; 4];
    for result in results {
        for finding in &result.findings {
            totals[finding.severity as usize] += 1;
        }
    }
    let counts = Severity::all()
        .iter()
        .rev()
        .map(|s| format!("{} {}: {}", severity_icon(*s), s, totals[*s as usize]))
        .collect::<Vec<_>>()
        .join("   ");
    println!("   {counts}");

    let summary = history.summary();
    println!(
        "   Mean risk {:.1} ({} low, {} medium, {} high)",
        summary.mean_risk, summary.low_risk, summary.medium_risk, summary.high_risk
    );

    let stats = engine.cache_stats();
    if args.verbose || stats.hits > 0 {
        println!("   Cache: {} hit(s), {} miss(es)", stats.hits, stats.misses);
    }

    let degraded = results.iter().filter(|r| r.degraded).count();
    if degraded > 0 {
        println!(
            "   ⚠️  {} result(s) degraded; the model pass did not fully complete",
            degraded
        );
    }
}

fn severity_icon(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "🔴",
        Severity::High => "🟠",
        Severity::Medium => "🟡",
        Severity::Low => "🔵",
    }
}

fn source_label(source: FindingSource) -> &'static str {
    match source {
        FindingSource::Static => "static",
        FindingSource::Model => "model",
        FindingSource::Merged => "merged",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_only_python_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.py"), "x = 1\n").unwrap();
        std::fs::write(dir.path().join("a.py"), "y = 2\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skip me").unwrap();
        std::fs::create_dir(dir.path().join("pkg")).unwrap();
        std::fs::write(dir.path().join("pkg/c.py"), "z = 3\n").unwrap();

        let files = collect_python_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.py", "b.py", "pkg/c.py"]);
    }

    #[test]
    fn single_file_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("only.py");
        std::fs::write(&file, "pass\n").unwrap();
        assert_eq!(collect_python_files(&file).unwrap(), vec![file]);
    }

    #[test]
    fn missing_path_is_an_error() {
        assert!(collect_python_files(Path::new("/no/such/path")).is_err());
    }

    #[test]
    fn confidence_levels_map_to_thresholds() {
        assert_eq!(ConfidenceLevel::Low.threshold(), 0.3);
        assert_eq!(ConfidenceLevel::Medium.threshold(), 0.6);
        assert_eq!(ConfidenceLevel::High.threshold(), 0.9);
    }

    #[test]
    fn fail_on_levels_map_to_severities() {
        assert_eq!(Severity::from(SeverityArg::High), Severity::High);
        assert_eq!(Severity::from(SeverityArg::Critical), Severity::Critical);
    }
}
