use anyhow::Result;
use pyguard_engine::model::{ModelFinding, ModelReport};
use pyguard_engine::{
    CancelToken, Category, EngineConfig, FindingSource, MemoryHistory, MockModelProvider,
    ScanEngine, ScanUnit, Severity,
};
use std::sync::Arc;
use std::time::Duration;

const SHELL_SOURCE: &str = "import os\nos.system(cmd)\n";

fn report(category: &str, line: u64, confidence: f64) -> ModelReport {
    ModelReport {
        findings: vec![ModelFinding {
            category: category.to_string(),
            line: Some(line),
            severity: Some("high".to_string()),
            confidence: Some(confidence),
            rationale: Some("flagged by review".to_string()),
            snippet: None,
        }],
        analysis_summary: Some("one injection risk".to_string()),
    }
}

#[tokio::test]
async fn static_findings_survive_model_failure() -> Result<()> {
    let mut config = EngineConfig::default();
    config.model.retry_attempts = 1;
    config.model.retry_base_delay_ms = 1;

    let provider = Arc::new(MockModelProvider::failing().with_delay(Duration::ZERO));
    let engine = ScanEngine::builder(config)
        .with_provider(provider.clone())
        .build()?;

    let unit = ScanUnit::new("app.py", SHELL_SOURCE);
    let result = engine.scan(&unit).await?;

    assert!(result.degraded, "model failure must mark the result degraded");
    let shell = result
        .findings
        .iter()
        .find(|f| f.rule_id == "shell-call")
        .map(|f| f.source);
    assert_eq!(shell, Some(FindingSource::Static));
    assert!(result.risk_score > 0.0);

    // Transient degradation is never cached; a later scan tries again.
    engine.scan(&unit).await?;
    assert_eq!(provider.call_count(), 2);
    assert_eq!(engine.cache_stats().entries, 0);
    Ok(())
}

#[tokio::test]
async fn timeouts_degrade_without_losing_static_results() -> Result<()> {
    let mut config = EngineConfig::default();
    config.model.timeout_seconds = 1;
    config.model.retry_attempts = 1;

    let provider = Arc::new(MockModelProvider::new().with_delay(Duration::from_millis(1200)));
    let engine = ScanEngine::builder(config)
        .with_provider(provider.clone())
        .build()?;

    let result = engine.scan(&ScanUnit::new("app.py", SHELL_SOURCE)).await?;

    assert!(result.degraded);
    assert!(result.findings.iter().any(|f| f.rule_id == "shell-call"));
    assert_eq!(provider.call_count(), 1);
    Ok(())
}

#[tokio::test]
async fn agreeing_passes_merge_into_one_finding() -> Result<()> {
    let provider = Arc::new(
        MockModelProvider::new()
            .with_delay(Duration::ZERO)
            .with_report("os.system", report("command-injection", 2, 0.7)),
    );
    let engine = ScanEngine::builder(EngineConfig::default())
        .with_provider(provider)
        .build()?;

    let result = engine.scan(&ScanUnit::new("app.py", SHELL_SOURCE)).await?;

    assert!(!result.degraded);
    assert_eq!(result.findings.len(), 1, "both passes reported the same issue");

    let finding = &result.findings[0];
    assert_eq!(finding.category, Category::CommandInjection);
    assert_eq!(finding.source, FindingSource::Merged);
    assert_eq!(finding.severity, Severity::High);
    // Pattern category: 0.7 * 0.9 static + 0.3 * 0.7 model.
    assert!((finding.confidence - 0.84).abs() < 1e-9);

    let sides = finding.merge_sides.as_ref().map(|s| (s.static_confidence, s.model_confidence));
    assert_eq!(sides, Some((Some(0.9), Some(0.7))));
    assert_eq!(result.analysis_summary.as_deref(), Some("one injection risk"));
    Ok(())
}

#[tokio::test]
async fn synonym_reports_fold_into_the_static_finding() -> Result<()> {
    let provider = Arc::new(
        MockModelProvider::new()
            .with_delay(Duration::ZERO)
            .with_report("os.system", report("shell injection", 3, 0.8)),
    );
    let engine = ScanEngine::builder(EngineConfig::default())
        .with_provider(provider)
        .build()?;

    let result = engine.scan(&ScanUnit::new("app.py", SHELL_SOURCE)).await?;

    assert_eq!(result.findings.len(), 1);
    assert_eq!(result.findings[0].category, Category::CommandInjection);
    assert_eq!(result.findings[0].source, FindingSource::Merged);
    Ok(())
}

#[tokio::test]
async fn unmapped_categories_pass_through_capped() -> Result<()> {
    let provider = Arc::new(
        MockModelProvider::new()
            .with_delay(Duration::ZERO)
            .with_default_report(report("prototype-pollution", 1, 0.95)),
    );
    let engine = ScanEngine::builder(EngineConfig::default())
        .with_provider(provider)
        .build()?;

    let result = engine.scan(&ScanUnit::new("calc.py", "value = compute(7)\n")).await?;

    assert_eq!(result.findings.len(), 1);
    let finding = &result.findings[0];
    assert!(matches!(&finding.category, Category::Other(name) if name == "prototype-pollution"));
    assert_eq!(finding.source, FindingSource::Model);
    assert!(
        finding.confidence <= 0.35 + 1e-9,
        "categories outside the taxonomy must not carry high confidence"
    );
    Ok(())
}

#[tokio::test]
async fn cancellation_degrades_and_skips_caching() -> Result<()> {
    let provider = Arc::new(MockModelProvider::new().with_delay(Duration::from_millis(500)));
    let engine = Arc::new(
        ScanEngine::builder(EngineConfig::default())
            .with_provider(provider.clone())
            .build()?,
    );

    let cancel = CancelToken::new();
    let handle = {
        let engine = Arc::clone(&engine);
        let cancel = cancel.clone();
        let unit = ScanUnit::new("app.py", SHELL_SOURCE);
        tokio::spawn(async move { engine.scan_with_cancel(&unit, &cancel).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();
    let result = handle.await??;

    assert!(result.degraded, "a cancelled model pass degrades the scan");
    assert!(result.findings.iter().any(|f| f.rule_id == "shell-call"));
    assert_eq!(engine.cache_stats().entries, 0, "cancelled scans must not be cached");
    Ok(())
}

#[tokio::test]
async fn garbage_model_response_yields_a_diagnostic_finding() -> Result<()> {
    let provider = Arc::new(
        MockModelProvider::new()
            .with_delay(Duration::ZERO)
            .with_raw_content("os.system", "I am unable to review this code."),
    );
    let engine = ScanEngine::builder(EngineConfig::default())
        .with_provider(provider)
        .build()?;

    let result = engine.scan(&ScanUnit::new("app.py", SHELL_SOURCE)).await?;

    assert!(result.degraded);
    assert!(result.findings.iter().any(|f| f.rule_id == "model-response"));
    assert!(result.findings.iter().any(|f| f.rule_id == "shell-call"));
    // Diagnostics carry no weight; the shell call alone sets the score.
    assert!(result.risk_score > 0.0);
    Ok(())
}

#[tokio::test]
async fn history_sees_every_scan_including_cache_hits() -> Result<()> {
    let history = Arc::new(MemoryHistory::new());
    let provider = Arc::new(MockModelProvider::new().with_delay(Duration::ZERO));
    let engine = ScanEngine::builder(EngineConfig::default())
        .with_provider(provider)
        .with_history(history.clone())
        .build()?;

    let first = ScanUnit::new("a.py", "x = 1\n");
    let second = ScanUnit::new("b.py", "y = 2\n");
    engine.scan(&first).await?;
    engine.scan(&first).await?;
    engine.scan(&second).await?;

    let entries = history.entries();
    assert_eq!(entries.len(), 3);
    assert_eq!(
        entries.iter().map(|e| e.sequence).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(
        entries.iter().map(|e| e.cache_hit).collect::<Vec<_>>(),
        vec![false, true, false]
    );
    assert_eq!(entries[0].fingerprint, entries[1].fingerprint);
    assert_ne!(entries[0].scan_id, entries[1].scan_id);
    assert_eq!(history.summary().scans, 3);
    Ok(())
}
