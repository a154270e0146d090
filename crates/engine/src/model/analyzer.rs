//! Drives the model pass: chunking, prompting, retry, timeout and
//! cancellation, plus conversion of the model's report into findings.
//! Failures never propagate out of this module; they surface as a
//! degraded analysis.

use crate::config::ModelConfig;
use crate::core::{Category, Finding, FindingSource, Location, Severity};
use crate::error::ModelError;
use crate::model::cancel::CancelToken;
use crate::model::chunk::{chunk_source, SourceChunk};
use crate::model::prompts;
use crate::model::provider::{ModelProvider, ModelRequest};
use crate::model::retry::{run_with_retry, RetryOutcome, RetryPolicy};
use crate::model::schemas::{parse_report, ModelFinding};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// What the model pass produced. `transient` marks degradation that a
/// later attempt could clear, which keeps such results out of the cache.
#[derive(Debug, Default)]
pub struct ModelAnalysis {
    pub findings: Vec<Finding>,
    pub summary: Option<String>,
    pub degraded: bool,
    pub transient: bool,
}

impl ModelAnalysis {
    /// No provider configured. Degraded, but stable enough to cache.
    pub fn disabled() -> Self {
        Self {
            degraded: true,
            ..Self::default()
        }
    }
}

pub struct ModelAnalyzer {
    provider: Arc<dyn ModelProvider>,
    settings: ModelConfig,
}

impl ModelAnalyzer {
    pub fn new(provider: Arc<dyn ModelProvider>, settings: ModelConfig) -> Self {
        Self { provider, settings }
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub async fn analyze(&self, path: &str, source: &str, cancel: &CancelToken) -> ModelAnalysis {
        let line_count = source.lines().count().max(1);
        let chunks = chunk_source(source, self.settings.token_budget);
        let policy = RetryPolicy {
            max_attempts: self.settings.retry_attempts,
            base_delay: Duration::from_millis(self.settings.retry_base_delay_ms),
        };
        let timeout = Duration::from_secs(self.settings.timeout_seconds);

        let mut analysis = ModelAnalysis::default();
        let mut summaries: Vec<String> = Vec::new();

        for chunk in &chunks {
            let request = ModelRequest {
                system_prompt: prompts::SYSTEM_PROMPT.to_string(),
                user_prompt: prompts::user_prompt(path, chunk),
                temperature: self.settings.temperature,
                max_tokens: self.settings.max_tokens,
            };

            let outcome = run_with_retry(&policy, cancel, |_| {
                let request = request.clone();
                async move {
                    match tokio::time::timeout(timeout, self.provider.complete(request)).await {
                        Ok(result) => result,
                        Err(_) => Err(ModelError::Timeout(timeout.as_secs())),
                    }
                }
            })
            .await;

            match outcome {
                RetryOutcome::Success { value, attempts } => {
                    debug!(attempts, chunk_start = chunk.start_line, "model chunk analyzed");
                    self.absorb_response(
                        &value.content,
                        path,
                        chunk,
                        line_count,
                        &mut analysis,
                        &mut summaries,
                    );
                }
                RetryOutcome::Exhausted { attempts, last_error } => {
                    warn!(attempts, error = %last_error, "model analysis failed, result degraded");
                    analysis.degraded = true;
                    analysis.transient = true;
                }
                RetryOutcome::Cancelled { .. } => {
                    debug!("model analysis cancelled, result degraded");
                    analysis.degraded = true;
                    analysis.transient = true;
                    break;
                }
            }
        }

        if !summaries.is_empty() {
            analysis.summary = Some(summaries.join(" "));
        }
        analysis
    }

    fn absorb_response(
        &self,
        content: &str,
        path: &str,
        chunk: &SourceChunk,
        line_count: usize,
        analysis: &mut ModelAnalysis,
        summaries: &mut Vec<String>,
    ) {
        let report = match parse_report(content) {
            Ok(report) => report,
            Err(error) => {
                warn!(error = %error, "model response unusable, result degraded");
                analysis.degraded = true;
                analysis.transient = true;
                analysis.findings.push(response_error_finding(
                    path,
                    chunk.start_line,
                    &error.to_string(),
                ));
                return;
            }
        };

        if let Some(summary) = &report.summary {
            if !summary.trim().is_empty() {
                summaries.push(summary.clone());
            }
        }

        if report.unusable() {
            warn!(
                discarded = report.discarded,
                "model response carried no usable findings, result degraded"
            );
            analysis.degraded = true;
            analysis.transient = true;
            analysis.findings.push(response_error_finding(
                path,
                chunk.start_line,
                "every findings element was malformed",
            ));
            return;
        }

        if report.discarded > 0 {
            debug!(discarded = report.discarded, "partially salvaged model response");
        }
        for raw in report.findings {
            analysis
                .findings
                .push(self.convert(raw, path, chunk.start_line, line_count));
        }
    }

    fn convert(
        &self,
        raw: ModelFinding,
        path: &str,
        chunk_start: usize,
        line_count: usize,
    ) -> Finding {
        let severity = raw
            .severity
            .as_deref()
            .and_then(|s| s.parse::<Severity>().ok())
            .unwrap_or(Severity::Medium);
        let confidence = raw.confidence.unwrap_or(self.settings.default_confidence);
        let line = raw
            .line
            .map(|l| chunk_start + l.max(1) as usize - 1)
            .unwrap_or(chunk_start)
            .min(line_count);
        let category = Category::from(raw.category);
        let description = raw
            .rationale
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| format!("Model flagged a {category} issue."));

        let mut finding = Finding::new(
            "model",
            category,
            severity,
            confidence,
            description,
            Location::new(path, line, 0),
        )
        .with_source(FindingSource::Model);
        if let Some(snippet) = raw.snippet {
            finding = finding.with_snippet(snippet);
        }
        finding
    }
}

fn response_error_finding(path: &str, line: usize, detail: &str) -> Finding {
    Finding::new(
        "model-response",
        Category::ModelResponseError,
        Severity::Low,
        0.9,
        format!("Model response could not be used: {detail}"),
        Location::new(path, line, 0),
    )
    .with_source(FindingSource::Model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::mock::MockModelProvider;
    use crate::model::schemas::ModelReport;

    fn fast_settings() -> ModelConfig {
        ModelConfig {
            retry_attempts: 1,
            retry_base_delay_ms: 1,
            timeout_seconds: 5,
            ..ModelConfig::default()
        }
    }

    fn analyzer_with(provider: Arc<MockModelProvider>) -> ModelAnalyzer {
        ModelAnalyzer::new(provider, fast_settings())
    }

    fn report(category: &str, line: u64, severity: &str, confidence: f64) -> ModelReport {
        ModelReport {
            findings: vec![ModelFinding {
                category: category.to_string(),
                line: Some(line),
                severity: Some(severity.to_string()),
                confidence: Some(confidence),
                rationale: Some("reasoned about data flow".to_string()),
                snippet: None,
            }],
            analysis_summary: Some("one issue".to_string()),
        }
    }

    #[tokio::test]
    async fn converts_reported_findings_to_absolute_lines() {
        let provider = Arc::new(
            MockModelProvider::new()
                .with_delay(Duration::ZERO)
                .with_default_report(report("sql-injection", 2, "high", 0.8)),
        );
        let analyzer = analyzer_with(Arc::clone(&provider));
        let source = "import db\nq = f\"select {x}\"\ncur.execute(q)\n";
        let analysis = analyzer
            .analyze("app.py", source, &CancelToken::new())
            .await;

        assert!(!analysis.degraded);
        assert_eq!(analysis.findings.len(), 1);
        let finding = &analysis.findings[0];
        assert_eq!(finding.category, Category::SqlInjection);
        assert_eq!(finding.severity, Severity::High);
        assert_eq!(finding.confidence, 0.8);
        assert_eq!(finding.location.line, 2);
        assert_eq!(finding.source, FindingSource::Model);
        assert_eq!(analysis.summary.as_deref(), Some("one issue"));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn transport_failure_degrades_without_findings() {
        let provider = Arc::new(MockModelProvider::failing().with_delay(Duration::ZERO));
        let analyzer = analyzer_with(provider);
        let analysis = analyzer
            .analyze("app.py", "x = 1\n", &CancelToken::new())
            .await;
        assert!(analysis.degraded);
        assert!(analysis.transient);
        assert!(analysis.findings.is_empty());
    }

    #[tokio::test]
    async fn garbage_response_yields_diagnostic_finding() {
        let provider = Arc::new(
            MockModelProvider::new()
                .with_delay(Duration::ZERO)
                .with_raw_content("", "sorry, I cannot analyze this"),
        );
        let analyzer = analyzer_with(provider);
        let analysis = analyzer
            .analyze("app.py", "x = 1\n", &CancelToken::new())
            .await;
        assert!(analysis.degraded);
        assert!(analysis.transient);
        assert_eq!(analysis.findings.len(), 1);
        assert_eq!(analysis.findings[0].category, Category::ModelResponseError);
        assert_eq!(analysis.findings[0].severity, Severity::Low);
    }

    #[tokio::test]
    async fn missing_fields_fall_back_to_defaults() {
        let provider = Arc::new(
            MockModelProvider::new()
                .with_delay(Duration::ZERO)
                .with_default_report(ModelReport {
                    findings: vec![ModelFinding {
                        category: "info-disclosure".to_string(),
                        line: None,
                        severity: None,
                        confidence: None,
                        rationale: None,
                        snippet: None,
                    }],
                    analysis_summary: None,
                }),
        );
        let settings = fast_settings();
        let default_confidence = settings.default_confidence;
        let analyzer = analyzer_with(provider);
        let analysis = analyzer
            .analyze("app.py", "x = 1\ny = 2\n", &CancelToken::new())
            .await;
        let finding = &analysis.findings[0];
        assert_eq!(finding.severity, Severity::Medium);
        assert_eq!(finding.confidence, default_confidence);
        assert_eq!(finding.location.line, 1);
    }

    #[tokio::test]
    async fn reported_lines_are_clamped_to_the_file() {
        let provider = Arc::new(
            MockModelProvider::new()
                .with_delay(Duration::ZERO)
                .with_default_report(report("path-traversal", 999, "medium", 0.6)),
        );
        let analyzer = analyzer_with(provider);
        let analysis = analyzer
            .analyze("app.py", "a = 1\nb = 2\nc = 3\n", &CancelToken::new())
            .await;
        assert_eq!(analysis.findings[0].location.line, 3);
    }

    #[tokio::test]
    async fn cancelled_token_skips_the_provider() {
        let provider = Arc::new(MockModelProvider::new().with_delay(Duration::ZERO));
        let cancel = CancelToken::new();
        cancel.cancel();
        let analyzer = analyzer_with(Arc::clone(&provider));
        let analysis = analyzer.analyze("app.py", "x = 1\n", &cancel).await;
        assert!(analysis.degraded);
        assert!(analysis.transient);
        assert_eq!(provider.call_count(), 0);
    }
}
