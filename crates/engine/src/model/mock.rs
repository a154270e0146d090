//! In-process provider for tests: canned reports, optional failure mode,
//! and a call counter for cache assertions.

use crate::error::ModelError;
use crate::model::provider::{ModelProvider, ModelRequest, ModelResponse, TokenUsage};
use crate::model::schemas::ModelReport;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
enum MockReply {
    Report(ModelReport),
    Raw(String),
}

impl MockReply {
    fn render(&self) -> Result<String, ModelError> {
        match self {
            MockReply::Raw(content) => Ok(content.clone()),
            MockReply::Report(report) => serde_json::to_string(report)
                .map_err(|e| ModelError::UnusableResponse(e.to_string())),
        }
    }
}

pub struct MockModelProvider {
    replies: Vec<(String, MockReply)>,
    default_reply: MockReply,
    fail: bool,
    delay: Duration,
    call_count: AtomicUsize,
}

impl MockModelProvider {
    pub fn new() -> Self {
        Self {
            replies: Vec::new(),
            default_reply: MockReply::Report(ModelReport::default()),
            fail: false,
            delay: Duration::from_millis(10),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Every call fails with a transport error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// Returns `report` for prompts containing `pattern`.
    pub fn with_report(mut self, pattern: &str, report: ModelReport) -> Self {
        self.replies.push((pattern.to_string(), MockReply::Report(report)));
        self
    }

    /// Returns raw text for prompts containing `pattern`, for exercising
    /// the salvage path.
    pub fn with_raw_content(mut self, pattern: &str, content: &str) -> Self {
        self.replies
            .push((pattern.to_string(), MockReply::Raw(content.to_string())));
        self
    }

    pub fn with_default_report(mut self, report: ModelReport) -> Self {
        self.default_reply = MockReply::Report(report);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl Default for MockModelProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelProvider for MockModelProvider {
    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;

        if self.fail {
            return Err(ModelError::Network("simulated connection failure".to_string()));
        }

        let reply = self
            .replies
            .iter()
            .find(|(pattern, _)| request.user_prompt.contains(pattern))
            .map(|(_, reply)| reply)
            .unwrap_or(&self.default_reply);

        let content = reply.render()?;
        let prompt_tokens = self.estimate_tokens(&request.user_prompt) as u32;
        let completion_tokens = self.estimate_tokens(&content) as u32;

        Ok(ModelResponse {
            content,
            model: "mock-model".to_string(),
            usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
        })
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::schemas::ModelFinding;

    fn request(user_prompt: &str) -> ModelRequest {
        ModelRequest {
            system_prompt: "system".to_string(),
            user_prompt: user_prompt.to_string(),
            temperature: 0.2,
            max_tokens: 1000,
        }
    }

    fn one_finding_report(category: &str) -> ModelReport {
        ModelReport {
            findings: vec![ModelFinding {
                category: category.to_string(),
                line: Some(1),
                severity: Some("high".to_string()),
                confidence: Some(0.9),
                rationale: Some("canned".to_string()),
                snippet: None,
            }],
            analysis_summary: None,
        }
    }

    #[tokio::test]
    async fn default_reply_is_an_empty_report() {
        let provider = MockModelProvider::new().with_delay(Duration::ZERO);
        let response = provider.complete(request("anything")).await.unwrap();
        assert_eq!(response.content, r#"{"findings":[]}"#);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn pattern_matching_selects_the_reply() {
        let provider = MockModelProvider::new()
            .with_delay(Duration::ZERO)
            .with_report("os.system", one_finding_report("command-injection"));
        let matched = provider.complete(request("audit os.system(cmd)")).await.unwrap();
        assert!(matched.content.contains("command-injection"));
        let unmatched = provider.complete(request("print(1)")).await.unwrap();
        assert_eq!(unmatched.content, r#"{"findings":[]}"#);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn failing_provider_returns_transport_errors() {
        let provider = MockModelProvider::failing().with_delay(Duration::ZERO);
        let error = provider.complete(request("x")).await.unwrap_err();
        assert!(matches!(error, ModelError::Network(_)));
        assert!(error.is_transient());
    }
}
