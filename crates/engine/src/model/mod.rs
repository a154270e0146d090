//! The model analyzer: a chat-completion provider behind a trait, prompt
//! and chunk assembly, response decoding, and the retry machinery that
//! turns every failure mode into local degradation.

pub mod analyzer;
pub mod cancel;
pub mod chunk;
pub mod mock;
pub mod openai;
pub mod prompts;
pub mod provider;
pub mod retry;
pub mod schemas;

pub use analyzer::{ModelAnalysis, ModelAnalyzer};
pub use cancel::CancelToken;
pub use chunk::{chunk_source, SourceChunk};
pub use mock::MockModelProvider;
pub use openai::OpenAIProvider;
pub use provider::{ModelProvider, ModelRequest, ModelResponse, TokenUsage};
pub use retry::{run_with_retry, RetryOutcome, RetryPolicy};
pub use schemas::{parse_report, ModelFinding, ModelReport, ParsedReport};
