//! Narrow interfaces to the external services the pipeline depends on.
//!
//! Every stage talks to these traits only; concrete adapters live in the
//! submodules and are wired together in [`Capabilities`].

mod extract;
mod market;
mod openai;
mod stability;

pub use extract::SelectorExtractor;
pub use market::YahooFinance;
pub use openai::{OpenAiCompletion, OpenAiSpeech};
pub use stability::StabilityAnimator;

use crate::config::Settings;
use crate::error::CapabilityError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Result type for capability calls.
pub type CapabilityResult<T> = std::result::Result<T, CapabilityError>;

/// A function the completion service may be asked to call.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: serde_json::Value,
}

/// The function call the completion service chose to make.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub name: String,
    /// Raw JSON arguments as returned by the service.
    pub arguments: String,
}

/// A headline returned by the market-data service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub link: String,
}

/// One rendered animation frame, PNG encoded.
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: u32,
    pub png: Bytes,
}

/// Lazy, finite frame sequence. Each render call yields a fresh stream.
pub type FrameStream = BoxStream<'static, CapabilityResult<Frame>>;

/// Text completion.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Complete a single system prompt.
    async fn complete(&self, system_prompt: &str) -> CapabilityResult<String>;

    /// Ask the model to answer by calling `tool`. Returns `None` when the
    /// model replied without a tool call.
    async fn complete_with_tool(
        &self,
        user_message: &str,
        tool: &ToolSpec,
    ) -> CapabilityResult<Option<ToolInvocation>>;
}

/// Text-to-speech.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize speech; returns encoded audio (mp3).
    async fn synthesize_speech(&self, text: &str) -> CapabilityResult<Bytes>;
}

/// Prompt-driven frame animation.
pub trait Animator: Send + Sync {
    fn render_frames(&self, prompt: &str, frame_count: u32) -> FrameStream;
}

/// Recent news for a ticker.
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn recent_news(&self, ticker: &str) -> CapabilityResult<Vec<NewsItem>>;
}

/// Best-effort main-content extraction from an HTML page.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, html: &str) -> Option<String>;
}

/// Run a capability call under a timeout while honouring cancellation.
///
/// Cancellation is checked before the call starts and raced against it. A
/// timeout is reported as [`CapabilityError::Timeout`], never as a
/// malformed response.
pub async fn guarded<T, F>(
    cancel: &CancellationToken,
    capability: &'static str,
    limit: Duration,
    call: F,
) -> CapabilityResult<T>
where
    F: Future<Output = CapabilityResult<T>>,
{
    if cancel.is_cancelled() {
        return Err(CapabilityError::Cancelled(capability));
    }

    tokio::select! {
        _ = cancel.cancelled() => Err(CapabilityError::Cancelled(capability)),
        outcome = tokio::time::timeout(limit, call) => match outcome {
            Ok(result) => result,
            Err(_) => Err(CapabilityError::Timeout { capability, after: limit }),
        },
    }
}

/// The full set of external services used by a pipeline.
#[derive(Clone)]
pub struct Capabilities {
    pub completion: Arc<dyn CompletionProvider>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub animator: Arc<dyn Animator>,
    pub market_data: Arc<dyn MarketData>,
    pub extractor: Arc<dyn TextExtractor>,
    /// Client used to download article pages.
    pub http: reqwest::Client,
}

impl Capabilities {
    /// Build the production adapters from settings and resolved credentials.
    pub fn from_settings(settings: &Settings) -> crate::Result<Self> {
        let credentials = settings.credentials();

        let http = reqwest::Client::builder()
            .user_agent(settings.research.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| crate::NewsreelError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            completion: Arc::new(OpenAiCompletion::new(
                credentials.openai_api_key.as_deref(),
                &settings.completion.model,
            )),
            speech: Arc::new(OpenAiSpeech::new(
                credentials.openai_api_key.as_deref(),
                &settings.speech,
            )),
            animator: Arc::new(StabilityAnimator::new(
                http.clone(),
                credentials.stability_api_key,
                settings.animation.clone(),
            )),
            market_data: Arc::new(YahooFinance::new(http.clone(), &settings.market_data)),
            extractor: Arc::new(SelectorExtractor::new(&settings.research.content_class)),
            http,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_guarded_reports_timeout() {
        let cancel = CancellationToken::new();
        let result: CapabilityResult<()> = guarded(&cancel, "speech", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(CapabilityError::Timeout { capability: "speech", .. })));
    }

    #[tokio::test]
    async fn test_guarded_skips_call_when_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let called = std::sync::atomic::AtomicBool::new(false);
        let result = guarded(&cancel, "completion", Duration::from_secs(1), async {
            called.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(1)
        })
        .await;

        assert!(matches!(result, Err(CapabilityError::Cancelled("completion"))));
        assert!(!called.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_guarded_passes_through_result() {
        let cancel = CancellationToken::new();
        let result = guarded(&cancel, "completion", Duration::from_secs(1), async { Ok("done") }).await;
        assert_eq!(result.unwrap(), "done");
    }
}
