//! Script generation from research.

use crate::capability::{guarded, CompletionProvider};
use crate::config::BriefPrompts;
use crate::error::{CapabilityError, NewsreelError, Result};
use crate::request::{MediaFormat, MediaRequest};
use crate::research::ResearchDocument;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Delimiter wrapped around the research body in the prompt.
const RESEARCH_DELIMITER: &str = "###";

/// Text produced for a request. `visual_prompt` is only set for video.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedContent {
    pub script: String,
    pub visual_prompt: Option<String>,
}

/// Compose the brief prompt: category framing, format instructions, then the
/// delimited research body.
pub fn compose_prompt(tables: &BriefPrompts, request: &MediaRequest, research_body: &str) -> String {
    let mut vars = HashMap::new();
    vars.insert("subject".to_string(), request.subject().to_string());

    let framing = crate::config::Prompts::render(tables.category(request.category()), &vars);
    let style = tables.format(request.format());

    format!(
        "{}{}\n{delim}\n{}\n{delim}",
        framing,
        style,
        research_body,
        delim = RESEARCH_DELIMITER
    )
}

/// Compose the meta-prompt that turns a video script into a visual theme.
pub fn compose_visual_prompt(tables: &BriefPrompts, script: &str) -> String {
    format!(
        "{}\n{delim}\n{}\n{delim}",
        tables.visual,
        script,
        delim = RESEARCH_DELIMITER
    )
}

pub struct ContentGenerator {
    completion: Arc<dyn CompletionProvider>,
    tables: BriefPrompts,
    timeout: Duration,
}

impl ContentGenerator {
    pub fn new(completion: Arc<dyn CompletionProvider>, tables: BriefPrompts, timeout: Duration) -> Self {
        Self {
            completion,
            tables,
            timeout,
        }
    }

    /// Generate the script (and, for video, the visual theme).
    #[instrument(skip_all, fields(format = %request.format(), subject = %request.subject(), prompt_version = self.tables.version))]
    pub async fn generate(
        &self,
        research: &ResearchDocument,
        request: &MediaRequest,
        cancel: &CancellationToken,
    ) -> Result<GeneratedContent> {
        let prompt = compose_prompt(&self.tables, request, &research.body());
        debug!("Brief prompt is {} chars", prompt.len());

        let script = self.complete(&prompt, cancel).await?;
        info!("Generated script ({} chars)", script.len());

        let visual_prompt = match request.format() {
            MediaFormat::Video => {
                let meta = compose_visual_prompt(&self.tables, &script);
                let visual = self.complete(&meta, cancel).await?;
                info!("Visual theme: {}", visual);
                Some(visual)
            }
            MediaFormat::Text | MediaFormat::Audio => None,
        };

        Ok(GeneratedContent {
            script,
            visual_prompt,
        })
    }

    async fn complete(&self, prompt: &str, cancel: &CancellationToken) -> Result<String> {
        let text = guarded(cancel, "completion", self.timeout, self.completion.complete(prompt))
            .await
            .map_err(NewsreelError::generation)?;

        let text = text.trim();
        if text.is_empty() {
            return Err(NewsreelError::generation(CapabilityError::malformed(
                "completion",
                "empty response",
            )));
        }
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{CapabilityResult, ToolInvocation, ToolSpec};
    use crate::request::Category;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Echoes a numbered reply so repeated calls differ.
    struct EchoCompletion {
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl EchoCompletion {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionProvider for EchoCompletion {
        async fn complete(&self, system_prompt: &str) -> CapabilityResult<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(system_prompt.to_string());
            Ok(format!("reply {} ", n))
        }

        async fn complete_with_tool(
            &self,
            _user_message: &str,
            _tool: &ToolSpec,
        ) -> CapabilityResult<Option<ToolInvocation>> {
            Ok(None)
        }
    }

    struct SilentCompletion;

    #[async_trait]
    impl CompletionProvider for SilentCompletion {
        async fn complete(&self, _system_prompt: &str) -> CapabilityResult<String> {
            Ok("   ".to_string())
        }

        async fn complete_with_tool(
            &self,
            _user_message: &str,
            _tool: &ToolSpec,
        ) -> CapabilityResult<Option<ToolInvocation>> {
            Ok(None)
        }
    }

    fn research() -> ResearchDocument {
        ResearchDocument::Stub("stock research".to_string())
    }

    #[test]
    fn test_compose_prompt_layout() {
        let tables = BriefPrompts::default();
        let request = MediaRequest::new(MediaFormat::Audio, Category::Ticker, "msft").unwrap();

        let prompt = compose_prompt(&tables, &request, "BODY");
        assert_eq!(
            prompt,
            "Based on the following research articles, summarize if MSFT is doing well. \
             Format this summary as a script for a podcast.\n###\nBODY\n###"
        );
    }

    #[test]
    fn test_news_framing() {
        let tables = BriefPrompts::default();
        let request = MediaRequest::new(MediaFormat::Text, Category::News, "the bond market").unwrap();
        assert!(compose_prompt(&tables, &request, "").starts_with(
            "Based on the following research articles, summarize the state of the bond market."
        ));
    }

    #[tokio::test]
    async fn test_visual_prompt_only_for_video() {
        let completion = EchoCompletion::new();
        let generator = ContentGenerator::new(completion.clone(), BriefPrompts::default(), Duration::from_secs(5));
        let cancel = CancellationToken::new();

        for format in MediaFormat::ALL {
            for _ in 0..2 {
                let request = MediaRequest::new(format, Category::Ticker, "AAPL").unwrap();
                let content = generator.generate(&research(), &request, &cancel).await.unwrap();
                assert_eq!(content.visual_prompt.is_some(), format == MediaFormat::Video);
                assert!(!content.script.is_empty());
            }
        }

        // text x2 + audio x2 + video x2 (two calls each)
        assert_eq!(completion.calls.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn test_visual_meta_prompt_wraps_script() {
        let completion = EchoCompletion::new();
        let generator = ContentGenerator::new(completion.clone(), BriefPrompts::default(), Duration::from_secs(5));
        let request = MediaRequest::new(MediaFormat::Video, Category::Market, "general").unwrap();

        let content = generator
            .generate(&research(), &request, &CancellationToken::new())
            .await
            .unwrap();

        let prompts = completion.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains("must not contain any words"));
        assert!(prompts[1].contains(&content.script));
    }

    #[tokio::test]
    async fn test_empty_completion_is_generation_error() {
        let generator = ContentGenerator::new(Arc::new(SilentCompletion), BriefPrompts::default(), Duration::from_secs(5));
        let request = MediaRequest::new(MediaFormat::Text, Category::News, "rates").unwrap();

        let err = generator
            .generate(&research(), &request, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, NewsreelError::Generation(CapabilityError::Malformed { .. })));
    }
}
