//! Pipeline coordination for Newsreel.
//!
//! Runs one request through intent resolution, research, content generation
//! and media synthesis, and exposes the conversation index alongside it.

use crate::capability::{Capabilities, CompletionProvider, OpenAiCompletion};
use crate::config::{Prompts, Settings};
use crate::conversation::{Answer, ConversationIndex};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::Result;
use crate::generation::{ContentGenerator, GeneratedContent};
use crate::intent::{IntentResolver, MessageSource, RepeatMessage};
use crate::request::MediaRequest;
use crate::research::{ResearchDocument, ResearchFetcher, ResearchStore};
use crate::synthesis::{MediaArtifact, MediaSynthesizer};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Everything produced for one request.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub request: MediaRequest,
    pub content: GeneratedContent,
    pub artifact: MediaArtifact,
    /// Number of research items the brief was written from.
    pub research_items: usize,
}

/// The main pipeline.
pub struct Pipeline {
    intent: IntentResolver,
    research_store: Arc<ResearchStore>,
    fetcher: ResearchFetcher,
    generator: ContentGenerator,
    synthesizer: MediaSynthesizer,
    index: ConversationIndex,
}

impl Pipeline {
    /// Build the pipeline with production services.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(settings.prompts.custom_dir.as_deref())?;
        let capabilities = Capabilities::from_settings(&settings)?;
        let credentials = settings.credentials();

        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::new(
            credentials.openai_api_key.as_deref(),
            &settings.index.embedding_model,
            settings.index.dimensions as usize,
        ));
        let answerer: Arc<dyn CompletionProvider> = Arc::new(OpenAiCompletion::new(
            credentials.openai_api_key.as_deref(),
            &settings.index.model,
        ));

        Ok(Self::with_components(settings, prompts, capabilities, embedder, answerer))
    }

    /// Build the pipeline around the given services.
    ///
    /// `answerer` is the completion service used by the conversation index.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        capabilities: Capabilities,
        embedder: Arc<dyn Embedder>,
        answerer: Arc<dyn CompletionProvider>,
    ) -> Self {
        let research_store = Arc::new(ResearchStore::new(settings.research_dir()));

        let intent = IntentResolver::new(
            capabilities.completion.clone(),
            &prompts.intent.tool_description,
            settings.intent.attempts(),
            settings.timeouts.completion(),
        );

        let fetcher = ResearchFetcher::new(
            capabilities.market_data.clone(),
            capabilities.extractor.clone(),
            capabilities.http.clone(),
            research_store.clone(),
            &settings,
        );

        let generator = ContentGenerator::new(
            capabilities.completion.clone(),
            prompts.brief.clone(),
            settings.timeouts.completion(),
        );

        let synthesizer = MediaSynthesizer::new(capabilities.speech.clone(), capabilities.animator.clone(), &settings);

        let index = ConversationIndex::open(
            settings.storage_dir().join("index.db"),
            research_store.clone(),
            embedder,
            answerer,
            prompts.rag.clone(),
            &settings.index,
            &settings.timeouts,
        );

        Self {
            intent,
            research_store,
            fetcher,
            generator,
            synthesizer,
            index,
        }
    }

    pub fn research_store(&self) -> &Arc<ResearchStore> {
        &self.research_store
    }

    /// Root directory artifacts are written under.
    pub fn output_root(&self) -> &Path {
        self.synthesizer.output_root()
    }

    /// Maximum intent attempts per request.
    pub fn max_attempts(&self) -> usize {
        self.intent.max_attempts()
    }

    /// Resolve a request from `source` and run it.
    pub async fn run(&self, source: &mut dyn MessageSource, cancel: &CancellationToken) -> Result<PipelineOutcome> {
        let request = self.intent.resolve(source, cancel).await?;
        self.run_request(request, cancel).await
    }

    /// Run a single free-text message, re-sending it on each intent attempt.
    pub async fn run_message(&self, message: &str, cancel: &CancellationToken) -> Result<PipelineOutcome> {
        self.run(&mut RepeatMessage::new(message), cancel).await
    }

    /// Run an already resolved request.
    #[instrument(skip(self, cancel), fields(request = %request.summary()))]
    pub async fn run_request(&self, request: MediaRequest, cancel: &CancellationToken) -> Result<PipelineOutcome> {
        let research = self.fetcher.fetch(&request, cancel).await?;
        info!("Research ready ({} items)", research.len());
        self.render(research, request, cancel).await
    }

    /// Generate and synthesize from research that is already at hand.
    pub async fn render(
        &self,
        research: ResearchDocument,
        request: MediaRequest,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutcome> {
        let content = self.generator.generate(&research, &request, cancel).await?;
        let artifact = self.synthesizer.synthesize(&content, &request, cancel).await?;

        Ok(PipelineOutcome {
            request,
            content,
            artifact,
            research_items: research.len(),
        })
    }

    /// Answer a question over collected research.
    pub async fn ask(&self, question: &str, cancel: &CancellationToken) -> Result<Answer> {
        self.index.query(question, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{
        Animator, CapabilityResult, FrameStream, MarketData, NewsItem, SelectorExtractor, SpeechSynthesizer,
        ToolInvocation, ToolSpec,
    };
    use crate::error::NewsreelError;
    use crate::intent::TOOL_NAME;
    use crate::request::{Category, MediaFormat};
    use crate::research::{Article, ResearchDocument};
    use crate::synthesis::{NEWS_FILE, SPEECH_FILE};
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Classifies every message as the configured request and writes a brief
    /// that quotes the first line of the prompt.
    struct FakeCompletion {
        arguments: String,
    }

    #[async_trait]
    impl CompletionProvider for FakeCompletion {
        async fn complete(&self, system_prompt: &str) -> CapabilityResult<String> {
            let first = system_prompt.lines().next().unwrap_or_default();
            Ok(format!("Today's brief. {}", first))
        }

        async fn complete_with_tool(
            &self,
            _user_message: &str,
            _tool: &ToolSpec,
        ) -> CapabilityResult<Option<ToolInvocation>> {
            Ok(Some(ToolInvocation {
                name: TOOL_NAME.to_string(),
                arguments: self.arguments.clone(),
            }))
        }
    }

    struct FakeSpeech;

    #[async_trait]
    impl SpeechSynthesizer for FakeSpeech {
        async fn synthesize_speech(&self, _text: &str) -> CapabilityResult<Bytes> {
            Ok(Bytes::from_static(b"ID3fake"))
        }
    }

    struct CountingAnimator {
        calls: AtomicUsize,
    }

    impl Animator for CountingAnimator {
        fn render_frames(&self, _prompt: &str, _frame_count: u32) -> FrameStream {
            self.calls.fetch_add(1, Ordering::SeqCst);
            futures::stream::empty().boxed()
        }
    }

    struct ThreeHeadlines {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MarketData for ThreeHeadlines {
        async fn recent_news(&self, ticker: &str) -> CapabilityResult<Vec<NewsItem>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((0..3)
                .map(|i| NewsItem {
                    title: format!("{} headline {}", ticker, i),
                    link: format!("http://127.0.0.1:9/{}/{}", ticker, i),
                })
                .collect())
        }
    }

    struct NoEmbeddings;

    #[async_trait]
    impl Embedder for NoEmbeddings {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.0]).collect())
        }

        fn dimensions(&self) -> usize {
            1
        }
    }

    struct Fixture {
        pipeline: Pipeline,
        animator: Arc<CountingAnimator>,
        market: Arc<ThreeHeadlines>,
        _dir: tempfile::TempDir,
    }

    fn fixture(format: &str, category: &str, subject: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.general.data_dir = dir.path().to_string_lossy().to_string();
        settings.timeouts.scrape_secs = 2;

        let completion = Arc::new(FakeCompletion {
            arguments: serde_json::json!({"format": format, "category": category, "subject": subject}).to_string(),
        });
        let animator = Arc::new(CountingAnimator {
            calls: AtomicUsize::new(0),
        });
        let market = Arc::new(ThreeHeadlines {
            calls: AtomicUsize::new(0),
        });

        let capabilities = Capabilities {
            completion: completion.clone(),
            speech: Arc::new(FakeSpeech),
            animator: animator.clone(),
            market_data: market.clone(),
            extractor: Arc::new(SelectorExtractor::new("caas-body")),
            http: reqwest::Client::new(),
        };

        let pipeline = Pipeline::with_components(
            settings,
            Prompts::default(),
            capabilities,
            Arc::new(NoEmbeddings),
            completion,
        );

        Fixture {
            pipeline,
            animator,
            market,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_text_ticker_brief_is_written() {
        let fx = fixture("text", "ticker", "aapl");

        let outcome = fx
            .pipeline
            .run_message("Give me a newsletter on Apple stock", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.request.subject(), "AAPL");
        assert_eq!(outcome.research_items, 3);
        assert_eq!(outcome.artifact.path, fx.pipeline.output_root().join(NEWS_FILE));

        let text = std::fs::read_to_string(&outcome.artifact.path).unwrap();
        assert!(!text.is_empty());
        assert!(text.contains("AAPL"));

        let saved = fx.pipeline.research_store().load("AAPL").await.unwrap().unwrap();
        assert_eq!(saved.len(), 3);
        assert_eq!(fx.market.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_audio_market_brief_skips_animation() {
        let fx = fixture("audio", "market", "general");

        let outcome = fx
            .pipeline
            .run_message("Podcast about the market today", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.artifact.format, MediaFormat::Audio);
        assert_eq!(outcome.artifact.path.file_name().unwrap(), SPEECH_FILE);
        assert!(outcome.content.visual_prompt.is_none());
        assert_eq!(fx.animator.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fx.market.calls.load(Ordering::SeqCst), 0);

        let files: Vec<_> = std::fs::read_dir(fx.pipeline.output_root()).unwrap().flatten().collect();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn test_render_uses_saved_research() {
        let fx = fixture("text", "news", "unused");
        let request = MediaRequest::new(MediaFormat::Text, Category::Ticker, "MSFT").unwrap();
        let research = ResearchDocument::Articles(vec![Article {
            title: "Azure grows".into(),
            url: "https://news.example/azure".into(),
            content: "Cloud revenue climbed.".into(),
        }]);

        let outcome = fx
            .pipeline
            .render(research, request, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.research_items, 1);
        assert_eq!(fx.market.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ask_without_research_is_unavailable() {
        let fx = fixture("text", "news", "rates");
        let err = fx.pipeline.ask("anything new?", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, NewsreelError::IndexUnavailable(_)));
    }
}
