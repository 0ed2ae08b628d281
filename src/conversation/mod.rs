//! Question answering over collected research.
//!
//! The index is prepared at most once per process: an existing passage store
//! is reused as-is, otherwise every research document is split, embedded and
//! written to it. Questions are answered from the best-matching passages.

mod context;
pub(crate) mod passages;

pub use context::{format_context_for_prompt, Source};
pub use passages::{has_content, split_passages};

use crate::capability::{guarded, CompletionProvider};
use crate::config::{IndexSettings, Prompts, RagPrompts, TimeoutSettings};
use crate::embedding::Embedder;
use crate::error::{CapabilityError, NewsreelError, Result};
use crate::research::ResearchStore;
use crate::vector_store::{Passage, SqliteVectorStore, VectorStore};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Returned when no passage is relevant enough to answer from.
pub const NO_MATCH_ANSWER: &str =
    "I couldn't find anything relevant to that question in the collected research.";

/// An answer and the passages it was drawn from.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<Source>,
}

impl Answer {
    /// Format the answer for terminal display.
    pub fn format_for_display(&self) -> String {
        let mut output = self.text.clone();

        if !self.sources.is_empty() {
            output.push_str("\n\n--- Sources ---\n");
            for source in &self.sources {
                output.push_str(&format!("\n{} (score: {:.2})\n  {}", source.title, source.score, source.url));
            }
        }

        output
    }
}

enum Backend {
    Sqlite(PathBuf),
    Ready(Arc<dyn VectorStore>),
}

pub struct ConversationIndex {
    backend: Backend,
    store: OnceCell<Arc<dyn VectorStore>>,
    research: Arc<ResearchStore>,
    embedder: Arc<dyn Embedder>,
    completion: Arc<dyn CompletionProvider>,
    prompts: RagPrompts,
    max_chunks: usize,
    min_score: f32,
    passage_chars: usize,
    timeout: Duration,
    embedding_timeout: Duration,
}

impl ConversationIndex {
    /// Index persisted in SQLite at `db_path`.
    pub fn open(
        db_path: PathBuf,
        research: Arc<ResearchStore>,
        embedder: Arc<dyn Embedder>,
        completion: Arc<dyn CompletionProvider>,
        prompts: RagPrompts,
        settings: &IndexSettings,
        timeouts: &TimeoutSettings,
    ) -> Self {
        Self::with_backend(Backend::Sqlite(db_path), research, embedder, completion, prompts, settings, timeouts)
    }

    /// Index over an already constructed store.
    pub fn with_store(
        store: Arc<dyn VectorStore>,
        research: Arc<ResearchStore>,
        embedder: Arc<dyn Embedder>,
        completion: Arc<dyn CompletionProvider>,
        prompts: RagPrompts,
        settings: &IndexSettings,
        timeouts: &TimeoutSettings,
    ) -> Self {
        Self::with_backend(Backend::Ready(store), research, embedder, completion, prompts, settings, timeouts)
    }

    fn with_backend(
        backend: Backend,
        research: Arc<ResearchStore>,
        embedder: Arc<dyn Embedder>,
        completion: Arc<dyn CompletionProvider>,
        prompts: RagPrompts,
        settings: &IndexSettings,
        timeouts: &TimeoutSettings,
    ) -> Self {
        Self {
            backend,
            store: OnceCell::new(),
            research,
            embedder,
            completion,
            prompts,
            max_chunks: settings.max_context_chunks.max(1),
            min_score: settings.min_score,
            passage_chars: settings.passage_chars,
            timeout: timeouts.completion(),
            embedding_timeout: timeouts.embedding(),
        }
    }

    /// The ready store, loading or building it on first use.
    async fn store(&self, cancel: &CancellationToken) -> Result<&Arc<dyn VectorStore>> {
        self.store.get_or_try_init(|| self.load_or_build(cancel)).await
    }

    async fn load_or_build(&self, cancel: &CancellationToken) -> Result<Arc<dyn VectorStore>> {
        let store: Arc<dyn VectorStore> = match &self.backend {
            Backend::Sqlite(path) => Arc::new(SqliteVectorStore::new(path)?),
            Backend::Ready(store) => Arc::clone(store),
        };

        let existing = store.document_count().await?;
        if existing > 0 {
            info!("Loaded index with {} passages", existing);
            return Ok(store);
        }

        self.build(store.as_ref(), cancel).await?;
        Ok(store)
    }

    /// Embed and store every research document.
    #[instrument(skip_all)]
    async fn build(&self, store: &dyn VectorStore, cancel: &CancellationToken) -> Result<()> {
        let documents = self.research.list().await?;

        let mut passages = Vec::new();
        for (subject, articles) in &documents {
            let mut order = 0;
            for article in articles.iter().filter(|a| has_content(a)) {
                for text in split_passages(&article.content, self.passage_chars) {
                    passages.push((subject.clone(), article.title.clone(), article.url.clone(), text, order));
                    order += 1;
                }
            }
        }

        if passages.is_empty() {
            return Err(NewsreelError::IndexUnavailable(self.research.dir().to_path_buf()));
        }

        info!("Indexing {} passages from {} documents", passages.len(), documents.len());

        let texts: Vec<String> = passages.iter().map(|p| p.3.clone()).collect();
        let embeddings = self.embedding(cancel, self.embedder.embed_batch(&texts)).await?;

        let passages: Vec<Passage> = passages
            .into_iter()
            .zip(embeddings)
            .map(|((subject, title, url, content, order), embedding)| {
                Passage::new(subject, title, url, content, embedding, order)
            })
            .collect();

        store.upsert_batch(&passages).await?;
        Ok(())
    }

    /// Run an embedding call under the embedding timeout and `cancel`.
    async fn embedding<T>(
        &self,
        cancel: &CancellationToken,
        call: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        guarded(cancel, "embedding", self.embedding_timeout, async { Ok(call.await) })
            .await
            .map_err(|e| match e {
                CapabilityError::Cancelled(_) => NewsreelError::Cancelled,
                other => NewsreelError::Embedding(other.to_string()),
            })?
    }

    /// Answer a question from the indexed research.
    #[instrument(skip(self, cancel))]
    pub async fn query(&self, question: &str, cancel: &CancellationToken) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(NewsreelError::InvalidInput("Question is empty".to_string()));
        }

        let store = self.store(cancel).await?;

        let query_embedding = self.embedding(cancel, self.embedder.embed(question)).await?;
        let results = store
            .search_with_threshold(&query_embedding, self.max_chunks, self.min_score)
            .await?;

        if results.is_empty() {
            return Ok(Answer {
                text: NO_MATCH_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }

        let sources: Vec<Source> = results.into_iter().map(Source::from).collect();

        let mut vars = HashMap::new();
        vars.insert("question".to_string(), question.to_string());
        vars.insert("context".to_string(), format_context_for_prompt(&sources));
        let user_prompt = Prompts::render(&self.prompts.user, &vars);
        let prompt = format!("{}\n\n{}", self.prompts.system, user_prompt);

        let text = guarded(cancel, "completion", self.timeout, self.completion.complete(&prompt))
            .await
            .map_err(NewsreelError::generation)?;

        if text.trim().is_empty() {
            return Err(NewsreelError::generation(CapabilityError::malformed(
                "completion",
                "empty answer",
            )));
        }

        info!("Answered from {} passages", sources.len());
        Ok(Answer {
            text: text.trim().to_string(),
            sources,
        })
    }
}
