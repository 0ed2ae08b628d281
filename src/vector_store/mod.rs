//! Vector store for research passages.
//!
//! Provides a trait-based interface so the conversation index can run
//! against SQLite on disk or an in-memory map in tests.

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A slice of a research article stored with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    pub id: Uuid,
    /// Research key (file stem under `research/`) the article came from.
    pub subject: String,
    /// Article title.
    pub title: String,
    /// Article URL.
    pub url: String,
    /// Text of this passage.
    pub content: String,
    pub embedding: Vec<f32>,
    /// Position of the passage within its subject.
    pub passage_order: i32,
    pub indexed_at: DateTime<Utc>,
}

impl Passage {
    pub fn new(
        subject: String,
        title: String,
        url: String,
        content: String,
        embedding: Vec<f32>,
        passage_order: i32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject,
            title,
            url,
            content,
            embedding,
            passage_order,
            indexed_at: Utc::now(),
        }
    }
}

/// A search result with score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub passage: Passage,
    /// Similarity score (higher is better).
    pub score: f32,
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Bulk upsert passages.
    async fn upsert_batch(&self, passages: &[Passage]) -> Result<usize>;

    /// Search with a minimum similarity threshold.
    async fn search_with_threshold(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>>;

    /// Total passage count.
    async fn document_count(&self) -> Result<usize>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Sort results by descending score and keep the best `limit`.
pub(crate) fn rank(mut results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(limit);
    results
}
