//! In-memory vector store implementation.
//!
//! Useful for testing and small datasets.

use super::{cosine_similarity, rank, Passage, SearchResult, VectorStore};
use crate::error::{NewsreelError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// In-memory vector store.
#[derive(Default)]
pub struct MemoryVectorStore {
    passages: RwLock<HashMap<Uuid, Passage>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> NewsreelError {
    NewsreelError::VectorStore("Memory store lock poisoned".to_string())
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert_batch(&self, passages: &[Passage]) -> Result<usize> {
        let mut store = self.passages.write().map_err(poisoned)?;
        for passage in passages {
            store.insert(passage.id, passage.clone());
        }
        Ok(passages.len())
    }

    async fn search_with_threshold(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>> {
        let store = self.passages.read().map_err(poisoned)?;

        let results = store
            .values()
            .map(|passage| SearchResult {
                score: cosine_similarity(query_embedding, &passage.embedding),
                passage: passage.clone(),
            })
            .filter(|r| r.score >= min_score)
            .collect();

        Ok(rank(results, limit))
    }

    async fn document_count(&self) -> Result<usize> {
        Ok(self.passages.read().map_err(poisoned)?.len())
    }
}
