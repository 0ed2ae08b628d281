//! On-disk store of research documents keyed by subject.

use super::Article;
use crate::error::Result;
use crate::request::store_key;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// JSON files under `research/`, one per subject.
///
/// Writes for the same key are serialized; different keys proceed in parallel.
pub struct ResearchStore {
    dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ResearchStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the document stored for `subject`.
    pub fn path_for(&self, subject: &str) -> PathBuf {
        self.dir.join(format!("{}.json", store_key(subject)))
    }

    fn lock_for(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(key.to_string()).or_default().clone()
    }

    /// Persist articles for `subject`, replacing any previous document.
    pub async fn save(&self, subject: &str, articles: &[Article]) -> Result<PathBuf> {
        let key = store_key(subject);
        let lock = self.lock_for(&key);
        let _guard = lock.lock().await;

        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(subject);
        let tmp = self.dir.join(format!(".{}.json.tmp", key));
        let json = serde_json::to_string_pretty(articles)?;

        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;

        info!("Saved {} articles to {:?}", articles.len(), path);
        Ok(path)
    }

    /// Load the document stored for `subject`, if any.
    pub async fn load(&self, subject: &str) -> Result<Option<Vec<Article>>> {
        let path = self.path_for(subject);
        if !path.exists() {
            return Ok(None);
        }
        Self::read(&path).await.map(Some)
    }

    /// Read a research document from an arbitrary path.
    pub async fn read(path: &Path) -> Result<Vec<Article>> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Every stored document as `(subject key, articles)`, sorted by key.
    pub async fn list(&self) -> Result<Vec<(String, Vec<Article>)>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut documents = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if stem.starts_with('.') {
                continue;
            }

            match Self::read(&path).await {
                Ok(articles) => documents.push((stem.to_string(), articles)),
                Err(e) => debug!("Skipping unreadable research file {:?}: {}", path, e),
            }
        }

        documents.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str) -> Article {
        Article {
            title: title.to_string(),
            url: format!("https://news.example/{}", title),
            content: format!("{} body", title),
        }
    }

    #[tokio::test]
    async fn test_save_creates_directory_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResearchStore::new(dir.path().join("research"));

        let path = store.save("AAPL", &[article("one"), article("two")]).await.unwrap();
        assert_eq!(path, dir.path().join("research").join("AAPL.json"));

        let loaded = store.load("AAPL").await.unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].title, "one");

        // the on-disk shape is a plain array of {title, url, content}
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[1]["url"], "https://news.example/two");
    }

    #[tokio::test]
    async fn test_missing_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResearchStore::new(dir.path());
        assert!(store.load("MSFT").await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_saves_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ResearchStore::new(dir.path()));

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.save("TSLA", &[article(&format!("v{}", i))]).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let docs = store.list().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].0, "TSLA");
        assert_eq!(docs[0].1.len(), 1);
    }
}
