use anyhow::{Context, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

/// A collaborative document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub content: String,
}

/// Concurrent document store. Reads and writes come from the gateway and the
/// editing fabric on their own tasks; every mutation is flushed to the JSON
/// file when persistence is configured.
pub struct DocumentStore {
    documents: DashMap<String, Document>,
    next_id: AtomicU64,
    path: Option<PathBuf>,
}

impl DocumentStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            documents: DashMap::new(),
            next_id: AtomicU64::new(1),
            path,
        }
    }

    /// Loads the persisted documents, if any, and seats the id counter past
    /// the highest id seen.
    pub fn start(&self) -> Result<()> {
        let Some(path) = &self.path else {
            tracing::info!("Document persistence disabled");
            return Ok(());
        };
        if !path.exists() {
            tracing::info!("No document file at {}, starting empty", path.display());
            return Ok(());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let documents: Vec<Document> = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        let mut max_id = 0u64;
        for document in documents {
            if let Ok(id) = document.id.parse::<u64>() {
                max_id = max_id.max(id);
            }
            self.documents.insert(document.id.clone(), document);
        }
        self.next_id.store(max_id + 1, Ordering::SeqCst);
        tracing::info!(
            "Loaded {} document(s) from {}",
            self.documents.len(),
            path.display()
        );
        Ok(())
    }

    /// All documents, ordered by id.
    pub fn documents(&self) -> Vec<Document> {
        let mut documents: Vec<Document> = self
            .documents
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        documents.sort_by_key(|document| document.id.parse::<u64>().unwrap_or(u64::MAX));
        documents
    }

    pub fn document(&self, id: &str) -> Option<Document> {
        self.documents.get(id).map(|entry| entry.value().clone())
    }

    /// Creates a document under the next monotonic id.
    pub fn create_document(&self, name: &str) -> Result<Document> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let document = Document {
            id: id.to_string(),
            name: name.to_string(),
            content: String::new(),
        };
        self.documents.insert(document.id.clone(), document.clone());
        self.persist()?;
        Ok(document)
    }

    /// Replaces a document's content. Returns the updated document, or None
    /// for an unknown id.
    pub fn update_content(&self, id: &str, content: &str) -> Result<Option<Document>> {
        let updated = match self.documents.get_mut(id) {
            Some(mut entry) => {
                entry.content = content.to_string();
                Some(entry.value().clone())
            }
            None => None,
        };
        if updated.is_some() {
            self.persist()?;
        }
        Ok(updated)
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let documents = self.documents();
        let raw = serde_json::to_string_pretty(&documents)?;
        std::fs::write(path, raw)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}
