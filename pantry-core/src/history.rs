//! # Request History
//!
//! An append-only log of recipe requests and what came of them. On disk it is
//! one JSON document, oldest entry first:
//!
//! ```json
//! { "version": 1, "entries": [ { "id": "...", "outcome": { "status": "recipe", ... } } ] }
//! ```
//!
//! Every append rewrites the whole document through the backend's atomic
//! write. A document that cannot be parsed is never overwritten.

use crate::error::{self, Error, Result};
use crate::interpreter::RecipeRequest;
use crate::recipe::Recipe;
use crate::store::{StoreBackend, HISTORY_KEY};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub const HISTORY_VERSION: u32 = 1;

/// What a request produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Recipe { recipe: Recipe },
    Failed { kind: String, message: String },
}

impl Outcome {
    pub fn failed(err: &Error) -> Self {
        Outcome::Failed {
            kind: err.kind().to_string(),
            message: err.message().to_string(),
        }
    }

    pub fn recipe(&self) -> Option<&Recipe> {
        match self {
            Outcome::Recipe { recipe } => Some(recipe),
            Outcome::Failed { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Recipe { .. })
    }
}

/// One request and its outcome. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub model: String,
    pub request: RecipeRequest,
    pub outcome: Outcome,
}

impl HistoryEntry {
    pub fn new(request: RecipeRequest, model: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            recorded_at: Utc::now(),
            model: model.into(),
            request,
            outcome,
        }
    }

    pub fn success(request: RecipeRequest, model: impl Into<String>, recipe: Recipe) -> Self {
        Self::new(request, model, Outcome::Recipe { recipe })
    }

    pub fn failure(request: RecipeRequest, model: impl Into<String>, err: &Error) -> Self {
        Self::new(request, model, Outcome::failed(err))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct HistoryDocument {
    version: u32,
    #[serde(default)]
    entries: Vec<HistoryEntry>,
}

impl Default for HistoryDocument {
    fn default() -> Self {
        Self {
            version: HISTORY_VERSION,
            entries: Vec::new(),
        }
    }
}

/// Summary numbers for the `stats` command
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistoryStats {
    pub total_requests: usize,
    pub successful: usize,
    pub failed: usize,
    pub first_request: Option<DateTime<Utc>>,
    pub last_request: Option<DateTime<Utc>>,
    /// Requests per model
    pub by_model: BTreeMap<String, usize>,
    /// Requests per dish type
    pub by_recipe_type: BTreeMap<String, usize>,
}

pub struct HistoryStore {
    backend: Arc<dyn StoreBackend>,
}

impl HistoryStore {
    pub fn new(backend: impl StoreBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn with_backend(backend: Arc<dyn StoreBackend>) -> Self {
        Self { backend }
    }

    pub fn location(&self) -> String {
        self.backend.location(HISTORY_KEY)
    }

    fn read_document(&self) -> Result<HistoryDocument> {
        let Some(contents) = self.backend.read(HISTORY_KEY)? else {
            return Ok(HistoryDocument::default());
        };

        let doc: HistoryDocument = serde_json::from_str(&contents).map_err(|e| {
            Error::storage_corrupt(format!("cannot parse history: {}", e))
                .with_context("location", self.location())
                .set_source(e)
        })?;

        if doc.version != HISTORY_VERSION {
            return Err(Error::storage_corrupt(format!(
                "unsupported history version {}",
                doc.version
            ))
            .with_context("location", self.location()));
        }
        Ok(doc)
    }

    /// Append one entry. Fails without touching the file if the existing
    /// history cannot be read.
    pub fn append(&self, entry: HistoryEntry) -> Result<()> {
        let mut doc = self
            .read_document()
            .map_err(|e| e.with_operation("history_store::append"))?;
        doc.entries.push(entry);

        let json = serde_json::to_string_pretty(&doc).map_err(|e| {
            error::serialization_error(e.to_string()).with_operation("history_store::append")
        })?;
        self.backend
            .write(HISTORY_KEY, &json)
            .map_err(|e| e.with_operation("history_store::append"))?;

        info!(entries = doc.entries.len(), "history entry appended");
        Ok(())
    }

    /// Entries, most recent first
    pub fn list(&self, limit: Option<usize>) -> Result<Vec<HistoryEntry>> {
        let doc = self
            .read_document()
            .map_err(|e| e.with_operation("history_store::list"))?;
        let limit = limit.unwrap_or(usize::MAX);
        Ok(doc.entries.into_iter().rev().take(limit).collect())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read_document()?.entries.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn stats(&self) -> Result<HistoryStats> {
        let doc = self
            .read_document()
            .map_err(|e| e.with_operation("history_store::stats"))?;

        let mut stats = HistoryStats {
            total_requests: doc.entries.len(),
            ..Default::default()
        };
        for entry in &doc.entries {
            if entry.outcome.is_success() {
                stats.successful += 1;
            } else {
                stats.failed += 1;
            }
            *stats.by_model.entry(entry.model.clone()).or_default() += 1;
            *stats
                .by_recipe_type
                .entry(entry.request.recipe_type().to_string())
                .or_default() += 1;
        }
        stats.first_request = doc.entries.iter().map(|e| e.recorded_at).min();
        stats.last_request = doc.entries.iter().map(|e| e.recorded_at).max();
        Ok(stats)
    }

    pub fn clear(&self) -> Result<()> {
        self.backend
            .remove(HISTORY_KEY)
            .map_err(|e| e.with_operation("history_store::clear"))
    }
}
