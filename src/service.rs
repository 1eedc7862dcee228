//! Search pipeline: record the query, search upstream, fetch and extract each
//! article, persist the records.
//!
//! Detail fetches run one after another. A failed fetch drops that article
//! only; a failed search or a failed write fails the whole run.

use crate::error::{AffilscanError, Result};
use crate::extract::{FieldExtractor, NormalizedRecord};
use crate::pubmed::LiteratureSource;
use crate::store::{SearchQuery, Store, HISTORY_LIMIT};
use std::sync::Arc;
use tracing::{info, warn};

/// Pipeline over a literature source and a store
pub struct SearchService {
    source: Arc<dyn LiteratureSource>,
    extractor: FieldExtractor,
    store: Arc<Store>,
}

impl SearchService {
    pub fn new(
        source: Arc<dyn LiteratureSource>,
        extractor: FieldExtractor,
        store: Arc<Store>,
    ) -> Self {
        Self {
            source,
            extractor,
            store,
        }
    }

    /// Run one search end to end and return the records it produced.
    pub async fn search(&self, query: &str) -> Result<Vec<NormalizedRecord>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AffilscanError::Validation("query is required".to_string()));
        }

        let search = self.store.record_search(query)?;
        info!(search_id = search.id, query = query, "Search started");

        let ids = self.source.search(query).await?;
        if ids.is_empty() {
            info!(search_id = search.id, "No articles found");
            return Ok(Vec::new());
        }

        let mut records = Vec::with_capacity(ids.len());
        for id in &ids {
            match self.source.fetch_detail(id).await {
                Ok(document) => records.push(self.extractor.extract(id, &document)),
                Err(e) => {
                    warn!(search_id = search.id, pmid = %id, error = %e, "Skipping article");
                }
            }
        }

        for record in &records {
            self.store.insert_record(search.id, record)?;
        }

        info!(
            search_id = search.id,
            requested = ids.len(),
            stored = records.len(),
            "Search complete"
        );
        Ok(records)
    }

    /// Most recent searches, newest first
    pub fn history(&self) -> Result<Vec<SearchQuery>> {
        self.store.recent_searches(HISTORY_LIMIT)
    }

    /// Stored records for one search, empty when the id is unknown
    pub fn results(&self, search_id: i64) -> Result<Vec<NormalizedRecord>> {
        self.store.results_for(search_id)
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }
}
