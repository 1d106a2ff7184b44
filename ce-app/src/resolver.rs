//! Two-stage client lookup: the unavailable list first, then the primary
//! directory.

use crate::matcher::{DocumentMatch, find_document, normalize_document};
use crate::validation::DocumentType;
use ce_data::{Column, DatasetKind, DirectoryCache, DirectoryError, Freshness, Row};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResolutionOutcome {
    /// Present on the unavailable list. The primary directory was not read.
    Unavailable { record: DocumentMatch },
    Available { matches: Vec<DocumentMatch> },
    NotFound { total_searched: usize },
}

/// Whether the unavailable list could be consulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AvailabilityCheck {
    Checked,
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub doc_type: DocumentType,
    pub doc_number: String,
    pub cleaned_number: String,
    pub outcome: ResolutionOutcome,
    pub availability_check: AvailabilityCheck,
}

impl Resolution {
    pub fn found(&self) -> bool {
        !matches!(self.outcome, ResolutionOutcome::NotFound { .. })
    }

    pub fn unavailable(&self) -> bool {
        matches!(self.outcome, ResolutionOutcome::Unavailable { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectorySummary {
    pub total_clients: usize,
    pub total_columns: usize,
    pub cached: bool,
    pub freshness: Freshness,
    pub fetched_at: DateTime<Utc>,
    pub columns: Vec<Column>,
    pub sample: Vec<Row>,
}

#[derive(Clone)]
pub struct AvailabilityResolver {
    cache: Arc<DirectoryCache>,
}

impl AvailabilityResolver {
    pub fn new(cache: Arc<DirectoryCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<DirectoryCache> {
        &self.cache
    }

    /// Resolve a document number. Only a primary-directory failure is an
    /// error; an unreadable unavailable list is skipped.
    #[tracing::instrument(level = "info", skip(self), fields(doc_type = %doc_type))]
    pub async fn resolve(
        &self,
        doc_type: DocumentType,
        doc_number: &str,
    ) -> Result<Resolution, DirectoryError> {
        let cleaned_number = normalize_document(doc_number);
        let resolution = |outcome, availability_check| Resolution {
            doc_type,
            doc_number: doc_number.to_string(),
            cleaned_number: cleaned_number.clone(),
            outcome,
            availability_check,
        };

        let availability_check = match self.cache.dataset(DatasetKind::Unavailable).await {
            Ok(unavailable) => {
                if let Some(record) = find_document(unavailable.dataset(), doc_number)
                    .into_iter()
                    .next()
                {
                    tracing::info!(matched_column = %record.matched_column, "client is on the unavailable list");
                    return Ok(resolution(
                        ResolutionOutcome::Unavailable { record },
                        AvailabilityCheck::Checked,
                    ));
                }
                AvailabilityCheck::Checked
            }
            Err(error) => {
                tracing::warn!(%error, "unavailable list could not be read; treating client as available");
                AvailabilityCheck::Skipped {
                    reason: error.to_string(),
                }
            }
        };

        let primary = self.cache.dataset(DatasetKind::Primary).await?;
        let matches = find_document(primary.dataset(), doc_number);
        let outcome = if matches.is_empty() {
            ResolutionOutcome::NotFound {
                total_searched: primary.dataset().len(),
            }
        } else {
            ResolutionOutcome::Available { matches }
        };
        tracing::info!(
            found = !matches!(outcome, ResolutionOutcome::NotFound { .. }),
            freshness = ?primary.freshness,
            "client lookup finished"
        );
        Ok(resolution(outcome, availability_check))
    }

    pub async fn summary(&self, sample_size: usize) -> Result<DirectorySummary, DirectoryError> {
        let primary = self.cache.dataset(DatasetKind::Primary).await?;
        let dataset = primary.dataset();
        Ok(DirectorySummary {
            total_clients: dataset.len(),
            total_columns: dataset.columns.len(),
            cached: primary.from_cache(),
            freshness: primary.freshness,
            fetched_at: primary.snapshot.fetched_at,
            columns: dataset.columns.clone(),
            sample: dataset.rows.iter().take(sample_size).cloned().collect(),
        })
    }
}
