//! Symptom-to-diagnosis lookup pipeline.
//!
//! A run is strictly sequential:
//! 1. **search** – `autocode` the symptom text into a foundation URI
//! 2. **detail** – `lookup` the foundation entity
//! 3. **transform** – build a [`DiagnosisRecord`] (no I/O)
//!
//! Every outbound call asks the [`TokenBroker`] for a bearer token first. Any
//! failure aborts the run at the failing stage; no partial record is returned.

use crate::config::CoreConfig;
use crate::constants::API_VERSION;
use crate::entity::{
    AutocodeWire, Diagnosis, DiagnosisRecord, EntityDetail, LookupWire, SearchCandidate,
    SearchResult, SearchWire,
};
use crate::error::Stage;
use crate::token::TokenBroker;
use crate::transport::{HttpRequest, HttpTransport};
use crate::{IcdResult, LookupError};
use icd_types::{MatchThreshold, NonEmptyText};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Property searched by [`LookupPipeline::search_candidates`].
const CANDIDATE_SEARCH_PROPERTY: &str = "IndexTerm";

#[derive(Clone)]
pub struct LookupPipeline {
    broker: TokenBroker,
    transport: Arc<dyn HttpTransport>,
    autocode_url: String,
    lookup_url: String,
    search_url: String,
    language: String,
    match_threshold: MatchThreshold,
}

impl std::fmt::Debug for LookupPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupPipeline")
            .field("broker", &self.broker)
            .field("autocode_url", &self.autocode_url)
            .field("lookup_url", &self.lookup_url)
            .field("language", &self.language)
            .field("match_threshold", &self.match_threshold)
            .finish_non_exhaustive()
    }
}

impl LookupPipeline {
    pub fn new(config: &CoreConfig, broker: TokenBroker, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            broker,
            transport,
            autocode_url: config.release_endpoint("autocode"),
            lookup_url: config.release_endpoint("lookup"),
            search_url: config.release_endpoint("search"),
            language: config.language().to_owned(),
            match_threshold: config.match_threshold(),
        }
    }

    pub fn match_threshold(&self) -> MatchThreshold {
        self.match_threshold
    }

    /// Resolve a symptom description into a display-ready record.
    pub async fn diagnose(&self, symptom: &NonEmptyText) -> IcdResult<DiagnosisRecord> {
        Ok(self.run(symptom).await?.record)
    }

    /// Run all three stages, keeping the search match alongside the record.
    pub async fn run(&self, symptom: &NonEmptyText) -> IcdResult<Diagnosis> {
        let search = self.search(symptom).await?;
        let detail = self.lookup(&search).await?;
        let record = DiagnosisRecord::from(detail);
        tracing::info!("diagnosed '{}' as '{}'", symptom, record.diagnosed_condition);
        Ok(Diagnosis { search, record })
    }

    /// Stage A: autocode the symptom text.
    pub async fn search(&self, symptom: &NonEmptyText) -> IcdResult<SearchResult> {
        tracing::info!("searching ICD-11 for '{}'", symptom);
        let request = HttpRequest::get(&self.autocode_url)
            .query("searchText", symptom.as_str())
            .query("matchThreshold", self.match_threshold.to_string());

        let wire: AutocodeWire = self.fetch(Stage::Search, request).await?;
        let result = wire.into_search_result(symptom.as_str())?;

        if result.is_authoritative(self.match_threshold) {
            tracing::debug!(
                score = result.match_score,
                uri = %result.foundation_uri,
                "autocode match"
            );
        } else {
            tracing::warn!(
                "match score {} for '{}' is below threshold {}; treat as informational",
                result.match_score,
                symptom,
                self.match_threshold
            );
        }
        Ok(result)
    }

    /// Stage B: look up the foundation entity of a search result.
    pub async fn lookup(&self, search: &SearchResult) -> IcdResult<EntityDetail> {
        tracing::info!("looking up {}", search.foundation_uri);
        let request =
            HttpRequest::get(&self.lookup_url).query("foundationUri", search.foundation_uri.as_str());

        let wire: LookupWire = self.fetch(Stage::Detail, request).await?;
        let detail = wire.into_entity_detail(&self.language)?;
        tracing::debug!(
            index_terms = detail.index_terms.len(),
            exclusions = detail.exclusions.len(),
            "entity detail"
        );
        Ok(detail)
    }

    /// Broader search returning every candidate entity at or above the
    /// match threshold, best first.
    pub async fn search_candidates(&self, query: &NonEmptyText) -> IcdResult<Vec<SearchCandidate>> {
        tracing::info!("searching ICD-11 candidates for '{}'", query);
        let request = HttpRequest::get(&self.search_url)
            .query("q", query.as_str())
            .query("useFlexiSearch", "false")
            .query("flatResults", "true")
            .query("highlightingEnabled", "false")
            .query("medicalCodingMode", "true")
            .query("propertiesToBeSearched", CANDIDATE_SEARCH_PROPERTY);

        let wire: SearchWire = self.fetch(Stage::Candidates, request).await?;
        let candidates = wire.into_candidates(self.match_threshold)?;
        tracing::debug!(count = candidates.len(), "candidate search");
        Ok(candidates)
    }

    /// Attach auth and API headers, send, check status and decode the body.
    async fn fetch<T: DeserializeOwned>(&self, stage: Stage, request: HttpRequest) -> IcdResult<T> {
        let token = self.broker.acquire_token().await?;
        let request = request
            .header("Authorization", token.bearer_header())
            .header("API-Version", API_VERSION)
            .header("Accept-Language", self.language.as_str())
            .header("Accept", "application/json");

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|source| LookupError::Transport { stage, source })?;

        if !response.is_success() {
            tracing::warn!("{} returned HTTP {}", stage, response.status);
            if response.status == 401 {
                // The API no longer honours this token; the next call exchanges again.
                self.broker.invalidate().await;
            }
            return Err(LookupError::Status {
                stage,
                status: response.status,
                body: response.body,
            }
            .into());
        }

        serde_json::from_str(&response.body).map_err(|e| {
            LookupError::MalformedResponse {
                stage,
                message: e.to_string(),
            }
            .into()
        })
    }
}
