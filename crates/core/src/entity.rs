//! ICD-API entity wire models and translation helpers.
//!
//! Responsibilities:
//! - Define public domain-level types handed to the presentation layer
//! - Define lenient wire models mirroring the ICD-API JSON-LD responses
//! - Translate wire models into domain types, enforcing required fields
//!
//! Notes:
//! - Localized fields arrive wrapped as `{"@language": "en", "@value": "..."}`;
//!   translation always reads `@value`.
//! - `indexTerm` and `exclusion` are optional upstream and default to empty.

use crate::error::Stage;
use crate::LookupError;
use icd_types::MatchThreshold;
use serde::Deserialize;
use url::Url;

// ============================================================================
// Public domain-level types
// ============================================================================

/// Best autocode match for a symptom description.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchResult {
    /// The search text as echoed by the API.
    pub search_text: String,
    /// The index text the API matched against.
    pub matched_text: Option<String>,
    /// ICD-11 code, e.g. `9B10.0`.
    pub code: Option<String>,
    /// Canonical foundation entity URI, used to chain into the detail lookup.
    pub foundation_uri: Url,
    /// Match confidence in `0.0..=1.0`.
    pub match_score: f64,
}

impl SearchResult {
    /// Whether the match reaches `threshold` and can be relied upon.
    pub fn is_authoritative(&self, threshold: MatchThreshold) -> bool {
        threshold.accepts(self.match_score)
    }
}

/// Fields extracted from a foundation entity lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityDetail {
    pub browser_url: Option<String>,
    pub title: String,
    pub definition: String,
    pub index_terms: Vec<String>,
    pub exclusions: Vec<String>,
}

/// Display-ready diagnosis summary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiagnosisRecord {
    pub browser_url: Option<String>,
    pub diagnosed_condition: String,
    pub general_details: String,
    pub possible_conditions: Vec<String>,
    pub excluded_conditions: Vec<String>,
}

impl From<EntityDetail> for DiagnosisRecord {
    fn from(detail: EntityDetail) -> Self {
        Self {
            browser_url: detail.browser_url,
            diagnosed_condition: detail.title,
            general_details: detail.definition,
            possible_conditions: detail.index_terms,
            excluded_conditions: detail.exclusions,
        }
    }
}

/// A full pipeline run: the match that was chosen and the resulting record.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnosis {
    pub search: SearchResult,
    pub record: DiagnosisRecord,
}

/// One entry from the broader `/search` endpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchCandidate {
    pub title: String,
    pub code: Option<String>,
    pub entity_uri: String,
    pub score: f64,
}

// ============================================================================
// Wire models
// ============================================================================

/// `{"@language": "en", "@value": "..."}`
#[derive(Debug, Deserialize)]
pub(crate) struct LocalizedText {
    #[serde(rename = "@language")]
    pub language: Option<String>,
    #[serde(rename = "@value")]
    pub value: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LabelledTerm {
    pub label: Option<LocalizedText>,
}

/// `GET .../autocode` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AutocodeWire {
    pub search_text: Option<String>,
    pub matching_text: Option<String>,
    pub the_code: Option<String>,
    #[serde(rename = "foundationURI")]
    pub foundation_uri: Option<String>,
    pub match_score: Option<f64>,
}

/// `GET .../lookup` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LookupWire {
    pub browser_url: Option<String>,
    pub title: Option<LocalizedText>,
    pub definition: Option<LocalizedText>,
    pub index_term: Option<Vec<LabelledTerm>>,
    pub exclusion: Option<Vec<LabelledTerm>>,
}

/// `GET .../search` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchWire {
    #[serde(default)]
    pub error: bool,
    pub error_message: Option<String>,
    pub destination_entities: Option<Vec<DestinationEntityWire>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DestinationEntityWire {
    pub id: Option<String>,
    pub title: Option<String>,
    pub the_code: Option<String>,
    pub score: Option<f64>,
}

// ============================================================================
// Translation helpers
// ============================================================================

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Read `@value` from a localized wrapper, noting a language mismatch.
fn localized_value(text: Option<LocalizedText>, language: &str) -> Option<String> {
    let text = text?;
    if let Some(found) = &text.language {
        if !found.eq_ignore_ascii_case(language) {
            tracing::debug!("expected '{}' text, got '{}'", language, found);
        }
    }
    non_blank(text.value)
}

fn labels(terms: Option<Vec<LabelledTerm>>, language: &str) -> Vec<String> {
    terms
        .unwrap_or_default()
        .into_iter()
        .filter_map(|term| localized_value(term.label, language))
        .collect()
}

impl AutocodeWire {
    /// Translate into a [`SearchResult`], failing fast on a missing or
    /// unusable foundation URI.
    pub(crate) fn into_search_result(self, requested: &str) -> Result<SearchResult, LookupError> {
        let raw_uri = non_blank(self.foundation_uri).ok_or_else(|| LookupError::NoMatch {
            search_text: requested.to_owned(),
        })?;

        let foundation_uri =
            Url::parse(raw_uri.trim()).map_err(|e| LookupError::InvalidFoundationUri {
                uri: raw_uri.clone(),
                reason: e.to_string(),
            })?;
        if !matches!(foundation_uri.scheme(), "http" | "https") || !foundation_uri.has_host() {
            return Err(LookupError::InvalidFoundationUri {
                uri: raw_uri,
                reason: "expected an absolute http(s) URI".into(),
            });
        }

        let match_score = self.match_score.unwrap_or(0.0);
        if !(0.0..=1.0).contains(&match_score) {
            return Err(LookupError::MalformedResponse {
                stage: Stage::Search,
                message: format!("matchScore {match_score} outside 0..=1"),
            });
        }

        Ok(SearchResult {
            search_text: non_blank(self.search_text).unwrap_or_else(|| requested.to_owned()),
            matched_text: non_blank(self.matching_text),
            code: non_blank(self.the_code),
            foundation_uri,
            match_score,
        })
    }
}

impl LookupWire {
    pub(crate) fn into_entity_detail(self, language: &str) -> Result<EntityDetail, LookupError> {
        let title = localized_value(self.title, language).ok_or(LookupError::MissingField {
            stage: Stage::Detail,
            field: "title",
        })?;
        let definition =
            localized_value(self.definition, language).ok_or(LookupError::MissingField {
                stage: Stage::Detail,
                field: "definition",
            })?;

        Ok(EntityDetail {
            browser_url: non_blank(self.browser_url),
            title,
            definition,
            index_terms: labels(self.index_term, language),
            exclusions: labels(self.exclusion, language),
        })
    }
}

impl SearchWire {
    /// Candidates at or above `threshold`, best first.
    pub(crate) fn into_candidates(
        self,
        threshold: MatchThreshold,
    ) -> Result<Vec<SearchCandidate>, LookupError> {
        if self.error {
            return Err(LookupError::MalformedResponse {
                stage: Stage::Candidates,
                message: self
                    .error_message
                    .unwrap_or_else(|| "search reported an error".into()),
            });
        }

        let mut candidates: Vec<SearchCandidate> = self
            .destination_entities
            .unwrap_or_default()
            .into_iter()
            .filter_map(|entity| {
                let score = entity.score.unwrap_or(0.0);
                Some(SearchCandidate {
                    title: non_blank(entity.title)?,
                    entity_uri: non_blank(entity.id)?,
                    code: non_blank(entity.the_code),
                    score,
                })
            })
            .filter(|candidate| threshold.accepts(candidate.score))
            .collect();

        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(candidates)
    }
}
