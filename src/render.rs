//! Console presentation of lookup results.
//!
//! Every function returns the text instead of printing it so the layout can be
//! tested without capturing stdout.

use chrono::{DateTime, Utc};
use icd_core::{DiagnosisRecord, MatchThreshold, SearchCandidate, SearchResult};

const NOT_AVAILABLE: &str = "n/a";

pub fn search_summary(result: &SearchResult, threshold: MatchThreshold) -> String {
    let note = if result.is_authoritative(threshold) {
        String::new()
    } else {
        format!(" (below {threshold}, informational only)")
    };
    format!(
        "Searched for: {}\n    Result: {}\n    ICD code: {}\n    Foundation URI: {}\n    Relevancy score: {:.2}{note}\n",
        result.search_text,
        result.matched_text.as_deref().unwrap_or(NOT_AVAILABLE),
        result.code.as_deref().unwrap_or(NOT_AVAILABLE),
        result.foundation_uri,
        result.match_score,
    )
}

pub fn diagnosis_summary(record: &DiagnosisRecord) -> String {
    let browser = record
        .browser_url
        .as_ref()
        .map(|url| format!("Visit the WHO ICD browser for more info: {url}\n"))
        .unwrap_or_default();
    format!(
        "{browser}    Diagnosed condition: {}\n    General details: {}\n{}{}",
        record.diagnosed_condition,
        record.general_details,
        list_section("Possible conditions", &record.possible_conditions),
        list_section("Excluded conditions", &record.excluded_conditions),
    )
}

fn list_section(heading: &str, items: &[String]) -> String {
    if items.is_empty() {
        return format!("{heading}: none\n");
    }
    let lines: String = items.iter().map(|item| format!("  - {item}\n")).collect();
    format!("{heading}:\n{lines}")
}

pub fn candidates_summary(query: &str, candidates: &[SearchCandidate]) -> String {
    if candidates.is_empty() {
        return format!("No candidates found for '{query}'.\n");
    }

    let lines: String = candidates
        .iter()
        .map(|candidate| {
            format!(
                "  {:>6}  {:.2}  {}  ({})\n",
                candidate.code.as_deref().unwrap_or("-"),
                candidate.score,
                candidate.title,
                candidate.entity_uri
            )
        })
        .collect();
    format!("Candidates for '{query}':\n{lines}")
}

pub fn token_summary(issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> String {
    let lifetime = expires_at - issued_at;
    format!(
        "Access token acquired at {}\n    Expires at {} ({} seconds)\n",
        issued_at.to_rfc3339(),
        expires_at.to_rfc3339(),
        lifetime.num_seconds()
    )
}
