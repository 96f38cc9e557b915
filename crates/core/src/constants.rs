//! Constants used throughout the ICD client.
//!
//! Endpoint defaults match the public WHO ICD-API deployment.

/// OAuth2 token endpoint of the WHO access management service.
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://icdaccessmanagement.who.int/connect/token";

/// Base URL of the ICD-API.
pub const DEFAULT_API_BASE: &str = "https://id.who.int";

/// ICD-11 release used for autocode and lookup requests.
pub const DEFAULT_RELEASE_ID: &str = "2024-01";

/// Mortality and Morbidity Statistics linearization.
pub const DEFAULT_LINEARIZATION: &str = "mms";

pub const DEFAULT_LANGUAGE: &str = "en";

/// The only scope the ICD-API grants to client-credential tokens.
pub const TOKEN_SCOPE: &str = "icdapi_access";

pub const GRANT_TYPE: &str = "client_credentials";

pub const API_VERSION: &str = "v2";

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_SAFETY_MARGIN_SECS: i64 = 60;

/// Upper bound for a configured safety margin. WHO tokens live for an hour, so
/// a margin near that would make every cached token unusable on arrival.
pub const MAX_SAFETY_MARGIN_SECS: i64 = 300;

/// Environment variable names.
pub mod env {
    pub const CLIENT_ID: &str = "CLIENT_ID";
    pub const CLIENT_SECRET: &str = "CLIENT_SECRET";
    pub const TOKEN_ENDPOINT: &str = "ICD_TOKEN_ENDPOINT";
    pub const API_BASE: &str = "ICD_API_BASE";
    pub const RELEASE_ID: &str = "ICD_RELEASE_ID";
    pub const LINEARIZATION: &str = "ICD_LINEARIZATION";
    pub const LANGUAGE: &str = "ICD_LANGUAGE";
    pub const MATCH_THRESHOLD: &str = "ICD_MATCH_THRESHOLD";
    pub const HTTP_TIMEOUT_SECS: &str = "ICD_HTTP_TIMEOUT_SECS";
    pub const SAFETY_MARGIN_SECS: &str = "ICD_TOKEN_SAFETY_MARGIN_SECS";
    pub const PROACTIVE_REFRESH: &str = "ICD_PROACTIVE_REFRESH";
}
