//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the
//! token broker and lookup pipeline. Nothing in the request path reads process
//! environment variables.
//!
//! [`CoreConfig::from_lookup`] takes the variable source as a closure so tests
//! can resolve configuration from a plain map instead of mutating the process
//! environment.

use crate::constants::{
    env, DEFAULT_API_BASE, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_LANGUAGE, DEFAULT_LINEARIZATION,
    DEFAULT_RELEASE_ID, DEFAULT_SAFETY_MARGIN_SECS, DEFAULT_TOKEN_ENDPOINT,
    MAX_SAFETY_MARGIN_SECS, TOKEN_SCOPE,
};
use crate::ConfigError;
use icd_types::{MatchThreshold, NonEmptyText};
use std::fmt;
use std::time::Duration;
use url::Url;

/// OAuth2 client credentials. Immutable for the lifetime of the process.
#[derive(Clone)]
pub struct Credentials {
    client_id: NonEmptyText,
    client_secret: NonEmptyText,
    scope: String,
}

impl Credentials {
    pub fn new(client_id: NonEmptyText, client_secret: NonEmptyText) -> Self {
        Self {
            client_id,
            client_secret,
            scope: TOKEN_SCOPE.to_owned(),
        }
    }

    pub fn client_id(&self) -> &str {
        self.client_id.as_str()
    }

    pub fn client_secret(&self) -> &str {
        self.client_secret.as_str()
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }
}

// The secret must never reach a log line.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id.as_str())
            .field("client_secret", &"<redacted>")
            .field("scope", &self.scope)
            .finish()
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    credentials: Credentials,
    token_endpoint: Url,
    api_base: Url,
    release_id: String,
    linearization: String,
    language: String,
    match_threshold: MatchThreshold,
    http_timeout: Duration,
    safety_margin: chrono::Duration,
    proactive_refresh: bool,
}

impl CoreConfig {
    /// Create a configuration with the public WHO endpoints and default tuning.
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            token_endpoint: Url::parse(DEFAULT_TOKEN_ENDPOINT)
                .expect("default token endpoint is a valid URL"),
            api_base: Url::parse(DEFAULT_API_BASE).expect("default API base is a valid URL"),
            release_id: DEFAULT_RELEASE_ID.to_owned(),
            linearization: DEFAULT_LINEARIZATION.to_owned(),
            language: DEFAULT_LANGUAGE.to_owned(),
            match_threshold: MatchThreshold::DEFAULT,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            safety_margin: chrono::Duration::seconds(DEFAULT_SAFETY_MARGIN_SECS),
            proactive_refresh: false,
        }
    }

    /// Resolve configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve configuration from an arbitrary variable source.
    ///
    /// `CLIENT_ID` and `CLIENT_SECRET` are required; every other variable falls
    /// back to its default when unset or blank.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        let client_id = required(env::CLIENT_ID, var(env::CLIENT_ID))?;
        let client_secret = required(env::CLIENT_SECRET, var(env::CLIENT_SECRET))?;
        let mut config = Self::new(Credentials::new(client_id, client_secret));

        if let Some(value) = var(env::TOKEN_ENDPOINT) {
            config.token_endpoint = parse_http_url(env::TOKEN_ENDPOINT, &value)?;
        }
        if let Some(value) = var(env::API_BASE) {
            config.api_base = parse_http_url(env::API_BASE, &value)?;
        }
        if let Some(value) = var(env::RELEASE_ID) {
            config.release_id = path_segment(env::RELEASE_ID, value)?;
        }
        if let Some(value) = var(env::LINEARIZATION) {
            config.linearization = path_segment(env::LINEARIZATION, value)?;
        }
        if let Some(value) = var(env::LANGUAGE) {
            config.language = value;
        }
        if let Some(value) = var(env::MATCH_THRESHOLD) {
            config.match_threshold = value.parse().map_err(|e: icd_types::TypeError| {
                ConfigError::Invalid {
                    name: env::MATCH_THRESHOLD,
                    reason: e.to_string(),
                }
            })?;
        }
        if let Some(value) = var(env::HTTP_TIMEOUT_SECS) {
            let secs: u64 = parse_number(env::HTTP_TIMEOUT_SECS, &value)?;
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    name: env::HTTP_TIMEOUT_SECS,
                    reason: "timeout must be at least one second".into(),
                });
            }
            config.http_timeout = Duration::from_secs(secs);
        }
        if let Some(value) = var(env::SAFETY_MARGIN_SECS) {
            let secs: i64 = parse_number(env::SAFETY_MARGIN_SECS, &value)?;
            if !(0..=MAX_SAFETY_MARGIN_SECS).contains(&secs) {
                return Err(ConfigError::Invalid {
                    name: env::SAFETY_MARGIN_SECS,
                    reason: format!("must be between 0 and {MAX_SAFETY_MARGIN_SECS} seconds"),
                });
            }
            config.safety_margin = chrono::Duration::seconds(secs);
        }
        if let Some(value) = var(env::PROACTIVE_REFRESH) {
            config.proactive_refresh = parse_flag(env::PROACTIVE_REFRESH, &value)?;
        }

        Ok(config)
    }

    pub fn with_token_endpoint(mut self, url: Url) -> Self {
        self.token_endpoint = url;
        self
    }

    pub fn with_api_base(mut self, url: Url) -> Self {
        self.api_base = url;
        self
    }

    pub fn with_match_threshold(mut self, threshold: MatchThreshold) -> Self {
        self.match_threshold = threshold;
        self
    }

    pub fn with_safety_margin(mut self, margin: chrono::Duration) -> Self {
        self.safety_margin = margin;
        self
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn token_endpoint(&self) -> &Url {
        &self.token_endpoint
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn match_threshold(&self) -> MatchThreshold {
        self.match_threshold
    }

    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }

    pub fn safety_margin(&self) -> chrono::Duration {
        self.safety_margin
    }

    pub fn proactive_refresh(&self) -> bool {
        self.proactive_refresh
    }

    /// `{api_base}/icd/release/11/{release}/{linearization}/{endpoint}`
    pub fn release_endpoint(&self, endpoint: &str) -> String {
        format!(
            "{}/icd/release/11/{}/{}/{}",
            self.api_base.as_str().trim_end_matches('/'),
            self.release_id,
            self.linearization,
            endpoint
        )
    }
}

fn required(name: &'static str, value: Option<String>) -> Result<NonEmptyText, ConfigError> {
    let value = value.ok_or(ConfigError::Missing { name })?;
    NonEmptyText::new(value).map_err(|_| ConfigError::Missing { name })
}

fn parse_http_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid {
            name,
            reason: format!("URL must use http or https, got {}", url.scheme()),
        });
    }
    Ok(url)
}

fn path_segment(name: &'static str, value: String) -> Result<String, ConfigError> {
    let ok = value
        .bytes()
        .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'.' | b'-' | b'_'));
    if !ok {
        return Err(ConfigError::Invalid {
            name,
            reason: "only alphanumeric, '.', '-', '_' allowed".into(),
        });
    }
    Ok(value)
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            name,
            reason: format!("expected a boolean, got '{other}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn missing_client_id_is_a_config_error() {
        let err = CoreConfig::from_lookup(lookup_from(&[("CLIENT_SECRET", "s3cret")]))
            .expect_err("client id is required");
        assert_eq!(err, ConfigError::Missing { name: "CLIENT_ID" });
    }

    #[test]
    fn blank_client_secret_counts_as_missing() {
        let err = CoreConfig::from_lookup(lookup_from(&[
            ("CLIENT_ID", "abc"),
            ("CLIENT_SECRET", "   "),
        ]))
        .expect_err("client secret is required");
        assert_eq!(
            err,
            ConfigError::Missing {
                name: "CLIENT_SECRET"
            }
        );
    }

    #[test]
    fn defaults_apply_when_optional_vars_unset() {
        let config = CoreConfig::from_lookup(lookup_from(&[
            ("CLIENT_ID", "abc"),
            ("CLIENT_SECRET", "s3cret"),
        ]))
        .expect("valid config");

        assert_eq!(config.credentials().client_id(), "abc");
        assert_eq!(config.credentials().scope(), "icdapi_access");
        assert_eq!(config.token_endpoint().as_str(), DEFAULT_TOKEN_ENDPOINT);
        assert_eq!(config.match_threshold(), MatchThreshold::DEFAULT);
        assert_eq!(config.safety_margin(), chrono::Duration::seconds(60));
        assert!(!config.proactive_refresh());
        assert_eq!(
            config.release_endpoint("autocode"),
            "https://id.who.int/icd/release/11/2024-01/mms/autocode"
        );
    }

    #[test]
    fn overrides_are_validated() {
        let config = CoreConfig::from_lookup(lookup_from(&[
            ("CLIENT_ID", "abc"),
            ("CLIENT_SECRET", "s3cret"),
            ("ICD_API_BASE", "http://localhost:8382/"),
            ("ICD_RELEASE_ID", "2025-01"),
            ("ICD_MATCH_THRESHOLD", "0.5"),
            ("ICD_TOKEN_SAFETY_MARGIN_SECS", "30"),
            ("ICD_PROACTIVE_REFRESH", "yes"),
        ]))
        .expect("valid config");
        assert_eq!(
            config.release_endpoint("lookup"),
            "http://localhost:8382/icd/release/11/2025-01/mms/lookup"
        );
        assert_eq!(config.match_threshold().value(), 0.5);
        assert_eq!(config.safety_margin(), chrono::Duration::seconds(30));
        assert!(config.proactive_refresh());

        let err = CoreConfig::from_lookup(lookup_from(&[
            ("CLIENT_ID", "abc"),
            ("CLIENT_SECRET", "s3cret"),
            ("ICD_TOKEN_SAFETY_MARGIN_SECS", "3600"),
        ]))
        .expect_err("margin as long as a token lifetime rejected");
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "ICD_TOKEN_SAFETY_MARGIN_SECS",
                ..
            }
        ));

        let err = CoreConfig::from_lookup(lookup_from(&[
            ("CLIENT_ID", "abc"),
            ("CLIENT_SECRET", "s3cret"),
            ("ICD_RELEASE_ID", "../admin"),
        ]))
        .expect_err("path traversal rejected");
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "ICD_RELEASE_ID",
                ..
            }
        ));

        let err = CoreConfig::from_lookup(lookup_from(&[
            ("CLIENT_ID", "abc"),
            ("CLIENT_SECRET", "s3cret"),
            ("ICD_TOKEN_ENDPOINT", "ftp://example.org/token"),
        ]))
        .expect_err("non-http endpoint rejected");
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn debug_output_redacts_secret() {
        let creds = Credentials::new(
            NonEmptyText::new("abc").unwrap(),
            NonEmptyText::new("hunter2").unwrap(),
        );
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("abc"));
        assert!(!rendered.contains("hunter2"));
    }
}
