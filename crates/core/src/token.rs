//! Access-token lifecycle management.
//!
//! [`TokenBroker`] owns the OAuth2 client-credentials exchange against the ICD
//! access management service and hands out bearer tokens that are valid at the
//! moment of use.
//!
//! - A cached token is served while `now < expires_at - safety_margin`.
//! - Otherwise a fresh exchange runs and the cache is replaced wholesale.
//! - Concurrent callers that find no usable token share one in-flight exchange.
//!   The exchange runs in its own task, so a caller giving up on its request
//!   never cancels the exchange the other callers are waiting on.
//!
//! Exchange failures are returned as [`AuthError`] and are never retried here.

use crate::config::{CoreConfig, Credentials};
use crate::constants::GRANT_TYPE;
use crate::transport::{HttpRequest, HttpTransport};
use crate::AuthError;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A bearer token and its validity window.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    value: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(value: String, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value,
            issued_at,
            expires_at,
        }
    }

    /// The opaque bearer string.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the token may still be handed out at `now`.
    pub fn is_usable_at(&self, now: DateTime<Utc>, safety_margin: chrono::Duration) -> bool {
        now < self.expires_at - safety_margin
    }

    /// Value for the `Authorization` header.
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.value)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Token endpoint response body.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
    token_type: Option<String>,
}

type ExchangeResult = Result<AccessToken, AuthError>;
type InFlight = Shared<BoxFuture<'static, ExchangeResult>>;

#[derive(Default)]
struct BrokerState {
    token: Option<AccessToken>,
    in_flight: Option<InFlight>,
}

struct BrokerInner {
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
    credentials: Credentials,
    token_endpoint: String,
    safety_margin: chrono::Duration,
    state: RwLock<BrokerState>,
}

/// Cheaply cloneable handle to a shared token cache.
#[derive(Clone)]
pub struct TokenBroker {
    inner: Arc<BrokerInner>,
}

impl fmt::Debug for TokenBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenBroker")
            .field("token_endpoint", &self.inner.token_endpoint)
            .field("safety_margin", &self.inner.safety_margin)
            .finish_non_exhaustive()
    }
}

impl TokenBroker {
    pub fn new(config: &CoreConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self::with_clock(config, transport, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: &CoreConfig,
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                transport,
                clock,
                credentials: config.credentials().clone(),
                token_endpoint: config.token_endpoint().to_string(),
                safety_margin: config.safety_margin(),
                state: RwLock::new(BrokerState::default()),
            }),
        }
    }

    /// Return a token that is valid now, exchanging credentials if needed.
    pub async fn acquire_token(&self) -> Result<AccessToken, AuthError> {
        {
            let state = self.inner.state.read().await;
            if let Some(token) = self.usable(&state) {
                return Ok(token);
            }
        }

        let in_flight = {
            let mut state = self.inner.state.write().await;
            // Another caller may have refreshed while we waited for the lock.
            if let Some(token) = self.usable(&state) {
                return Ok(token);
            }
            match state.in_flight.clone() {
                Some(shared) => {
                    tracing::debug!("joining in-flight token exchange");
                    shared
                }
                None => {
                    let shared = self.start_exchange();
                    state.in_flight = Some(shared.clone());
                    shared
                }
            }
        };

        in_flight.await
    }

    /// Drop the cached token so the next call performs a fresh exchange.
    pub async fn invalidate(&self) {
        self.inner.state.write().await.token = None;
    }

    /// Expiry of the cached token, if any.
    pub async fn cached_expiry(&self) -> Option<DateTime<Utc>> {
        self.inner
            .state
            .read()
            .await
            .token
            .as_ref()
            .map(AccessToken::expires_at)
    }

    /// Refresh in the background shortly before the cached token expires.
    ///
    /// Correctness never depends on this task: `acquire_token` refreshes on
    /// demand regardless. A failed refresh is logged and attempted again one
    /// safety margin later. Abort the returned handle to stop it.
    pub fn spawn_proactive_refresh(&self) -> JoinHandle<()> {
        let broker = self.clone();
        tokio::spawn(async move {
            loop {
                let wait = match broker.cached_expiry().await {
                    Some(expires_at) => {
                        let refresh_at = expires_at - broker.inner.safety_margin;
                        (refresh_at - broker.inner.clock.now())
                            .to_std()
                            .unwrap_or_default()
                            .max(std::time::Duration::from_secs(1))
                    }
                    None => std::time::Duration::ZERO,
                };
                tokio::time::sleep(wait).await;

                match broker.acquire_token().await {
                    Ok(token) => {
                        tracing::debug!(expires_at = %token.expires_at(), "proactive token refresh")
                    }
                    Err(e) => {
                        tracing::warn!("proactive token refresh failed: {}", e);
                        let backoff = broker
                            .inner
                            .safety_margin
                            .to_std()
                            .unwrap_or_default()
                            .max(std::time::Duration::from_secs(1));
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        })
    }

    fn usable(&self, state: &BrokerState) -> Option<AccessToken> {
        let now = self.inner.clock.now();
        state
            .token
            .as_ref()
            .filter(|t| t.is_usable_at(now, self.inner.safety_margin))
            .cloned()
    }

    /// Spawn the exchange and wrap its handle in a shareable future.
    ///
    /// `in_flight` is cleared however the task ends, so a panicking exchange
    /// cannot leave later callers joining a stale result.
    fn start_exchange(&self) -> InFlight {
        let inner = Arc::clone(&self.inner);
        let task_inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let result = exchange(&task_inner).await;
            let mut state = task_inner.state.write().await;
            state.in_flight = None;
            if let Ok(token) = &result {
                state.token = Some(token.clone());
            }
            result
        });

        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!("token exchange task failed: {}", e);
                    inner.state.write().await.in_flight = None;
                    Err(AuthError::Aborted(e.to_string()))
                }
            }
        }
        .boxed()
        .shared()
    }
}

async fn exchange(inner: &BrokerInner) -> Result<AccessToken, AuthError> {
    let credentials = &inner.credentials;
    let form = vec![
        ("client_id".to_owned(), credentials.client_id().to_owned()),
        (
            "client_secret".to_owned(),
            credentials.client_secret().to_owned(),
        ),
        ("scope".to_owned(), credentials.scope().to_owned()),
        ("grant_type".to_owned(), GRANT_TYPE.to_owned()),
    ];
    let request = HttpRequest::post_form(inner.token_endpoint.clone(), form)
        .header("Accept", "application/json");

    tracing::info!("requesting access token from {}", inner.token_endpoint);
    let response = inner.transport.send(request).await?;

    if !response.is_success() {
        tracing::warn!("token endpoint returned HTTP {}", response.status);
        return Err(AuthError::Rejected {
            status: response.status,
            body: response.body,
        });
    }

    let parsed: TokenResponse = serde_json::from_str(&response.body)
        .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;

    if let Some(token_type) = &parsed.token_type {
        if !token_type.eq_ignore_ascii_case("bearer") {
            return Err(AuthError::MalformedResponse(format!(
                "unsupported token_type '{token_type}'"
            )));
        }
    }

    let value = parsed
        .access_token
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AuthError::MalformedResponse("missing access_token".into()))?;
    let lifetime = parsed
        .expires_in
        .ok_or_else(|| AuthError::MalformedResponse("missing expires_in".into()))?;
    if lifetime < 0 {
        return Err(AuthError::MalformedResponse(format!(
            "negative expires_in {lifetime}"
        )));
    }

    let issued_at = inner.clock.now();
    let expires_at = chrono::Duration::try_seconds(lifetime)
        .and_then(|ttl| issued_at.checked_add_signed(ttl))
        .ok_or_else(|| {
            AuthError::MalformedResponse(format!("expires_in {lifetime} out of range"))
        })?;
    if chrono::Duration::seconds(lifetime) <= inner.safety_margin {
        tracing::warn!(
            "token lifetime of {}s is within the {}s safety margin; every call will re-exchange",
            lifetime,
            inner.safety_margin.num_seconds()
        );
    }
    tracing::info!(%expires_at, "access token acquired");

    Ok(AccessToken::new(value, issued_at, expires_at))
}
