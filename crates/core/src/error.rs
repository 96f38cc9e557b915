use std::fmt;

/// Failures of the underlying HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Request(String),
}

/// Startup configuration problems. Always fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("required environment variable {name} is not set")]
    Missing { name: &'static str },
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Credential exchange failures.
///
/// `Clone` because a single exchange result is handed to every caller that
/// was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("token request failed: {0}")]
    Transport(#[from] TransportError),
    #[error("token endpoint rejected credentials (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("malformed token response: {0}")]
    MalformedResponse(String),
    #[error("token exchange task aborted: {0}")]
    Aborted(String),
}

/// Pipeline stage, used to tag lookup failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Search,
    Detail,
    Candidates,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Search => "search",
            Stage::Detail => "detail lookup",
            Stage::Candidates => "candidate search",
        };
        f.write_str(name)
    }
}

/// Stable machine-readable code for a [`LookupError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupErrorCode {
    NoMatch,
    BadUri,
    HttpStatus,
    MissingField,
    Malformed,
    Transport,
}

impl LookupErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            LookupErrorCode::NoMatch => "NO_MATCH",
            LookupErrorCode::BadUri => "BAD_URI",
            LookupErrorCode::HttpStatus => "HTTP_STATUS",
            LookupErrorCode::MissingField => "MISSING_FIELD",
            LookupErrorCode::Malformed => "MALFORMED",
            LookupErrorCode::Transport => "TRANSPORT",
        }
    }
}

impl fmt::Display for LookupErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("no ICD entity matched '{search_text}'")]
    NoMatch { search_text: String },
    #[error("search returned an unusable foundation URI '{uri}': {reason}")]
    InvalidFoundationUri { uri: String, reason: String },
    #[error("{stage} returned HTTP {status}: {body}")]
    Status {
        stage: Stage,
        status: u16,
        body: String,
    },
    #[error("{stage} response is missing required field '{field}'")]
    MissingField { stage: Stage, field: &'static str },
    #[error("{stage} response could not be parsed: {message}")]
    MalformedResponse { stage: Stage, message: String },
    #[error("{stage} request failed: {source}")]
    Transport {
        stage: Stage,
        #[source]
        source: TransportError,
    },
}

impl LookupError {
    pub fn code(&self) -> LookupErrorCode {
        match self {
            LookupError::NoMatch { .. } => LookupErrorCode::NoMatch,
            LookupError::InvalidFoundationUri { .. } => LookupErrorCode::BadUri,
            LookupError::Status { .. } => LookupErrorCode::HttpStatus,
            LookupError::MissingField { .. } => LookupErrorCode::MissingField,
            LookupError::MalformedResponse { .. } => LookupErrorCode::Malformed,
            LookupError::Transport { .. } => LookupErrorCode::Transport,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IcdError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),
    #[error("lookup error [{code}]: {0}", code = .0.code())]
    Lookup(#[from] LookupError),
    #[error("HTTP client setup failed: {0}")]
    Http(#[from] TransportError),
}

pub type IcdResult<T> = std::result::Result<T, IcdError>;
