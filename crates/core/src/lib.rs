//! # ICD Core
//!
//! Core logic for resolving free-text symptoms to ICD-11 entities.
//!
//! This crate contains:
//! - Startup configuration ([`CoreConfig`]) resolved once from the environment
//! - The access-token lifecycle manager ([`TokenBroker`])
//! - The search → detail → transform lookup pipeline ([`LookupPipeline`])
//! - Wire models and translation for ICD-API responses
//!
//! **No presentation concerns**: console formatting and process exit codes belong in the
//! `icd-run` binary.

pub mod config;
pub mod constants;
pub mod entity;
pub mod error;
pub mod lookup;
pub mod token;
pub mod transport;

pub use config::{CoreConfig, Credentials};
pub use entity::{Diagnosis, DiagnosisRecord, EntityDetail, SearchCandidate, SearchResult};
pub use error::{
    AuthError, ConfigError, IcdError, IcdResult, LookupError, LookupErrorCode, Stage,
    TransportError,
};
pub use lookup::LookupPipeline;
pub use token::{AccessToken, Clock, SystemClock, TokenBroker};
pub use transport::{HttpTransport, ReqwestTransport};

pub use icd_types::{MatchThreshold, NonEmptyText};

use std::sync::Arc;

/// Token broker and lookup pipeline wired to one shared transport.
#[derive(Clone, Debug)]
pub struct IcdClient {
    broker: TokenBroker,
    pipeline: LookupPipeline,
}

impl IcdClient {
    /// Build a client that talks to the configured endpoints over HTTP.
    pub fn new(config: &CoreConfig) -> IcdResult<Self> {
        let transport = Arc::new(ReqwestTransport::new(config.http_timeout())?);
        Ok(Self::with_transport(config, transport))
    }

    pub fn with_transport(config: &CoreConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let broker = TokenBroker::new(config, Arc::clone(&transport));
        let pipeline = LookupPipeline::new(config, broker.clone(), transport);
        Self { broker, pipeline }
    }

    pub fn broker(&self) -> &TokenBroker {
        &self.broker
    }

    pub fn pipeline(&self) -> &LookupPipeline {
        &self.pipeline
    }
}
