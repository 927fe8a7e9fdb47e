//! Runtime bootstrap: telemetry and wiring of the API client and query cache.

pub mod error;
pub mod telemetry;

use crate::api::{ApiClient, TokenStore};
use crate::config::Settings;
use crate::query::{QueryClient, QueryConfig};

use self::error::InfraError;

/// Long-lived handles built from resolved settings.
#[derive(Debug, Clone)]
pub struct Runtime {
    pub api: ApiClient,
    pub queries: QueryClient,
}

impl Runtime {
    pub fn from_settings(settings: &Settings) -> Result<Self, InfraError> {
        let tokens = TokenStore::new(settings.api.token.clone());
        let api = ApiClient::new(settings.api.base_url.clone(), tokens, settings.api.timeout)
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        let queries = QueryClient::new(QueryConfig::from(&settings.query));
        Ok(Self { api, queries })
    }
}
