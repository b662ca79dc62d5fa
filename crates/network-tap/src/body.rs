//! Body Fetcher: lazy, soft-failing response body retrieval.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::FetchError;
use crate::metrics;
use crate::model::ExchangeId;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchedBody {
    pub body: String,
    pub base64_encoded: bool,
}

impl FetchedBody {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Collaborator seam that can return the payload of a completed exchange.
#[async_trait]
pub trait BodySource: Send + Sync {
    async fn response_body(&self, id: &ExchangeId) -> Result<FetchedBody, FetchError>;
}

/// Source used when no browser is attached (replay and offline classify).
#[derive(Clone, Copy, Debug, Default)]
pub struct NoBodies;

#[async_trait]
impl BodySource for NoBodies {
    async fn response_body(&self, _id: &ExchangeId) -> Result<FetchedBody, FetchError> {
        Err(FetchError::Unavailable("no browser attached".into()))
    }
}

#[derive(Clone)]
pub struct BodyFetcher {
    source: Arc<dyn BodySource>,
}

impl BodyFetcher {
    pub fn new(source: Arc<dyn BodySource>) -> Self {
        Self { source }
    }

    pub fn offline() -> Self {
        Self::new(Arc::new(NoBodies))
    }

    /// Never fails: an unavailable body comes back empty and not base64.
    pub async fn fetch(&self, id: &ExchangeId) -> FetchedBody {
        match self.source.response_body(id).await {
            Ok(body) => body,
            Err(err) => {
                warn!(target: "network-tap", %id, error = %err, "response body unavailable");
                metrics::record_body_fetch_failure();
                FetchedBody::empty()
            }
        }
    }
}

impl std::fmt::Debug for BodyFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyFetcher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    #[async_trait]
    impl BodySource for Fixed {
        async fn response_body(&self, id: &ExchangeId) -> Result<FetchedBody, FetchError> {
            match id.as_str() {
                "gone" => Err(FetchError::Source("No resource with given identifier found".into())),
                _ => Ok(FetchedBody {
                    body: "aGk=".into(),
                    base64_encoded: true,
                }),
            }
        }
    }

    #[tokio::test]
    async fn passes_through_available_bodies() {
        let fetcher = BodyFetcher::new(Arc::new(Fixed));
        let body = fetcher.fetch(&ExchangeId::from("1")).await;
        assert!(body.base64_encoded);
        assert_eq!(body.body, "aGk=");
    }

    #[tokio::test]
    async fn failure_becomes_empty_body() {
        let fetcher = BodyFetcher::new(Arc::new(Fixed));
        let before = metrics::snapshot().body_fetch_failures;
        let body = fetcher.fetch(&ExchangeId::from("gone")).await;
        assert_eq!(body, FetchedBody::empty());
        assert!(metrics::snapshot().body_fetch_failures > before);
    }

    #[tokio::test]
    async fn offline_fetcher_is_always_empty() {
        let body = BodyFetcher::offline().fetch(&ExchangeId::from("x")).await;
        assert!(body.body.is_empty());
        assert!(!body.base64_encoded);
    }
}
