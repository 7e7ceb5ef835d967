//! Cached model listings.
//!
//! Listing models is a network call on every provider, and the CLI asks for
//! it far more often than the listings change. The catalog keeps one entry
//! per provider with a TTL so repeated calls within the window skip the
//! network. Errors are never cached; a failed fetch is retried on the next
//! call.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::providers::{GatewayError, ModelList, ProviderGateway};

/// TTL cache over [`ProviderGateway::list_models`], keyed by provider id.
pub struct ModelCatalog {
    cache: Cache<String, ModelList>,
}

impl ModelCatalog {
    /// Create a catalog holding up to `max_providers` listings for `ttl`.
    pub fn new(max_providers: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_providers)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    /// List a provider's models, served from cache while fresh.
    pub async fn list(
        &self,
        gateway: &Arc<dyn ProviderGateway>,
    ) -> Result<ModelList, GatewayError> {
        let provider = gateway.name().to_string();
        if let Some(cached) = self.cache.get(&provider).await {
            tracing::debug!(provider = %provider, "model listing served from cache");
            return Ok(cached);
        }

        let listing = gateway.list_models().await?;
        self.cache.insert(provider, listing.clone()).await;
        Ok(listing)
    }

    /// Fetch every provider's listing concurrently, refreshing the cache.
    ///
    /// Failures are reported per provider rather than aborting the batch.
    pub async fn refresh_all(
        &self,
        gateways: &[Arc<dyn ProviderGateway>],
    ) -> Vec<(String, Result<ModelList, GatewayError>)> {
        let fetches = gateways.iter().map(|gateway| async {
            let provider = gateway.name().to_string();
            let result = gateway.list_models().await;
            match &result {
                Ok(listing) => {
                    self.cache.insert(provider.clone(), listing.clone()).await;
                }
                Err(error) => {
                    tracing::warn!(provider = %provider, error = %error, "model listing refresh failed");
                }
            }
            (provider, result)
        });
        futures::future::join_all(fetches).await
    }

    /// Drop every cached listing.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Number of cached listings.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::new(64, Duration::from_secs(300))
    }
}
