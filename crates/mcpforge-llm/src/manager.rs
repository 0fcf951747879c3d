//! LLM Client Manager (C9, §4.9).
//!
//! Caches one backend client, rebuilding it only when the live [`LlmConfig`]
//! changes (structural equality, §3 "Equality is structural and drives
//! client cache invalidation"). A single mutex guards both the cached
//! config and client, matching §4.9's "thread-safe via a single mutex
//! guarding cache and current-config fields" and mirroring this workspace's
//! other single-critical-section components (§5).

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use mcpforge_config::LlmConfig;

use crate::backend::{LlmBackend, LlmBackendFactory};
use crate::error::LlmResult;
use crate::types::{GenerateRequest, Turn};

struct Cached {
    config: LlmConfig,
    client: Arc<dyn LlmBackend>,
}

/// Owns the cached LLM backend client, rebuilding it on config change.
pub struct LlmClientManager<F: LlmBackendFactory> {
    factory: F,
    cached: Mutex<Option<Cached>>,
}

impl<F: LlmBackendFactory> LlmClientManager<F> {
    /// A manager with no client cached yet.
    #[must_use]
    pub fn new(factory: F) -> Self {
        Self { factory, cached: Mutex::new(None) }
    }

    /// Fetch the cached client, rebuilding it if `config` differs
    /// structurally from the last one used (§4.9 "`getClient()` rebuilds
    /// when the stored config differs, closing the old client
    /// best-effort").
    ///
    /// # Errors
    ///
    /// Returns whatever [`LlmBackendFactory::build`] returns, most commonly
    /// [`crate::error::LlmError::ApiKeyMissing`].
    pub async fn get_client(&self, config: &LlmConfig) -> LlmResult<Arc<dyn LlmBackend>> {
        let mut slot = self.cached.lock().await;
        if let Some(cached) = slot.as_ref() {
            if &cached.config == config {
                return Ok(Arc::clone(&cached.client));
            }
        }

        let new_client = self.factory.build(config).await?;
        let old = slot.replace(Cached { config: config.clone(), client: Arc::clone(&new_client) });
        drop(slot);

        if let Some(old) = old {
            debug!("LLM config changed, closing previous client");
            old.client.close().await;
        }

        Ok(new_client)
    }

    /// Drop the cached client, closing it best-effort (§4.9 "`invalidate()`
    /// drops the cache").
    pub async fn invalidate(&self) {
        let mut slot = self.cached.lock().await;
        if let Some(cached) = slot.take() {
            drop(slot);
            cached.client.close().await;
        }
    }

    /// Build a throw-away client for `config` and issue a short fixed
    /// prompt, never touching the cache (§4.9 "`testConfiguration(config)`
    /// ... never mutates the cache").
    pub async fn test_configuration(&self, config: &LlmConfig) -> (bool, String) {
        let client = match self.factory.build(config).await {
            Ok(client) => client,
            Err(e) => return (false, e.to_string()),
        };

        let request = GenerateRequest::simple(config.model_id, config.max_output_tokens, config.temperature);
        let history = vec![Turn::user("Reply with the single word OK.")];
        let result = client.generate_content(&history, &request).await;
        client.close().await;

        match result {
            Ok(_) => (true, "Connection succeeded.".to_string()),
            Err(e) => (false, e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::{LlmError, LlmResult};
    use crate::types::GenerateResponse;

    struct FakeBackend {
        id: usize,
        closed: Arc<std::sync::atomic::AtomicBool>,
    }

    #[async_trait]
    impl LlmBackend for FakeBackend {
        async fn generate_content(&self, _history: &[Turn], _request: &GenerateRequest) -> LlmResult<GenerateResponse> {
            Ok(GenerateResponse { text: Some(format!("client-{}", self.id)), function_calls: vec![] })
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    struct FakeFactory {
        builds: AtomicUsize,
        fail: bool,
    }

    impl FakeFactory {
        fn new(fail: bool) -> Self {
            Self { builds: AtomicUsize::new(0), fail }
        }
    }

    #[async_trait]
    impl LlmBackendFactory for FakeFactory {
        async fn build(&self, _config: &LlmConfig) -> LlmResult<Arc<dyn LlmBackend>> {
            if self.fail {
                return Err(LlmError::ApiKeyMissing);
            }
            let id = self.builds.fetch_add(1, Ordering::SeqCst);
            let closed = Arc::new(std::sync::atomic::AtomicBool::new(false));
            Ok(Arc::new(FakeBackend { id, closed }))
        }
    }

    #[tokio::test]
    async fn same_config_reuses_cached_client() {
        let manager = LlmClientManager::new(FakeFactory::new(false));
        let config = LlmConfig::default().with_enabled(true).with_api_key("key");

        let first = manager.get_client(&config).await.unwrap();
        let second = manager.get_client(&config).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn changed_config_rebuilds_client() {
        let manager = LlmClientManager::new(FakeFactory::new(false));
        let config_a = LlmConfig::default().with_enabled(true).with_api_key("key-a");
        let config_b = LlmConfig::default().with_enabled(true).with_api_key("key-b");

        let first = manager.get_client(&config_a).await.unwrap();
        let second = manager.get_client(&config_b).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn invalidate_drops_cache_and_forces_rebuild() {
        let manager = LlmClientManager::new(FakeFactory::new(false));
        let config = LlmConfig::default().with_enabled(true).with_api_key("key");

        let first = manager.get_client(&config).await.unwrap();
        manager.invalidate().await;
        let second = manager.get_client(&config).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_configuration_reports_failure_without_caching() {
        let manager = LlmClientManager::new(FakeFactory::new(true));
        let config = LlmConfig::default().with_enabled(true).with_api_key("key");

        let (ok, _message) = manager.test_configuration(&config).await;
        assert!(!ok);
    }
}
