//! Async Tool Cache (C5, §4.5).
//!
//! Scripting contexts that evaluate synchronously (§4.6) cannot await an MCP
//! round trip, so reads of a tool's *value* go through this cache instead of
//! the transport directly: [`AsyncToolCache::read`] never awaits and always
//! returns a string immediately, starting a background refresh the first
//! time a given key is seen and piggy-backing on it (never duplicating it)
//! for every call that arrives while it is in flight (P8).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use mcpforge_core::{McpForgeError, McpForgeResult, ToolOutcome};
use serde_json::{Map, Value};

/// A pending-or-ready refresh, boxed so the cache does not need to know the
/// concrete future type of whatever submitted it.
type RefreshFuture = Pin<Box<dyn Future<Output = McpForgeResult<ToolOutcome>> + Send>>;

/// Canonical cache key: `<server>.<tool>(k=v,k=v,...)` with arguments sorted
/// by key so insertion order never changes identity (§4.5, P5).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build the canonical key for one server/tool/argument combination.
    #[must_use]
    pub fn canonical(server: &str, tool: &str, arguments: &Map<String, Value>) -> Self {
        let mut pairs: Vec<(&String, String)> = arguments.iter().map(|(k, v)| (k, canonical_value(v))).collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        let joined = pairs.into_iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(",");
        Self(format!("{server}.{tool}({joined})"))
    }

    #[must_use]
    fn server_prefix(server: &str) -> String {
        format!("{server}.")
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn canonical_value(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut pairs: Vec<(&String, String)> = map.iter().map(|(k, v)| (k, canonical_value(v))).collect();
            pairs.sort_by(|a, b| a.0.cmp(b.0));
            let joined = pairs.into_iter().map(|(k, v)| format!("{k}:{v}")).collect::<Vec<_>>().join(",");
            format!("{{{joined}}}")
        },
        Value::Array(items) => {
            let joined = items.iter().map(canonical_value).collect::<Vec<_>>().join(",");
            format!("[{joined}]")
        },
        // Scalars already serialize deterministically regardless of where
        // they sit in the argument map.
        other => other.to_string(),
    }
}

/// Holds the last rendered value and in-flight state for one cache key.
#[derive(Default)]
struct CacheEntry {
    value: std::sync::Mutex<Option<String>>,
    in_flight: AtomicBool,
}

const LOADING_PLACEHOLDER: &str = "Loading...";

/// The non-blocking, single-flight cache sitting in front of every
/// script-visible tool read (C5, §4.5).
#[derive(Default)]
pub struct AsyncToolCache {
    entries: DashMap<String, Arc<CacheEntry>>,
}

impl AsyncToolCache {
    /// New, empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the current rendered value for `(server, tool, arguments)`,
    /// starting a background refresh via `submit` if none is already in
    /// flight for this key. Returns the last known value (or a loading
    /// placeholder on the very first read) without ever awaiting `submit`.
    ///
    /// `submit` is called at most once per in-flight window: callers that
    /// arrive while a refresh is already running observe the same pending
    /// state rather than enqueueing a second transport call (P4/P8).
    pub fn read(&self, server: &str, tool: &str, arguments: &Map<String, Value>, submit: impl FnOnce() -> RefreshFuture) -> String {
        let key = CacheKey::canonical(server, tool, arguments);
        let entry: Arc<CacheEntry> = self.entries.entry(key.0.clone()).or_default().clone();

        if entry.in_flight.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok() {
            let future = submit();
            let entry_for_task = Arc::clone(&entry);
            tokio::spawn(async move {
                let rendered = match future.await {
                    Ok(outcome) => outcome.render_for_script(),
                    Err(e) => format!("Error: {e}"),
                };
                *entry_for_task.value.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(rendered);
                entry_for_task.in_flight.store(false, Ordering::Release);
            });
        }

        entry
            .value
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
            .unwrap_or_else(|| LOADING_PLACEHOLDER.to_string())
    }

    /// Remove every entry belonging to `server` (called on disconnect, §4.5
    /// "stale entries for a disconnected server are evicted", P3).
    pub fn evict_server(&self, server: &str) {
        let prefix = CacheKey::server_prefix(server);
        self.entries.retain(|key, _| !key.starts_with(&prefix));
    }

    /// Number of cached keys, for diagnostics and tests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache currently holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Helper so callers outside this module can build a boxed refresh future
/// from any `Future` without naming its type.
#[must_use]
pub fn boxed_refresh(fut: impl Future<Output = McpForgeResult<ToolOutcome>> + Send + 'static) -> RefreshFuture {
    Box::pin(fut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpforge_core::Content;

    fn outcome(text: &str) -> ToolOutcome {
        ToolOutcome { content: vec![Content::Text { text: text.to_string() }], structured: None, meta: None, is_error: false }
    }

    #[test]
    fn cache_key_ignores_argument_order() {
        let mut a = Map::new();
        a.insert("city".to_string(), Value::String("nyc".to_string()));
        a.insert("units".to_string(), Value::String("metric".to_string()));

        let mut b = Map::new();
        b.insert("units".to_string(), Value::String("metric".to_string()));
        b.insert("city".to_string(), Value::String("nyc".to_string()));

        assert_eq!(CacheKey::canonical("weather", "forecast", &a), CacheKey::canonical("weather", "forecast", &b));
    }

    #[test]
    fn cache_key_ignores_nested_object_key_order() {
        // P5 requires equal argument maps to produce equal keys regardless of
        // insertion order, including insertion order *inside* an object-typed
        // argument value (not just the top-level argument map).
        let mut coords_a = Map::new();
        coords_a.insert("lat".to_string(), Value::from(40));
        coords_a.insert("lon".to_string(), Value::from(-74));

        let mut coords_b = Map::new();
        coords_b.insert("lon".to_string(), Value::from(-74));
        coords_b.insert("lat".to_string(), Value::from(40));

        let mut a = Map::new();
        a.insert("coords".to_string(), Value::Object(coords_a));

        let mut b = Map::new();
        b.insert("coords".to_string(), Value::Object(coords_b));

        assert_eq!(CacheKey::canonical("weather", "forecast", &a), CacheKey::canonical("weather", "forecast", &b));
    }

    #[test]
    fn cache_key_differs_by_tool_and_server() {
        let args = Map::new();
        let k1 = CacheKey::canonical("weather", "forecast", &args);
        let k2 = CacheKey::canonical("weather", "radar", &args);
        let k3 = CacheKey::canonical("maps", "forecast", &args);
        assert_ne!(k1, k2);
        assert_ne!(k1, k3);
    }

    #[tokio::test]
    async fn read_returns_placeholder_then_converges() {
        let cache = AsyncToolCache::new();
        let args = Map::new();

        let first = cache.read("weather", "forecast", &args, || {
            boxed_refresh(async {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                Ok(outcome("72F and sunny"))
            })
        });
        assert_eq!(first, LOADING_PLACEHOLDER);

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let second = cache.read("weather", "forecast", &args, || {
            boxed_refresh(async { Ok(outcome("unreached")) })
        });
        assert_eq!(second, "72F and sunny");
    }

    #[tokio::test]
    async fn concurrent_reads_do_not_duplicate_the_refresh() {
        let cache = Arc::new(AsyncToolCache::new());
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let args = Map::new();

        for _ in 0..5 {
            let calls = Arc::clone(&calls);
            cache.read("weather", "forecast", &args, || {
                calls.fetch_add(1, Ordering::SeqCst);
                boxed_refresh(async {
                    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                    Ok(outcome("done"))
                })
            });
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn evict_server_removes_only_its_own_keys() {
        let cache = AsyncToolCache::new();
        let args = Map::new();
        cache.read("weather", "forecast", &args, || boxed_refresh(async { Ok(outcome("x")) }));
        cache.read("maps", "geocode", &args, || boxed_refresh(async { Ok(outcome("y")) }));

        cache.evict_server("weather");

        assert_eq!(cache.len(), 1);
    }
}
