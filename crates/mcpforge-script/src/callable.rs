//! Per-tool callable exposed inside a server's script namespace (§4.6).

use std::sync::Arc;

use mcpforge_registry::ServerRegistry;
use serde_json::Map;

use crate::value::{ScriptValue, to_json};

/// A single tool, bound to its server and parameter order, callable from
/// the evaluator.
#[derive(Clone)]
pub struct Callable {
    registry: Arc<ServerRegistry>,
    server: String,
    tool: String,
    /// Parameter names in the schema's `properties` insertion order, used
    /// to map positional arguments (§4.6 step 2).
    param_order: Vec<String>,
}

impl Callable {
    /// Bind a callable to `server`/`tool`, with parameters mapped in
    /// `param_order` (the schema's declaration order).
    #[must_use]
    pub fn new(registry: Arc<ServerRegistry>, server: String, tool: String, param_order: Vec<String>) -> Self {
        Self { registry, server, tool, param_order }
    }

    /// Server this callable is bound to.
    #[must_use]
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Tool this callable invokes.
    #[must_use]
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Invoke with positional arguments, already popped off the evaluator's
    /// stack in call order (§4.6 step 2: the reversal that recovers call
    /// order from a stack is the host's concern, not this binding's).
    ///
    /// Returns the rendered result string synchronously; never blocks on
    /// RPC (§4.6 step 4 delegates to the async cache).
    pub fn invoke(&self, args: &[ScriptValue]) -> String {
        if !self.registry.is_connected(&self.server) {
            return "Error: Server disconnected".to_string();
        }

        let mut map = Map::new();
        for (name, value) in self.param_order.iter().zip(args) {
            map.insert(name.clone(), to_json(value));
        }

        match self.registry.read_cached(&self.server, &self.tool, &map) {
            Ok(rendered) => rendered,
            Err(e) => format!("Error: {e}"),
        }
    }
}

impl std::fmt::Debug for Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callable").field("server", &self.server).field("tool", &self.tool).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoke_on_disconnected_server_reports_disconnect_error() {
        let registry = Arc::new(ServerRegistry::new());
        let callable = Callable::new(registry, "weather".to_string(), "get_forecast".to_string(), vec!["location".to_string()]);
        assert_eq!(callable.invoke(&[ScriptValue::Str("Tokyo".into())]), "Error: Server disconnected");
    }
}
