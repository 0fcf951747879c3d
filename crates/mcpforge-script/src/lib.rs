//! Script Binding Layer (C6, §4.6).
//!
//! Publishes one namespace per connected server in the evaluator's global
//! symbol table. [`ScriptHost`] stands in for "the host-provided evaluator"
//! (§1 named external collaborator) — this crate never assumes a concrete
//! expression-engine type, only that it can be told to register/unregister
//! a namespace of [`Callable`]s.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod callable;
mod value;

use std::sync::Arc;

use mcpforge_core::ToolDescriptor;
use mcpforge_registry::{RegistrationListener, ServerRegistry};

pub use callable::Callable;
pub use value::{ScriptValue, to_json};

/// Stands in for the host's expression evaluator (§1). Implementors own the
/// global symbol table that namespaces are published into.
pub trait ScriptHost: Send + Sync {
    /// Publish `namespace` containing `callables`, replacing any prior
    /// namespace of the same name.
    fn register_namespace(&self, namespace: &str, callables: Vec<Callable>);

    /// Remove a previously published namespace, if any.
    fn unregister_namespace(&self, namespace: &str);
}

/// Bridges [`ServerRegistry`] connect/disconnect events into [`ScriptHost`]
/// namespace registration (§4.6, P3).
pub struct ScriptBindings<H: ScriptHost> {
    registry: Arc<ServerRegistry>,
    host: Arc<H>,
}

impl<H: ScriptHost + 'static> ScriptBindings<H> {
    /// Build bindings over `registry`, publishing namespaces through `host`.
    /// Does not subscribe by itself — call [`Self::install`].
    #[must_use]
    pub fn new(registry: Arc<ServerRegistry>, host: Arc<H>) -> Self {
        Self { registry, host }
    }

    /// Subscribe to the registry's registration events. After this call,
    /// every future connect/disconnect mutates the host's symbol table.
    pub async fn install(self: &Arc<Self>) {
        let listener: Arc<dyn RegistrationListener> = Arc::new(ScriptListener {
            registry: Arc::clone(&self.registry),
            host: Arc::clone(&self.host),
        });
        self.registry.subscribe(listener).await;
    }
}

struct ScriptListener<H: ScriptHost> {
    registry: Arc<ServerRegistry>,
    host: Arc<H>,
}

impl<H: ScriptHost> RegistrationListener for ScriptListener<H> {
    fn on_connected(&self, server: &str, tools: &[ToolDescriptor]) {
        let callables = tools
            .iter()
            .map(|tool| {
                let param_order: Vec<String> = tool.properties().into_iter().map(|(name, _)| name).collect();
                Callable::new(Arc::clone(&self.registry), server.to_string(), tool.name.clone(), param_order)
            })
            .collect();
        self.host.register_namespace(server, callables);
    }

    fn on_disconnected(&self, server: &str) {
        self.host.unregister_namespace(server);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeHost {
        namespaces: Mutex<Vec<String>>,
    }

    impl ScriptHost for FakeHost {
        fn register_namespace(&self, namespace: &str, _callables: Vec<Callable>) {
            self.namespaces.lock().unwrap().push(namespace.to_string());
        }

        fn unregister_namespace(&self, namespace: &str) {
            self.namespaces.lock().unwrap().retain(|n| n != namespace);
        }
    }

    #[tokio::test]
    async fn connect_and_disconnect_mirror_into_host_namespaces() {
        let registry = Arc::new(ServerRegistry::new());
        let host = Arc::new(FakeHost::default());
        let bindings = Arc::new(ScriptBindings::new(Arc::clone(&registry), Arc::clone(&host)));
        bindings.install().await;

        registry.add(mcpforge_config::ServerConfig::stdio("weather", "npx")).await.unwrap();
        // Can't actually connect (no real child process), but we can drive the
        // listener directly the way the registry would on a successful connect.
        let listener: Arc<dyn RegistrationListener> = Arc::new(ScriptListener { registry: Arc::clone(&registry), host: Arc::clone(&host) });
        listener.on_connected("weather", &[]);
        assert_eq!(host.namespaces.lock().unwrap().as_slice(), ["weather"]);

        listener.on_disconnected("weather");
        assert!(host.namespaces.lock().unwrap().is_empty());
    }
}
