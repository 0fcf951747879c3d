//! Registration event fan-out and dispatch-thread marshalling (§4.4, §5, §9).
//!
//! The script namespace (C6) and command registry (C7) are external
//! collaborators from the registry's point of view; they subscribe as
//! [`RegistrationListener`]s rather than the registry depending on their
//! crates directly. Mutations to those surfaces must be marshalled onto the
//! host's single dispatch thread; [`DispatchHost`] stands in for that queue,
//! with [`InlineDispatch`] as the documented fallback "If the host exposes
//! no such queue" (§9).

use std::sync::Arc;

use mcpforge_core::ToolDescriptor;

/// Receives registration/deregistration notifications as servers connect
/// and disconnect (§4.4 "emits two events... (a) register in C6... (b)
/// register in C7").
pub trait RegistrationListener: Send + Sync {
    /// A server connected; `tools` is its frozen post-handshake snapshot.
    fn on_connected(&self, server: &str, tools: &[ToolDescriptor]);

    /// A server disconnected; the listener must remove every entry keyed by
    /// this server (P3).
    fn on_disconnected(&self, server: &str);
}

/// Stand-in for the host's single-consumer dispatch queue that serializes
/// mutation of the script namespace and command dispatcher tree (§5).
pub trait DispatchHost: Send + Sync {
    /// Post a job to run on the dispatch thread.
    fn post(&self, job: Box<dyn FnOnce() + Send>);
}

/// Fallback dispatch host: runs the job inline. Used at startup and in
/// tests, where no host dispatch thread exists (§5, §9).
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineDispatch;

impl DispatchHost for InlineDispatch {
    fn post(&self, job: Box<dyn FnOnce() + Send>) {
        job();
    }
}

/// Fan out a registration event to every listener via the dispatch host.
pub(crate) fn dispatch_connected(
    dispatch: &Arc<dyn DispatchHost>,
    listeners: Vec<Arc<dyn RegistrationListener>>,
    server: String,
    tools: Vec<ToolDescriptor>,
) {
    dispatch.post(Box::new(move || {
        for listener in &listeners {
            listener.on_connected(&server, &tools);
        }
    }));
}

/// Fan out a deregistration event to every listener via the dispatch host.
pub(crate) fn dispatch_disconnected(dispatch: &Arc<dyn DispatchHost>, listeners: Vec<Arc<dyn RegistrationListener>>, server: String) {
    dispatch.post(Box::new(move || {
        for listener in &listeners {
            listener.on_disconnected(&server);
        }
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl RegistrationListener for Recorder {
        fn on_connected(&self, server: &str, tools: &[ToolDescriptor]) {
            self.0.lock().unwrap().push(format!("connected:{server}:{}", tools.len()));
        }
        fn on_disconnected(&self, server: &str) {
            self.0.lock().unwrap().push(format!("disconnected:{server}"));
        }
    }

    #[test]
    fn inline_dispatch_runs_synchronously() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatch: Arc<dyn DispatchHost> = Arc::new(InlineDispatch);
        let listener: Arc<dyn RegistrationListener> = Arc::new(Recorder(Arc::clone(&log)));

        dispatch_connected(&dispatch, vec![listener.clone()], "weather".to_string(), vec![]);
        dispatch_disconnected(&dispatch, vec![listener], "weather".to_string());

        let log = log.lock().unwrap();
        assert_eq!(log.as_slice(), ["connected:weather:0", "disconnected:weather"]);
    }
}
