//! Command Binding Layer wiring (C7, §4.7).
//!
//! [`CommandHost`] stands in for "the host command-dispatcher framework"
//! and [`BackgroundExecutor`] for "the host-provided background executor"
//! (§1 named external collaborators). [`CommandBindings`] keeps the
//! dispatcher tree in lock-step with the server registry, always rebuilding
//! it wholesale rather than patching it (§4.7 "Registry coherence").

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use mcpforge_core::{McpForgeError, ToolDescriptor};
use mcpforge_registry::{DispatchHost, RegistrationListener, ServerRegistry};
use tokio::sync::RwLock;
use tracing::warn;

use crate::parse::{missing_required, parse_arguments};
use crate::spec::CommandSpec;

/// Stands in for the host's textual command dispatcher tree.
pub trait CommandHost: Send + Sync {
    /// Replace the whole dispatcher tree with `commands`, sorted by name
    /// (§4.7 "always fully rebuilt, not patched, to avoid stale nodes").
    fn rebuild(&self, commands: &[CommandSpec]);
}

/// Stands in for the host's background executor used to offload RPCs so the
/// command surface never blocks its caller (§4.7 "Execution").
pub trait BackgroundExecutor: Send + Sync {
    /// Run `job` off the calling thread/task.
    fn execute(&self, job: Pin<Box<dyn Future<Output = ()> + Send>>);
}

/// A place results get displayed, "routed back through the host dispatcher"
/// (§4.7). Reuses [`DispatchHost`] from the registry crate rather than
/// introducing a second marshalling abstraction for the same concern.
pub type OutputSink = Arc<dyn Fn(String) + Send + Sync>;

/// Bridges [`ServerRegistry`] connect/disconnect events into a [`CommandHost`]
/// dispatcher tree (§4.7 "Registry coherence").
pub struct CommandBindings<H: CommandHost> {
    registry: Arc<ServerRegistry>,
    host: Arc<H>,
    commands: RwLock<Vec<CommandSpec>>,
}

impl<H: CommandHost + 'static> CommandBindings<H> {
    /// Build bindings over `registry`, publishing into `host`.
    #[must_use]
    pub fn new(registry: Arc<ServerRegistry>, host: Arc<H>) -> Self {
        Self { registry, host, commands: RwLock::new(Vec::new()) }
    }

    /// Subscribe to the registry's registration events.
    pub async fn install(self: &Arc<Self>) {
        let listener: Arc<dyn RegistrationListener> = Arc::new(CommandListener { bindings: Arc::clone(self) });
        self.registry.subscribe(listener).await;
    }

    /// Current dispatcher-visible commands, sorted by name.
    pub async fn commands(&self) -> Vec<CommandSpec> {
        self.commands.read().await.clone()
    }

    async fn on_connected(&self, server: &str, tools: &[ToolDescriptor]) {
        let mut commands = self.commands.write().await;
        commands.retain(|c| c.server != server);
        commands.extend(tools.iter().map(CommandSpec::from_tool));
        commands.sort_by(|a, b| a.name().cmp(&b.name()));
        self.host.rebuild(&commands);
    }

    async fn on_disconnected(&self, server: &str) {
        let mut commands = self.commands.write().await;
        commands.retain(|c| c.server != server);
        self.host.rebuild(&commands);
    }
}

struct CommandListener<H: CommandHost> {
    bindings: Arc<CommandBindings<H>>,
}

impl<H: CommandHost + 'static> RegistrationListener for CommandListener<H> {
    fn on_connected(&self, server: &str, tools: &[ToolDescriptor]) {
        let bindings = Arc::clone(&self.bindings);
        let server = server.to_string();
        let tools = tools.to_vec();
        tokio::spawn(async move { bindings.on_connected(&server, &tools).await });
    }

    fn on_disconnected(&self, server: &str) {
        let bindings = Arc::clone(&self.bindings);
        let server = server.to_string();
        tokio::spawn(async move { bindings.on_disconnected(&server).await });
    }
}

/// Invoke one command line against `spec`: `help`, argument parsing,
/// `required` validation, then an offloaded RPC whose rendered result is
/// delivered to `output` via `dispatch` (§4.7 "Execution").
pub fn invoke(
    registry: Arc<ServerRegistry>,
    executor: Arc<dyn BackgroundExecutor>,
    dispatch: Arc<dyn DispatchHost>,
    spec: CommandSpec,
    raw_input: &str,
    output: OutputSink,
) {
    if raw_input.trim() == "help" {
        let help = spec.help_text();
        dispatch.post(Box::new(move || output(help)));
        return;
    }

    let arguments = match parse_arguments(raw_input, &spec.params) {
        Ok(args) => args,
        Err(e) => {
            let message = render_parse_error(&e);
            dispatch.post(Box::new(move || output(message)));
            return;
        },
    };

    let missing = missing_required(&arguments, &spec.required);
    if !missing.is_empty() {
        let usage = spec.usage();
        let message = format!("Missing required parameters. Usage: {usage}");
        dispatch.post(Box::new(move || output(message)));
        return;
    }

    let server = spec.server.clone();
    let tool = spec.tool.clone();

    executor.execute(Box::pin(async move {
        let rendered = match registry.call_tool(&server, &tool, arguments).await {
            Ok(outcome) => outcome.render_for_command(),
            Err(McpForgeError::NotConnected { name }) => format!("Tool Error: server '{name}' is not connected."),
            Err(e) => {
                warn!(server = %server, tool = %tool, error = %e, "command RPC failed");
                format!("Tool Error: {e}")
            },
        };
        dispatch.post(Box::new(move || output(rendered)));
    }));
}

fn render_parse_error(error: &McpForgeError) -> String {
    match error {
        McpForgeError::SchemaError(message) => format!("Argument parsing failed: {message}"),
        other => format!("Argument parsing failed: {other}"),
    }
}

/// Completion suggestions over parameter names, each rendered as `<name>=`,
/// filtered by the remaining input prefix (case-insensitive) (§4.7
/// "Suggestions").
#[must_use]
pub fn suggest(spec: &CommandSpec, prefix: &str) -> Vec<String> {
    let prefix_lower = prefix.to_ascii_lowercase();
    spec.params
        .iter()
        .filter(|p| p.name.to_ascii_lowercase().starts_with(&prefix_lower))
        .map(|p| format!("{}=", p.name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn forecast_spec() -> CommandSpec {
        CommandSpec {
            server: "weather".to_string(),
            tool: "get_forecast".to_string(),
            description: Some("desc".to_string()),
            params: crate::parse::param_specs(&[
                ("location".to_string(), serde_json::json!({"type": "string"})),
                ("days".to_string(), serde_json::json!({"type": "integer"})),
            ]),
            required: vec!["location".to_string()],
        }
    }

    struct RecordingExecutor;
    impl BackgroundExecutor for RecordingExecutor {
        fn execute(&self, job: Pin<Box<dyn Future<Output = ()> + Send>>) {
            tokio::spawn(job);
        }
    }

    #[tokio::test]
    async fn help_bypasses_rpc_and_renders_directly() {
        let registry = Arc::new(ServerRegistry::new());
        let dispatch: Arc<dyn DispatchHost> = Arc::new(mcpforge_registry::InlineDispatch);
        let executor: Arc<dyn BackgroundExecutor> = Arc::new(RecordingExecutor);
        let captured = Arc::new(Mutex::new(None));
        let captured_clone = Arc::clone(&captured);
        let output: OutputSink = Arc::new(move |s| *captured_clone.lock().unwrap() = Some(s));

        invoke(registry, executor, dispatch, forecast_spec(), "help", output);

        let text = captured.lock().unwrap().clone().unwrap();
        assert!(text.contains("Usage: weather:get_forecast"));
    }

    #[tokio::test]
    async fn s4_missing_required_reports_without_rpc() {
        let registry = Arc::new(ServerRegistry::new());
        let dispatch: Arc<dyn DispatchHost> = Arc::new(mcpforge_registry::InlineDispatch);
        let executor: Arc<dyn BackgroundExecutor> = Arc::new(RecordingExecutor);
        let captured = Arc::new(Mutex::new(None));
        let captured_clone = Arc::clone(&captured);
        let output: OutputSink = Arc::new(move |s| *captured_clone.lock().unwrap() = Some(s));

        invoke(registry, executor, dispatch, forecast_spec(), "days=1", output);

        let text = captured.lock().unwrap().clone().unwrap();
        assert_eq!(text, "Missing required parameters. Usage: <location:string> [days:integer]");
    }

    #[test]
    fn suggestions_filter_by_prefix_case_insensitive() {
        let spec = forecast_spec();
        assert_eq!(suggest(&spec, "d"), vec!["days="]);
        assert_eq!(suggest(&spec, "D"), vec!["days="]);
        assert_eq!(suggest(&spec, "loc"), vec!["location="]);
    }
}
