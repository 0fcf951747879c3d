//! Per-Server Request Queue (C3, §4.3).
//!
//! The underlying MCP client is synchronous and must not be called
//! concurrently (§4.3 rationale). A dedicated worker task owns the transport
//! service and drains requests strictly FIFO; `submit` never blocks, and
//! shutdown drains anything still queued with [`McpForgeError::ShuttingDown`]
//! rather than forcing the in-flight call to abort.
//!
//! Tool calls are the operation named in §4.3, but the same worker also
//! serves resource/prompt reads (supplemental feature #1) — they share the
//! one transport handle a stdio child process tolerates, so they share its
//! queue rather than risking a second concurrent caller.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use mcpforge_core::{McpForgeError, McpForgeResult, PromptDescriptor, ResourceContent, ResourceDescriptor, ToolOutcome};
use rmcp::RoleClient;
use rmcp::model::{CallToolRequestParams, GetPromptRequestParams, ReadResourceRequestParams};
use rmcp::service::RunningService;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::convert::{
    prompt_content_from_rmcp, prompt_descriptor_from_rmcp, resource_content_from_rmcp,
    resource_descriptor_from_rmcp, tool_outcome_from_rmcp,
};
use crate::handler::McpClientHandler;

/// One queued unit of work. Each variant carries its own response channel so
/// the worker can stay generic over what it is completing.
enum Operation {
    CallTool { tool_name: String, arguments: Map<String, Value>, respond_to: oneshot::Sender<McpForgeResult<ToolOutcome>> },
    ListResources { respond_to: oneshot::Sender<McpForgeResult<Vec<ResourceDescriptor>>> },
    ReadResource { uri: String, respond_to: oneshot::Sender<McpForgeResult<Vec<ResourceContent>>> },
    ListPrompts { respond_to: oneshot::Sender<McpForgeResult<Vec<PromptDescriptor>>> },
    GetPrompt {
        name: String,
        arguments: Option<Map<String, Value>>,
        respond_to: oneshot::Sender<McpForgeResult<Vec<(String, String)>>>,
    },
}

/// Serializes requests on one MCP connection (§4.3).
pub struct RequestQueue {
    tx: tokio::sync::mpsc::UnboundedSender<Operation>,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    shutdown_flag: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RequestQueue {
    /// Spawn the worker task that owns `service` for its lifetime. `service`
    /// is the only handle ever used to talk to the transport, per §5 ("the
    /// only thread allowed to call the transport's callTool").
    pub fn spawn(service: RunningService<RoleClient, McpClientHandler>, server_name: String, timeout: Duration) -> Self {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let flag = Arc::new(AtomicBool::new(false));

        let worker = tokio::spawn(worker_loop(service, rx, shutdown_rx, timeout, server_name, Arc::clone(&flag)));

        Self { tx, shutdown_tx: Mutex::new(Some(shutdown_tx)), shutdown_flag: flag, worker: Mutex::new(Some(worker)) }
    }

    fn enqueue<T>(&self, build: impl FnOnce(oneshot::Sender<McpForgeResult<T>>) -> Operation) -> oneshot::Receiver<McpForgeResult<T>>
    where
        T: Send + 'static,
    {
        let (respond_to, response) = oneshot::channel();
        if self.shutdown_flag.load(Ordering::SeqCst) {
            let _ = respond_to.send(Err(McpForgeError::ShuttingDown));
            return response;
        }
        let op = build(respond_to);
        if let Err(tokio::sync::mpsc::error::SendError(op)) = self.tx.send(op) {
            send_shutdown_response(op);
        }
        response
    }

    /// Enqueue a tool invocation. Returns immediately; the result arrives on
    /// the returned receiver once the worker reaches it in FIFO order.
    pub fn submit(&self, tool_name: String, arguments: Map<String, Value>) -> oneshot::Receiver<McpForgeResult<ToolOutcome>> {
        self.enqueue(|respond_to| Operation::CallTool { tool_name, arguments, respond_to })
    }

    /// Enqueue a resource listing.
    pub fn list_resources(&self) -> oneshot::Receiver<McpForgeResult<Vec<ResourceDescriptor>>> {
        self.enqueue(|respond_to| Operation::ListResources { respond_to })
    }

    /// Enqueue a resource read.
    pub fn read_resource(&self, uri: String) -> oneshot::Receiver<McpForgeResult<Vec<ResourceContent>>> {
        self.enqueue(|respond_to| Operation::ReadResource { uri, respond_to })
    }

    /// Enqueue a prompt listing.
    pub fn list_prompts(&self) -> oneshot::Receiver<McpForgeResult<Vec<PromptDescriptor>>> {
        self.enqueue(|respond_to| Operation::ListPrompts { respond_to })
    }

    /// Enqueue a rendered-prompt fetch; returns `(role, text)` pairs.
    pub fn get_prompt(
        &self,
        name: String,
        arguments: Option<Map<String, Value>>,
    ) -> oneshot::Receiver<McpForgeResult<Vec<(String, String)>>> {
        self.enqueue(|respond_to| Operation::GetPrompt { name, arguments, respond_to })
    }

    /// Signal shutdown and await the worker. Anything still queued completes
    /// with `ShuttingDown`; any in-flight RPC is awaited, not aborted (§5).
    pub async fn shutdown(&self) {
        if let Some(tx) = self.shutdown_tx.lock().await.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.worker.lock().await.take() {
            let _ = handle.await;
        }
    }
}

fn send_shutdown_response(op: Operation) {
    match op {
        Operation::CallTool { respond_to, .. } => { let _ = respond_to.send(Err(McpForgeError::ShuttingDown)); },
        Operation::ListResources { respond_to } => { let _ = respond_to.send(Err(McpForgeError::ShuttingDown)); },
        Operation::ReadResource { respond_to, .. } => { let _ = respond_to.send(Err(McpForgeError::ShuttingDown)); },
        Operation::ListPrompts { respond_to } => { let _ = respond_to.send(Err(McpForgeError::ShuttingDown)); },
        Operation::GetPrompt { respond_to, .. } => { let _ = respond_to.send(Err(McpForgeError::ShuttingDown)); },
    }
}

async fn worker_loop(
    service: RunningService<RoleClient, McpClientHandler>,
    mut rx: tokio::sync::mpsc::UnboundedReceiver<Operation>,
    mut shutdown_rx: oneshot::Receiver<()>,
    timeout: Duration,
    server_name: String,
    flag: Arc<AtomicBool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => {
                flag.store(true, Ordering::SeqCst);
                rx.close();
                while let Ok(op) = rx.try_recv() {
                    send_shutdown_response(op);
                }
                break;
            }
            maybe_op = rx.recv() => {
                let Some(op) = maybe_op else { break };
                run_operation(&service, &server_name, timeout, op).await;
            }
        }
    }
    debug!(server = %server_name, "request queue worker exiting");
    let _ = service.cancel().await;
}

async fn run_operation(service: &RunningService<RoleClient, McpClientHandler>, server_name: &str, timeout: Duration, op: Operation) {
    match op {
        Operation::CallTool { tool_name, arguments, respond_to } => {
            let outcome = call_tool(service, server_name, tool_name, arguments, timeout).await;
            let _ = respond_to.send(outcome);
        },
        Operation::ListResources { respond_to } => {
            let result = with_timeout(timeout, server_name, service.list_all_resources())
                .await
                .map(|resources| resources.iter().map(|r| resource_descriptor_from_rmcp(r, server_name)).collect());
            let _ = respond_to.send(result);
        },
        Operation::ReadResource { uri, respond_to } => {
            let params = ReadResourceRequestParams { meta: None, uri };
            let result = with_timeout(timeout, server_name, service.read_resource(params))
                .await
                .map(|res| res.contents.iter().map(resource_content_from_rmcp).collect());
            let _ = respond_to.send(result);
        },
        Operation::ListPrompts { respond_to } => {
            let result = with_timeout(timeout, server_name, service.list_all_prompts())
                .await
                .map(|prompts| prompts.iter().map(|p| prompt_descriptor_from_rmcp(p, server_name)).collect());
            let _ = respond_to.send(result);
        },
        Operation::GetPrompt { name, arguments, respond_to } => {
            let params = GetPromptRequestParams { meta: None, name, arguments };
            let result = with_timeout(timeout, server_name, service.get_prompt(params)).await.map(|res| prompt_content_from_rmcp(&res));
            let _ = respond_to.send(result);
        },
    }
}

async fn with_timeout<T, E: std::fmt::Display>(
    timeout: Duration,
    server_name: &str,
    fut: impl std::future::Future<Output = Result<T, E>>,
) -> McpForgeResult<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(McpForgeError::TransportError { name: server_name.to_string(), reason: e.to_string() }),
        Err(_elapsed) => Err(McpForgeError::TimeoutError {
            name: server_name.to_string(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

async fn call_tool(
    service: &RunningService<RoleClient, McpClientHandler>,
    server_name: &str,
    tool_name: String,
    arguments: Map<String, Value>,
    timeout: Duration,
) -> McpForgeResult<ToolOutcome> {
    let params = CallToolRequestParams {
        meta: None,
        name: std::borrow::Cow::Owned(tool_name.clone()),
        arguments: if arguments.is_empty() { None } else { Some(arguments) },
        task: None,
    };

    match with_timeout(timeout, server_name, service.call_tool(params)).await {
        Ok(result) => Ok(tool_outcome_from_rmcp(result)),
        Err(e) => {
            warn!(server = %server_name, tool = %tool_name, error = %e, "tool call failed");
            Err(e)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn submit_after_shutdown_fails_fast() {
        // A queue whose worker has already observed shutdown rejects new
        // submissions without touching the (by then, closed) connection.
        let flag = Arc::new(AtomicBool::new(true));
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel::<Operation>();
        let queue = RequestQueue { tx, shutdown_tx: Mutex::new(None), shutdown_flag: flag, worker: Mutex::new(None) };

        let response = queue.submit("anything".to_string(), Map::new());
        let result = response.await.unwrap();
        assert!(matches!(result, Err(McpForgeError::ShuttingDown)));
    }
}
