//! Shared error kinds for the MCP integration core.
//!
//! Every boundary method in this workspace returns one of these variants (or
//! a sentinel string derived from one) rather than panicking — the core must
//! never crash its host.

use thiserror::Error;

/// Errors that can occur anywhere in the MCP integration core.
#[derive(Debug, Error)]
pub enum McpForgeError {
    /// A server config failed validation at add/update time; no mutation occurred.
    #[error("invalid server config: {0}")]
    InvalidConfig(String),

    /// A tool call or command targeted a server that is not connected.
    #[error("server not connected: {name}")]
    NotConnected {
        /// Server name.
        name: String,
    },

    /// Attempted an operation on a server that is already connected.
    #[error("server already connected: {name}")]
    AlreadyConnected {
        /// Server name.
        name: String,
    },

    /// I/O or handshake failure talking to a child process.
    #[error("transport error for {name}: {reason}")]
    TransportError {
        /// Server name.
        name: String,
        /// Underlying failure description.
        reason: String,
    },

    /// An RPC exceeded its configured timeout.
    #[error("operation timed out after {timeout_ms}ms for {name}")]
    TimeoutError {
        /// Server name.
        name: String,
        /// The timeout that was exceeded.
        timeout_ms: u64,
    },

    /// Argument parsing or coercion failed before any RPC was issued.
    #[error("argument parsing failed: {0}")]
    SchemaError(String),

    /// An LLM entry point was invoked while `isConfigured()` is false.
    #[error("LLM is not configured: {0}")]
    NotConfiguredError(String),

    /// A request was still queued when its connection's worker shut down.
    #[error("shutting down, request not completed")]
    ShuttingDown,

    /// The LLM requested a function name not present in the routing table.
    #[error("unknown function requested: {0}")]
    UnknownFunction(String),

    /// A named server was not found in the registry.
    #[error("server not found: {name}")]
    ServerNotFound {
        /// Server name.
        name: String,
    },

    /// A named tool was not found on a connected server.
    #[error("tool not found: {server}:{tool}")]
    ToolNotFound {
        /// Server name.
        server: String,
        /// Tool name.
        tool: String,
    },

    /// Reconnecting too soon after the previous attempt.
    #[error("reconnect cooldown active for {name}, {remaining_ms}ms remaining")]
    CooldownActive {
        /// Server name.
        name: String,
        /// Milliseconds left before another attempt is allowed.
        remaining_ms: u64,
    },

    /// Underlying filesystem/process I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML (de)serialization failure for the persisted config blob.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Result alias used throughout the workspace.
pub type McpForgeResult<T> = Result<T, McpForgeError>;
