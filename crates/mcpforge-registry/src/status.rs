//! Server status snapshots (supplemental feature #4).
//!
//! Hosts that want to render a connection panel need a point-in-time view
//! of the registry without holding any of its internal locks across an
//! await point; [`ServerStatus`] is that view.

use mcpforge_core::ToolDescriptor;

/// A snapshot of one registered server at the moment it was taken.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerStatus {
    /// Server name.
    pub name: String,
    /// Whether the transport is currently live.
    pub connected: bool,
    /// Milliseconds remaining before another connect attempt is allowed, if
    /// the cooldown gate (§4.4, P7) is currently closed.
    pub cooldown_remaining_ms: Option<u64>,
    /// Tools discovered at the last successful handshake.
    pub tools: Vec<ToolDescriptor>,
}

impl ServerStatus {
    /// A snapshot for a server that has never been connected and carries no
    /// tool list.
    #[must_use]
    pub fn unconnected(name: impl Into<String>) -> Self {
        Self { name: name.into(), connected: false, cooldown_remaining_ms: None, tools: Vec::new() }
    }
}
