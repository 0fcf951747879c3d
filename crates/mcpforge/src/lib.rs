//! Facade crate wiring C1-C10 into a single embeddable runtime.
//!
//! This crate is the "host-embedded runtime" named in `spec.md` §1: it owns
//! no UI and no LLM wire format of its own, only the composition of the
//! other `mcpforge-*` crates into the object a host (a GUI, a CLI, a test
//! harness) actually constructs. See [`McpForge`] for the entry point and
//! `src/main.rs` for a minimal host that drives it from stdin, the way
//! §6's command surface describes.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod app;

pub use app::{GEMINI_COMMAND_COOLDOWN, McpForge};

/// Re-exports covering the whole public surface, for hosts that want a
/// single `use mcpforge::prelude::*;`.
pub mod prelude {
    pub use crate::{GEMINI_COMMAND_COOLDOWN, McpForge};
    pub use mcpforge_command::{BackgroundExecutor, CommandBindings, CommandHost, CommandSpec, invoke, suggest};
    pub use mcpforge_config::{ConfigBlob, LlmConfig, ModelId, RestartPolicy, ServerConfig, Transport};
    pub use mcpforge_core::{Content, McpForgeError, McpForgeResult, ToolDescriptor, ToolOutcome};
    pub use mcpforge_llm::{GeminiBackendFactory, LlmBackend, LlmBackendFactory, LlmClientManager, SchemaBridge, ToolCallInfo, ToolLoopResult};
    pub use mcpforge_registry::{DispatchHost, InlineDispatch, RegistrationListener, ServerRegistry, ServerStatus};
    pub use mcpforge_script::{Callable, ScriptBindings, ScriptHost};
    pub use mcpforge_transport::Connection;
}
