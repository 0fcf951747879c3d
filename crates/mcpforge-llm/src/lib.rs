//! LLM bridge: Schema Bridge (C8), LLM Client Manager (C9), and the
//! Execution Loop (C10) — §4.8/§4.9/§4.10.
//!
//! Translates between MCP tool schemas and an LLM's function-declaration
//! schema, caches the backend client the execution loop drives, and
//! implements the bounded, explicit multi-turn tool-calling loop described
//! in §4.10. The concrete backend ([`GeminiBackend`]) is the only part of
//! this crate that talks to a real network endpoint; everything else is
//! generic over [`LlmBackend`]/[`LlmBackendFactory`] so it can be driven by
//! a fake in tests.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod backend;
mod bridge;
mod error;
mod exec_loop;
mod manager;
mod types;

pub use backend::{GeminiBackend, GeminiBackendFactory, LlmBackend, LlmBackendFactory};
pub use bridge::{SchemaBridge, convert_schema};
pub use error::{LlmError, LlmResult};
pub use exec_loop::ExecutionLoop;
pub use manager::LlmClientManager;
pub use types::{FunctionCall, FunctionDeclaration, GenerateRequest, GenerateResponse, ModelContent, ToolCallInfo, ToolLoopResult, Turn};
