//! Config Store (C1): server configs and the LLM config, serialized to and
//! from an opaque tagged blob (§4.1).

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod blob;
mod llm_config;
mod obfuscate;
mod server_config;

pub use blob::ConfigBlob;
pub use llm_config::{LlmConfig, ModelId};
pub use obfuscate::{deobfuscate, obfuscate};
pub use server_config::{RestartPolicy, ServerConfig, Transport};
