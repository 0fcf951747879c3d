//! Server Registry (C4) and Async Tool Cache (C5), §4.4/§4.5.
//!
//! [`ServerRegistry`] is the single owner of every configured server's
//! config and (once connected) its [`mcpforge_transport::Connection`]. It
//! fans out registration events to external listeners — the script
//! namespace and command dispatcher in their own crates — through the
//! [`events`] module rather than depending on them directly.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod cache;
mod events;
mod registry;
mod status;

pub use cache::{AsyncToolCache, CacheKey, boxed_refresh};
pub use events::{DispatchHost, InlineDispatch, RegistrationListener};
pub use registry::ServerRegistry;
pub use status::ServerStatus;
