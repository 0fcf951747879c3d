//! Transport Client (C2) and Per-Server Request Queue (C3), §4.2/§4.3.
//!
//! `Connection` owns an `rmcp` child-process session end to end: spawning,
//! handshake, tool discovery, and the single worker task that serializes
//! every RPC against it.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod client;
mod convert;
mod handler;
mod queue;

pub use client::{Connection, RECONNECT_COOLDOWN};
