//! Command Binding Layer (C7, §4.7).
//!
//! Registers one textual command per connected `(server, tool)` pair,
//! parses its trailing argument string in one of three styles, validates
//! against the tool's `required` list, and offloads execution so the
//! command surface never blocks on RPC.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod dispatch;
mod parse;
mod spec;
mod tokenize;

pub use dispatch::{BackgroundExecutor, CommandBindings, CommandHost, OutputSink, invoke, suggest};
pub use parse::{ParamSpec, coerce, missing_required, param_specs, parse_arguments, usage_string};
pub use spec::CommandSpec;
pub use tokenize::{tokenize, top_level_eq, unquote};
