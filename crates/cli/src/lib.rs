//! Command front end for the proof stepper.
//!
//! Hosts talk to a [`command::CommandHandler`] through JSON
//! `{"action": ..., "payload": ...}` requests, either one at a time (`stepper show`) or
//! as a JSON-lines stream (`stepper serve`).

pub mod command;
pub mod serve;
pub mod watcher;

pub use command::{CommandAction, CommandHandler, CommandRequest, CommandResponse};
pub use serve::Intent;
pub use watcher::TraceWatcher;
