//! # Stepper Protocol
//!
//! Wire types exchanged between the step navigator and a verification service.
//!
//! ```text
//! FetchRequest  ──>  verification service
//!                          │
//! FetchResponse <──────────┘
//!     ├─ meta    : SessionMetadata (bounds for navigation)
//!     ├─ states  : StepRecord[] (batch around the requested step)
//!     ├─ table   : listing of every step (when requested)
//!     └─ error   : non-empty string means the call failed
//! ```

use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

mod fetch;
mod levels;
mod step;

pub use fetch::{FetchRequest, FetchResponse, SessionMetadata, FETCH_METHOD};
pub use levels::{BracketLevel, ElabLevel, InvalidLevel};
pub use step::{
    ProofStep, StepRecord, StepState, StreamKind, SubUnify, UnifyStep, HEAP_LOADING, LOADING,
    STACK_LOADING,
};

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub hint: Option<String>,
}

pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Into::into)
}
