//! # Stepper Session
//!
//! Cached navigation over the proof and unification streams of one declaration.
//!
//! ```text
//! intent (step / jump / switch / level / reload)
//!   │
//!   ▼
//! DebugSession ──hit──> StreamCache ──> RenderInputs
//!   │ miss
//!   ▼
//! VerifierService::fetch ──> batch + table ──> StreamCache::fill
//! ```
//!
//! A session owns two [`StreamCache`]s. A step is served locally only when both the
//! record and the stream's table are cached; anything else goes to the
//! [`VerifierService`]. Changing the elaboration or bracket level, or reloading the
//! source, clears both caches.

mod config;
mod error;
mod service;
mod session;
mod stream_cache;
mod trace;

pub use config::{SessionConfig, TraceServiceConfig, BRACKET_LEVEL_ENV, ELAB_LEVEL_ENV};
pub use error::{Result, SessionError};
pub use service::{FetchTicket, VerifierService};
pub use session::{DebugSession, RenderInputs};
pub use stream_cache::StreamCache;
pub use trace::{trace_path, Trace, TraceDeclaration, TraceRendering, TraceService};

pub use stepper_protocol as protocol;
