use stepper_protocol::{InvalidLevel, StreamKind};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No verification service: {0}")]
    NoService(String),

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Declaration mismatch: session debugs {expected}, service answered for {actual}")]
    IdentityMismatch { expected: String, actual: String },

    #[error("Service response did not include {stream} step {step}")]
    MissingRequestedStep { stream: StreamKind, step: usize },

    #[error("Discarded stale response (generation {ticket}, session is at {current})")]
    StaleResponse { ticket: u64, current: u64 },

    #[error(transparent)]
    InvalidLevel(#[from] InvalidLevel),
}
