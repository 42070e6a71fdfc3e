use crate::error::{Result, SessionError};
use async_trait::async_trait;
use stepper_protocol::{FetchRequest, FetchResponse, SessionMetadata, StepRecord};

/// The external verifier that computes step states.
///
/// Implementations report an unreachable or unconfigured backend as
/// [`SessionError::NoService`] and explicit backend failures either as
/// [`SessionError::ServiceError`] or through [`FetchResponse::error`].
#[async_trait]
pub trait VerifierService: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse>;
}

/// Issued by `DebugSession::begin_fetch`; only the newest ticket may be completed.
#[derive(Debug, Clone)]
pub struct FetchTicket {
    pub request: FetchRequest,
    pub(crate) generation: u64,
}

impl FetchTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// A response that passed the consistency checks.
pub(crate) struct CheckedResponse {
    pub(crate) metadata: SessionMetadata,
    pub(crate) records: Vec<StepRecord>,
    pub(crate) table: Option<String>,
}

/// Rejects responses that carry an error or answer for another declaration, and reports
/// whether the requested step is part of the batch.
pub(crate) fn check_response(
    request: &FetchRequest,
    response: FetchResponse,
) -> Result<(CheckedResponse, bool)> {
    if let Some(message) = response.error_message() {
        return Err(SessionError::ServiceError(message.to_string()));
    }
    if response.metadata.decl_identifier != request.decl_identifier {
        return Err(SessionError::IdentityMismatch {
            expected: request.decl_identifier.clone(),
            actual: response.metadata.decl_identifier,
        });
    }
    let has_requested = response
        .records
        .iter()
        .any(|r| r.kind() == request.stream && r.step_number() == request.step_number);
    Ok((
        CheckedResponse {
            metadata: response.metadata,
            records: response.records,
            table: response.table,
        },
        has_requested,
    ))
}
