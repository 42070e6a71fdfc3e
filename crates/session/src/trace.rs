//! Replays recorded verifier runs as a [`VerifierService`].
//!
//! The trace file named by a request's file identity is re-read on every request, so a
//! changed trace shows up after the next reload.

use crate::config::TraceServiceConfig;
use crate::error::{Result, SessionError};
use crate::service::VerifierService;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use stepper_protocol::{
    BracketLevel, ElabLevel, FetchRequest, FetchResponse, ProofStep, SessionMetadata, StepRecord,
    StepState, StreamKind, UnifyStep,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trace {
    #[serde(default)]
    pub declarations: Vec<TraceDeclaration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceDeclaration {
    pub decl_kind: String,
    #[serde(default)]
    pub decl_num: u32,
    pub decl_ident: String,
    #[serde(default)]
    pub styled_decl_ident: Option<String>,
    #[serde(default)]
    pub vars: String,
    #[serde(default)]
    pub renderings: Vec<TraceRendering>,
}

/// The steps of one declaration as rendered at one (elaboration, bracket) setting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceRendering {
    #[serde(default)]
    pub elab_level: ElabLevel,
    #[serde(default)]
    pub bracket_level: BracketLevel,
    #[serde(default)]
    pub proof: Vec<ProofStep>,
    #[serde(default)]
    pub unify: Vec<UnifyStep>,
    #[serde(default)]
    pub proof_table: String,
    #[serde(default)]
    pub unify_table: String,
}

impl TraceDeclaration {
    fn styled_identifier(&self) -> String {
        if let Some(styled) = &self.styled_decl_ident {
            return styled.clone();
        }
        let class = match self.decl_kind.as_str() {
            "theorem" => "thm",
            "axiom" => "ax",
            "def" => "def",
            _ => "term",
        };
        format!(
            "{} <span class=\"{class}\">{}</span>",
            self.decl_kind, self.decl_ident
        )
    }

    /// Exact level match, otherwise the first recorded rendering.
    fn rendering(&self, elab: ElabLevel, bracket: BracketLevel) -> Option<&TraceRendering> {
        self.renderings
            .iter()
            .find(|r| r.elab_level == elab && r.bracket_level == bracket)
            .or_else(|| self.renderings.first())
    }
}

impl Trace {
    /// Answer `request` the way the verifier does: the records within `window` steps of
    /// the target, the listing only when asked for, totals as the last step number.
    pub fn respond(&self, request: &FetchRequest, window: usize) -> FetchResponse {
        let Some(decl) = self
            .declarations
            .iter()
            .find(|d| d.decl_ident == request.decl_identifier)
        else {
            return error_response(
                request,
                format!("no declaration named {}", request.decl_identifier),
            );
        };
        let Some(rendering) = decl.rendering(request.elab_level, request.bracket_level) else {
            return error_response(
                request,
                format!("no recorded steps for {}", decl.decl_ident),
            );
        };

        let metadata = SessionMetadata {
            decl_kind: decl.decl_kind.clone(),
            decl_number: decl.decl_num,
            decl_identifier: decl.decl_ident.clone(),
            styled_identifier: decl.styled_identifier(),
            total_proof_steps: last_step(rendering.proof.iter().map(|s| &s.state)),
            total_unify_steps: last_step(rendering.unify.iter().map(|s| &s.state)),
            vars_rendering: decl.vars.clone(),
        };

        let low = request.step_number.saturating_sub(window);
        let high = request.step_number.saturating_add(window);
        let in_window = |n: usize| (low..high).contains(&n);
        let (records, table): (Vec<StepRecord>, &str) = match request.stream {
            StreamKind::Proof => (
                rendering
                    .proof
                    .iter()
                    .filter(|s| in_window(s.state.step_number))
                    .cloned()
                    .map(StepRecord::Proof)
                    .collect(),
                rendering.proof_table.as_str(),
            ),
            StreamKind::Unify => (
                rendering
                    .unify
                    .iter()
                    .filter(|s| in_window(s.state.step_number))
                    .cloned()
                    .map(StepRecord::Unify)
                    .collect(),
                rendering.unify_table.as_str(),
            ),
        };

        FetchResponse {
            metadata,
            records,
            table: request.need_table.then(|| table.to_string()),
            error: None,
        }
    }
}

/// Highest step number in a stream, 0 when it is empty.
fn last_step<'a>(states: impl Iterator<Item = &'a StepState>) -> usize {
    states.map(|s| s.step_number).max().unwrap_or(0)
}

fn error_response(request: &FetchRequest, message: String) -> FetchResponse {
    FetchResponse {
        metadata: SessionMetadata::loading(request.decl_identifier.clone()),
        records: Vec::new(),
        table: None,
        error: Some(message),
    }
}

/// Serves requests from the trace file named by each request's file identity.
#[derive(Debug, Clone, Default)]
pub struct TraceService {
    config: TraceServiceConfig,
}

impl TraceService {
    pub fn new(config: TraceServiceConfig) -> Self {
        Self { config }
    }
}

/// Accepts plain paths as well as `file://` URIs.
pub fn trace_path(file_identity: &str) -> PathBuf {
    PathBuf::from(file_identity.strip_prefix("file://").unwrap_or(file_identity))
}

#[async_trait]
impl VerifierService for TraceService {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        let path = trace_path(&request.file_identity);
        let bytes = tokio::fs::read(&path).await.map_err(|err| {
            SessionError::NoService(format!("cannot read trace {}: {err}", path.display()))
        })?;
        let trace: Trace = serde_json::from_slice(&bytes).map_err(|err| {
            SessionError::ServiceError(format!("invalid trace {}: {err}", path.display()))
        })?;
        Ok(trace.respond(request, self.config.window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn state(num: usize, mode: &str) -> StepState {
        StepState {
            step_number: num,
            mode: mode.to_string(),
            stack: String::new(),
            heap: String::new(),
            unify_stack: String::new(),
            unify_heap: String::new(),
            hyp_stack: String::new(),
            next_command: format!("ProofCmd::Ref({num})"),
        }
    }

    fn declaration(proof_steps: usize, mode: &str, elab: u8) -> TraceDeclaration {
        TraceDeclaration {
            decl_kind: "theorem".to_string(),
            decl_num: 3,
            decl_ident: "foo".to_string(),
            styled_decl_ident: None,
            vars: String::new(),
            renderings: vec![TraceRendering {
                elab_level: ElabLevel::try_from(elab).unwrap(),
                bracket_level: BracketLevel::default(),
                proof: (0..proof_steps)
                    .map(|n| ProofStep {
                        state: state(n, mode),
                        subunify: None,
                    })
                    .collect(),
                unify: Vec::new(),
                proof_table: "<tr>proof</tr>".to_string(),
                unify_table: "<tr>unify</tr>".to_string(),
            }],
        }
    }

    fn request(step_number: usize, need_table: bool) -> FetchRequest {
        FetchRequest {
            file_identity: "trace.json".to_string(),
            decl_identifier: "foo".to_string(),
            elab_level: ElabLevel::default(),
            bracket_level: BracketLevel::default(),
            stream: StreamKind::Proof,
            step_number,
            need_table,
        }
    }

    #[test]
    fn batch_covers_the_window_around_the_target() {
        let trace = Trace {
            declarations: vec![declaration(200, "Normal", 2)],
        };
        let response = trace.respond(&request(120, false), 50);

        let numbers: Vec<usize> = response.records.iter().map(|r| r.step_number()).collect();
        assert_eq!(numbers.first(), Some(&70));
        assert_eq!(numbers.last(), Some(&169));
        assert_eq!(response.metadata.total_proof_steps, 199);
        assert_eq!(response.metadata.total_unify_steps, 0);
        assert!(response.table.is_none());
    }

    #[test]
    fn totals_are_the_last_step_number() {
        let mut decl = declaration(0, "Normal", 2);
        decl.renderings[0].proof = (100..=150)
            .map(|n| ProofStep {
                state: state(n, "Normal"),
                subunify: None,
            })
            .collect();
        let trace = Trace {
            declarations: vec![decl],
        };

        let response = trace.respond(&request(120, false), 50);
        assert_eq!(response.metadata.total_proof_steps, 150);
        assert_eq!(response.metadata.total_unify_steps, 0);
        assert_eq!(response.records.len(), 51);
        assert_eq!(response.records.last().map(|r| r.step_number()), Some(150));
    }

    #[test]
    fn table_is_sent_only_when_requested() {
        let trace = Trace {
            declarations: vec![declaration(3, "Normal", 2)],
        };
        let response = trace.respond(&request(0, true), 50);
        assert_eq!(response.table.as_deref(), Some("<tr>proof</tr>"));
        assert_eq!(
            response.metadata.styled_identifier,
            "theorem <span class=\"thm\">foo</span>"
        );
    }

    #[test]
    fn unknown_declaration_is_reported_in_the_error_field() {
        let trace = Trace::default();
        let response = trace.respond(&request(0, true), 50);
        assert_eq!(response.error_message(), Some("no declaration named foo"));
        assert!(response.records.is_empty());
    }

    #[test]
    fn matching_rendering_is_preferred() {
        let mut decl = declaration(2, "level2", 2);
        decl.renderings.extend(declaration(2, "level0", 0).renderings);
        let trace = Trace {
            declarations: vec![decl],
        };

        let mut req = request(0, false);
        req.elab_level = ElabLevel::try_from(0).unwrap();
        let response = trace.respond(&req, 50);
        assert_eq!(response.records[0].state().mode, "level0");

        req.elab_level = ElabLevel::try_from(1).unwrap();
        let response = trace.respond(&req, 50);
        assert_eq!(response.records[0].state().mode, "level2");
    }

    #[tokio::test]
    async fn service_reads_the_trace_named_by_the_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.json");
        let trace = Trace {
            declarations: vec![declaration(4, "Normal", 2)],
        };
        std::fs::write(&path, serde_json::to_vec(&trace).unwrap()).unwrap();

        let mut req = request(2, true);
        req.file_identity = format!("file://{}", path.display());
        let response = TraceService::default().fetch(&req).await.unwrap();
        assert_eq!(response.records.len(), 4);
        assert_eq!(response.metadata.total_proof_steps, 3);
    }

    #[tokio::test]
    async fn missing_trace_means_no_service() {
        let mut req = request(0, true);
        req.file_identity = "/definitely/not/here.json".to_string();
        let err = TraceService::default().fetch(&req).await.unwrap_err();
        assert!(matches!(err, SessionError::NoService(_)));
    }
}
