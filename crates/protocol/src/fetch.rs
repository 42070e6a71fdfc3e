use crate::levels::{BracketLevel, ElabLevel};
use crate::step::{StepRecord, StreamKind, HEAP_LOADING, LOADING};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Name of the language-server request that carries a [`FetchRequest`].
pub const FETCH_METHOD: &str = "$/mmbDebugger/InfoByName";

/// Identifies the declaration under debugging and the navigation bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SessionMetadata {
    pub decl_kind: String,
    #[serde(rename = "decl_num")]
    pub decl_number: u32,
    #[serde(rename = "decl_ident")]
    pub decl_identifier: String,
    #[serde(rename = "styled_decl_ident")]
    pub styled_identifier: String,
    pub total_proof_steps: usize,
    pub total_unify_steps: usize,
    #[serde(rename = "vars")]
    pub vars_rendering: String,
}

impl SessionMetadata {
    /// Metadata shown before the service has answered for `decl_identifier`.
    pub fn loading(decl_identifier: impl Into<String>) -> Self {
        Self {
            decl_kind: LOADING.to_string(),
            decl_number: 0,
            decl_identifier: decl_identifier.into(),
            styled_identifier: LOADING.to_string(),
            total_proof_steps: 0,
            total_unify_steps: 0,
            vars_rendering: HEAP_LOADING.to_string(),
        }
    }

    pub fn total_steps(&self, kind: StreamKind) -> usize {
        match kind {
            StreamKind::Proof => self.total_proof_steps,
            StreamKind::Unify => self.total_unify_steps,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FetchRequest {
    #[serde(rename = "file_uri")]
    pub file_identity: String,
    #[serde(rename = "decl_ident")]
    pub decl_identifier: String,
    pub elab_level: ElabLevel,
    pub bracket_level: BracketLevel,
    #[serde(
        rename = "unify_req",
        serialize_with = "serialize_unify_flag",
        deserialize_with = "deserialize_unify_flag"
    )]
    #[schemars(with = "bool")]
    pub stream: StreamKind,
    #[serde(rename = "stepnum")]
    pub step_number: usize,
    #[serde(rename = "table")]
    pub need_table: bool,
}

fn serialize_unify_flag<S: Serializer>(kind: &StreamKind, ser: S) -> Result<S::Ok, S::Error> {
    ser.serialize_bool(kind.is_unify())
}

fn deserialize_unify_flag<'de, D: Deserializer<'de>>(de: D) -> Result<StreamKind, D::Error> {
    bool::deserialize(de).map(StreamKind::from_unify_flag)
}

/// What the service sends back for one [`FetchRequest`].
///
/// `records` is a batch around the requested step. `table` is the listing of every step
/// in the requested stream, present when it was asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FetchResponse {
    #[serde(rename = "meta")]
    pub metadata: SessionMetadata,
    #[serde(rename = "states", default)]
    pub records: Vec<StepRecord>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl FetchResponse {
    /// The service-reported error, ignoring empty strings.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref().filter(|msg| !msg.trim().is_empty())
    }
}
