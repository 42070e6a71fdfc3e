use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const LOADING: &str = "loading...";
pub const STACK_LOADING: &str = r#"<li class="stack_item"> loading... </li>"#;
pub const HEAP_LOADING: &str = r#"<li class="heap_item"> loading... </li>"#;

/// Which of the two step sequences a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Proof,
    Unify,
}

impl StreamKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            StreamKind::Proof => "proof",
            StreamKind::Unify => "unify",
        }
    }

    pub const fn is_unify(self) -> bool {
        matches!(self, StreamKind::Unify)
    }

    pub const fn from_unify_flag(unify: bool) -> Self {
        if unify {
            StreamKind::Unify
        } else {
            StreamKind::Proof
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verifier state shared by both kinds of step.
///
/// The rendered slices are pre-rendered markup fragments; nothing in this workspace
/// interprets them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StepState {
    #[serde(rename = "num")]
    pub step_number: usize,
    pub mode: String,
    pub stack: String,
    pub heap: String,
    #[serde(rename = "ustack")]
    pub unify_stack: String,
    #[serde(rename = "uheap")]
    pub unify_heap: String,
    #[serde(rename = "hstack")]
    pub hyp_stack: String,
    #[serde(rename = "cmd")]
    pub next_command: String,
}

impl StepState {
    pub fn loading() -> Self {
        Self {
            step_number: 0,
            mode: LOADING.to_string(),
            stack: STACK_LOADING.to_string(),
            heap: HEAP_LOADING.to_string(),
            unify_stack: STACK_LOADING.to_string(),
            unify_heap: HEAP_LOADING.to_string(),
            hyp_stack: STACK_LOADING.to_string(),
            next_command: LOADING.to_string(),
        }
    }
}

/// A unification running nested inside a proof step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SubUnify {
    pub subnum: usize,
    pub subof: usize,
    #[serde(rename = "tgt")]
    pub target: String,
    pub finish: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProofStep {
    #[serde(flatten)]
    pub state: StepState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subunify: Option<SubUnify>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UnifyStep {
    #[serde(flatten)]
    pub state: StepState,
    #[serde(rename = "tgt")]
    pub target: String,
}

/// One navigable step of either stream.
///
/// Records arrive untagged on the wire; a unify record is recognised by its top-level
/// `tgt` field, everything else is a proof record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum StepRecord {
    Unify(UnifyStep),
    Proof(ProofStep),
}

impl StepRecord {
    /// The placeholder shown for a stream before anything has been fetched.
    pub fn loading(kind: StreamKind) -> Self {
        match kind {
            StreamKind::Proof => StepRecord::Proof(ProofStep {
                state: StepState::loading(),
                subunify: None,
            }),
            StreamKind::Unify => StepRecord::Unify(UnifyStep {
                state: StepState::loading(),
                target: LOADING.to_string(),
            }),
        }
    }

    pub fn kind(&self) -> StreamKind {
        match self {
            StepRecord::Proof(_) => StreamKind::Proof,
            StepRecord::Unify(_) => StreamKind::Unify,
        }
    }

    pub fn state(&self) -> &StepState {
        match self {
            StepRecord::Proof(step) => &step.state,
            StepRecord::Unify(step) => &step.state,
        }
    }

    pub fn step_number(&self) -> usize {
        self.state().step_number
    }

    pub fn subunify(&self) -> Option<&SubUnify> {
        match self {
            StepRecord::Proof(step) => step.subunify.as_ref(),
            StepRecord::Unify(_) => None,
        }
    }

    pub fn target(&self) -> Option<&str> {
        match self {
            StepRecord::Unify(step) => Some(step.target.as_str()),
            StepRecord::Proof(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn wire_state(num: usize) -> serde_json::Value {
        json!({
            "num": num,
            "mode": "Normal",
            "stack": "<li>s</li>",
            "heap": "<li>h</li>",
            "ustack": "",
            "uheap": "",
            "hstack": "",
            "cmd": "ProofCmd::Ref(0)",
        })
    }

    #[test]
    fn proof_record_without_subunify_is_a_proof_step() {
        let record: StepRecord = serde_json::from_value(wire_state(7)).unwrap();
        assert_eq!(record.kind(), StreamKind::Proof);
        assert_eq!(record.step_number(), 7);
        assert!(record.subunify().is_none());
    }

    #[test]
    fn nested_subunify_target_does_not_make_a_unify_step() {
        let mut value = wire_state(3);
        value["subunify"] = json!({"subnum": 1, "subof": 4, "tgt": "x", "finish": "done"});
        let record: StepRecord = serde_json::from_value(value).unwrap();
        assert_eq!(record.kind(), StreamKind::Proof);
        assert_eq!(record.subunify().map(|s| s.subof), Some(4));
    }

    #[test]
    fn top_level_target_makes_a_unify_step() {
        let mut value = wire_state(2);
        value["tgt"] = json!("ph -> ps");
        let record: StepRecord = serde_json::from_value(value).unwrap();
        assert_eq!(record.kind(), StreamKind::Unify);
        assert_eq!(record.target(), Some("ph -> ps"));
    }

    #[test]
    fn loading_placeholders_sit_at_step_zero() {
        for kind in [StreamKind::Proof, StreamKind::Unify] {
            let record = StepRecord::loading(kind);
            assert_eq!(record.kind(), kind);
            assert_eq!(record.step_number(), 0);
            assert_eq!(record.state().mode, LOADING);
        }
    }
}
