use anyhow::Result;
use schemars::JsonSchema;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use stepper_protocol::ErrorEnvelope;
use stepper_session::{RenderInputs, SessionError};

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct CommandRequest {
    pub action: CommandAction,
    #[serde(default = "empty_payload")]
    pub payload: Value,
}

impl CommandRequest {
    pub fn new(action: CommandAction, payload: Value) -> Self {
        Self { action, payload }
    }

    pub fn bare(action: CommandAction) -> Self {
        Self::new(action, empty_payload())
    }
}

fn empty_payload() -> Value {
    Value::Object(Default::default())
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CommandAction {
    Open,
    StepForward,
    StepBack,
    Jump,
    ViewProof,
    ViewUnify,
    ElabLevel,
    BracketLevel,
    Reload,
    Show,
    Close,
}

impl CommandAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            CommandAction::Open => "open",
            CommandAction::StepForward => "step_forward",
            CommandAction::StepBack => "step_back",
            CommandAction::Jump => "jump",
            CommandAction::ViewProof => "view_proof",
            CommandAction::ViewUnify => "view_unify",
            CommandAction::ElabLevel => "elab_level",
            CommandAction::BracketLevel => "bracket_level",
            CommandAction::Reload => "reload",
            CommandAction::Show => "show",
            CommandAction::Close => "close",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OpenPayload {
    pub decl: String,
    pub file: String,
    #[serde(default)]
    pub elab_level: Option<u8>,
    #[serde(default)]
    pub bracket_level: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub struct JumpPayload {
    pub step: usize,
}

#[derive(Debug, Deserialize)]
pub struct LevelPayload {
    pub level: u8,
}

/// `data` of a navigation answer. A no-op only carries `changed: false`.
#[derive(Debug, Serialize)]
pub struct NavigationOutput {
    pub changed: bool,
    #[serde(flatten)]
    pub view: Option<RenderInputs>,
}

impl From<Option<RenderInputs>> for NavigationOutput {
    fn from(view: Option<RenderInputs>) -> Self {
        Self {
            changed: view.is_some(),
            view,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CloseOutput {
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub status: CommandStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorEnvelope>,
    #[serde(default)]
    pub data: Value,
}

impl CommandResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            status: CommandStatus::Ok,
            message: None,
            error: None,
            data,
        }
    }

    pub fn from_error(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");
        let classification = classify_error(err);
        Self {
            status: CommandStatus::Error,
            message: Some(message.clone()),
            error: Some(ErrorEnvelope {
                code: classification.code.to_string(),
                message,
                details: None,
                hint: classification.hint.map(str::to_string),
            }),
            data: Value::Null,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status, CommandStatus::Error)
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.code.as_str())
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Ok,
    Error,
}

pub const NO_SESSION_MESSAGE: &str = "No open session";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorClassification {
    pub code: &'static str,
    pub hint: Option<&'static str>,
}

pub fn classify_error(err: &anyhow::Error) -> ErrorClassification {
    if let Some(session_err) = err.downcast_ref::<SessionError>() {
        return match session_err {
            SessionError::NoService(_) => ErrorClassification {
                code: "no_service",
                hint: Some("Check that the trace file is readable, then send action=reload."),
            },
            SessionError::ServiceError(_) => ErrorClassification {
                code: "service_error",
                hint: None,
            },
            SessionError::IdentityMismatch { .. } => ErrorClassification {
                code: "identity_mismatch",
                hint: Some("The service answered for another declaration; reopen the session."),
            },
            SessionError::MissingRequestedStep { .. } => ErrorClassification {
                code: "missing_step",
                hint: None,
            },
            SessionError::StaleResponse { .. } => ErrorClassification {
                code: "stale_response",
                hint: None,
            },
            SessionError::InvalidLevel(_) => ErrorClassification {
                code: "invalid_level",
                hint: Some("Elaboration levels are 0, 1 and 2."),
            },
        };
    }
    if err.downcast_ref::<serde_json::Error>().is_some() {
        return ErrorClassification {
            code: "invalid_request",
            hint: Some("Requests look like {\"action\":\"jump\",\"payload\":{\"step\":3}}."),
        };
    }
    if format!("{err:#}").contains(NO_SESSION_MESSAGE) {
        return ErrorClassification {
            code: "no_session",
            hint: Some("Send action=open with payload.decl and payload.file first."),
        };
    }
    ErrorClassification {
        code: "internal",
        hint: None,
    }
}

pub fn parse_payload<T: DeserializeOwned>(payload: Value) -> Result<T> {
    serde_json::from_value(payload).map_err(Into::into)
}
