pub mod domain;

pub use domain::{
    classify_error, CommandAction, CommandRequest, CommandResponse, CommandStatus,
    ErrorClassification, NavigationOutput,
};

use anyhow::{anyhow, Context, Result};
use domain::{
    parse_payload, CloseOutput, JumpPayload, LevelPayload, OpenPayload, NO_SESSION_MESSAGE,
};
use serde_json::Value;
use std::sync::Arc;
use stepper_protocol::{BracketLevel, ElabLevel, StreamKind};
use stepper_session::{DebugSession, RenderInputs, SessionConfig, SessionError, VerifierService};

/// Dispatches JSON intents onto the one open [`DebugSession`].
pub struct CommandHandler {
    service: Arc<dyn VerifierService>,
    defaults: SessionConfig,
    session: Option<DebugSession>,
}

impl CommandHandler {
    pub fn new(service: Arc<dyn VerifierService>, defaults: SessionConfig) -> Self {
        Self {
            service,
            defaults,
            session: None,
        }
    }

    pub fn session(&self) -> Option<&DebugSession> {
        self.session.as_ref()
    }

    pub async fn execute(&mut self, request: CommandRequest) -> CommandResponse {
        let action = request.action;
        log::debug!("Handling {}", action.as_str());
        match self.route(action, request.payload).await {
            Ok(data) => CommandResponse::ok(data),
            Err(err) => {
                log::warn!("{} failed: {err:#}", action.as_str());
                CommandResponse::from_error(&err)
            }
        }
    }

    async fn route(&mut self, action: CommandAction, payload: Value) -> Result<Value> {
        match action {
            CommandAction::Open => {
                let payload: OpenPayload =
                    parse_payload(payload).context("Invalid payload for open")?;
                self.open(payload).await
            }
            CommandAction::Close => {
                let closed = self
                    .session
                    .take()
                    .map(|session| session.decl_identifier().to_string());
                Ok(serde_json::to_value(CloseOutput {
                    changed: closed.is_some(),
                    closed,
                })?)
            }
            CommandAction::StepForward => navigation(self.session_mut()?.step(1).await?),
            CommandAction::StepBack => navigation(self.session_mut()?.step(-1).await?),
            CommandAction::Jump => {
                let JumpPayload { step } =
                    parse_payload(payload).context("Invalid payload for jump")?;
                navigation(self.session_mut()?.jump(step).await?)
            }
            CommandAction::ViewProof => {
                navigation(self.session_mut()?.switch_stream(StreamKind::Proof).await?)
            }
            CommandAction::ViewUnify => {
                navigation(self.session_mut()?.switch_stream(StreamKind::Unify).await?)
            }
            CommandAction::ElabLevel => {
                let LevelPayload { level } =
                    parse_payload(payload).context("Invalid payload for elab_level")?;
                let level = ElabLevel::try_from(level).map_err(SessionError::from)?;
                let session = self.session_mut()?;
                navigation(session.change_elaboration_level(level).await?)
            }
            CommandAction::BracketLevel => {
                navigation(Some(self.session_mut()?.change_bracket_level().await?))
            }
            CommandAction::Reload => navigation(Some(self.session_mut()?.reload().await?)),
            CommandAction::Show => navigation(Some(self.session_mut()?.show().await?)),
        }
    }

    async fn open(&mut self, payload: OpenPayload) -> Result<Value> {
        let mut config = self.defaults;
        if let Some(level) = payload.elab_level {
            config.elab_level = ElabLevel::try_from(level).map_err(SessionError::from)?;
        }
        if let Some(level) = payload.bracket_level {
            config.bracket_level = BracketLevel::try_from(level).map_err(SessionError::from)?;
        }
        if let Some(previous) = &self.session {
            log::info!("Closing {} to open {}", previous.decl_identifier(), payload.decl);
        }
        log::info!("Opening {} from {}", payload.decl, payload.file);

        // A failed first fetch still leaves the session open for a later show or reload.
        let session = self.session.insert(
            DebugSession::new(payload.decl, payload.file, config)
                .with_service(self.service.clone()),
        );
        navigation(Some(session.show().await?))
    }

    fn session_mut(&mut self) -> Result<&mut DebugSession> {
        self.session
            .as_mut()
            .ok_or_else(|| anyhow!("{NO_SESSION_MESSAGE}; send action=open first"))
    }
}

fn navigation(view: Option<RenderInputs>) -> Result<Value> {
    Ok(serde_json::to_value(NavigationOutput::from(view))?)
}
