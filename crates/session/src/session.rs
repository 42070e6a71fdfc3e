use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::service::{check_response, FetchTicket, VerifierService};
use crate::stream_cache::StreamCache;
use serde::Serialize;
use std::sync::Arc;
use stepper_protocol::{
    BracketLevel, ElabLevel, FetchRequest, FetchResponse, SessionMetadata, StepRecord, StreamKind,
};

/// Everything the UI needs to redraw after a navigation.
#[derive(Debug, Clone, Serialize)]
pub struct RenderInputs {
    pub metadata: SessionMetadata,
    pub stream: StreamKind,
    pub current: Arc<StepRecord>,
    /// Step listing, present when one was fetched or the redraw forces it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<Arc<str>>,
    /// Step number the stream showed before this navigation.
    pub previous_step: usize,
    /// Whether the service was contacted.
    pub fetched: bool,
}

struct Fetched {
    record: Arc<StepRecord>,
    table: Option<Arc<str>>,
}

/// Navigation state for one declaration under debugging.
///
/// Navigation methods return `Ok(None)` when the intent is a no-op (out of range, or
/// the requested state is already in effect). Errors leave the active stream and both
/// current pointers untouched.
pub struct DebugSession {
    metadata: SessionMetadata,
    elab_level: ElabLevel,
    bracket_level: BracketLevel,
    active: StreamKind,
    proof: StreamCache,
    unify: StreamCache,
    file_identity: String,
    service: Option<Arc<dyn VerifierService>>,
    generation: u64,
}

impl DebugSession {
    pub fn new(
        decl_identifier: impl Into<String>,
        file_identity: impl Into<String>,
        config: SessionConfig,
    ) -> Self {
        Self {
            metadata: SessionMetadata::loading(decl_identifier),
            elab_level: config.elab_level,
            bracket_level: config.bracket_level,
            active: StreamKind::Proof,
            proof: StreamCache::new(StreamKind::Proof),
            unify: StreamCache::new(StreamKind::Unify),
            file_identity: file_identity.into(),
            service: None,
            generation: 0,
        }
    }

    pub fn with_service(mut self, service: Arc<dyn VerifierService>) -> Self {
        self.service = Some(service);
        self
    }

    pub fn attach_service(&mut self, service: Arc<dyn VerifierService>) {
        self.service = Some(service);
    }

    pub fn detach_service(&mut self) {
        self.service = None;
    }

    pub fn metadata(&self) -> &SessionMetadata {
        &self.metadata
    }

    pub fn decl_identifier(&self) -> &str {
        &self.metadata.decl_identifier
    }

    pub fn file_identity(&self) -> &str {
        &self.file_identity
    }

    pub fn elab_level(&self) -> ElabLevel {
        self.elab_level
    }

    pub fn bracket_level(&self) -> BracketLevel {
        self.bracket_level
    }

    pub fn active_stream(&self) -> StreamKind {
        self.active
    }

    pub fn cache(&self, kind: StreamKind) -> &StreamCache {
        match kind {
            StreamKind::Proof => &self.proof,
            StreamKind::Unify => &self.unify,
        }
    }

    fn cache_mut(&mut self, kind: StreamKind) -> &mut StreamCache {
        match kind {
            StreamKind::Proof => &mut self.proof,
            StreamKind::Unify => &mut self.unify,
        }
    }

    /// The record currently displayed for the active stream.
    pub fn current(&self) -> &Arc<StepRecord> {
        self.cache(self.active).current()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Redraw the active stream at its current step, table included.
    ///
    /// This is the first navigation of a freshly opened session.
    pub async fn show(&mut self) -> Result<RenderInputs> {
        let step = self.current().step_number();
        self.resolve(self.active, step, true).await
    }

    /// Move the active stream by `delta` steps.
    pub async fn step(&mut self, delta: isize) -> Result<Option<RenderInputs>> {
        match self.current().step_number().checked_add_signed(delta) {
            Some(target) => self.jump(target).await,
            None => Ok(None),
        }
    }

    pub async fn jump(&mut self, target: usize) -> Result<Option<RenderInputs>> {
        let total = self.metadata.total_steps(self.active);
        if target > total {
            log::debug!("Ignoring {} step {target} outside 0..={total}", self.active);
            return Ok(None);
        }
        self.resolve(self.active, target, false).await.map(Some)
    }

    /// Show `kind` where it was last left.
    pub async fn switch_stream(&mut self, kind: StreamKind) -> Result<Option<RenderInputs>> {
        if kind == self.active {
            return Ok(None);
        }
        let step = self.cache(kind).current().step_number();
        self.resolve(kind, step, true).await.map(Some)
    }

    /// Refetch everything at a new elaboration level. On failure the old level is
    /// restored; the caches stay empty.
    pub async fn change_elaboration_level(
        &mut self,
        level: ElabLevel,
    ) -> Result<Option<RenderInputs>> {
        if level == self.elab_level {
            return Ok(None);
        }
        let old = std::mem::replace(&mut self.elab_level, level);
        log::info!("Elaboration level {old} -> {level}");
        match self.refetch_active().await {
            Ok(inputs) => Ok(Some(inputs)),
            Err(err) => {
                self.elab_level = old;
                Err(err)
            }
        }
    }

    /// Toggle bracketing; same failure semantics as [`Self::change_elaboration_level`].
    pub async fn change_bracket_level(&mut self) -> Result<RenderInputs> {
        let old = self.bracket_level;
        self.bracket_level = old.toggled();
        log::info!("Bracket level {old} -> {}", self.bracket_level);
        match self.refetch_active().await {
            Ok(inputs) => Ok(inputs),
            Err(err) => {
                self.bracket_level = old;
                Err(err)
            }
        }
    }

    /// Drop everything and start the active stream over at step 0.
    ///
    /// Step totals are only revised by the metadata of this fetch, so navigation past a
    /// shrunken proof is clamped afterwards.
    pub async fn reload(&mut self) -> Result<RenderInputs> {
        log::info!(
            "Reloading {} from {}",
            self.metadata.decl_identifier,
            self.file_identity
        );
        self.invalidate();
        self.resolve(self.active, 0, true).await
    }

    /// Clear both caches and reset both current pointers. Any outstanding
    /// [`FetchTicket`] becomes stale.
    pub fn invalidate(&mut self) {
        self.proof.clear();
        self.unify.clear();
        self.generation += 1;
    }

    async fn refetch_active(&mut self) -> Result<RenderInputs> {
        let step = self.current().step_number();
        self.invalidate();
        let mut inputs = self.resolve(self.active, step, true).await?;
        inputs.previous_step = step;
        Ok(inputs)
    }

    async fn resolve(
        &mut self,
        kind: StreamKind,
        step_number: usize,
        force_table: bool,
    ) -> Result<RenderInputs> {
        let previous_step = self.cache(kind).current().step_number();
        let cache = self.cache(kind);
        if let (Some(record), true) = (cache.get(step_number), cache.has_table()) {
            log::debug!("Cache hit for {kind} step {step_number}");
            let table = if force_table {
                cache.table().cloned()
            } else {
                None
            };
            self.cache_mut(kind).set_current(record);
            self.active = kind;
            return Ok(self.render(kind, previous_step, table, false));
        }

        let service = self.service.clone().ok_or_else(|| {
            SessionError::NoService("no verification service attached".to_string())
        })?;
        let ticket = self.begin_fetch(kind, step_number);
        log::debug!(
            "Fetching {kind} step {step_number} (table: {}, generation {})",
            ticket.request.need_table,
            ticket.generation
        );
        let response = service.fetch(&ticket.request).await?;
        let fetched = self.apply_fetch(ticket, response)?;

        let table = match fetched.table {
            Some(table) => Some(table),
            None if force_table => self.cache(kind).table().cloned(),
            None => None,
        };
        self.cache_mut(kind).set_current(fetched.record);
        self.active = kind;
        Ok(self.render(kind, previous_step, table, true))
    }

    /// Prepare a request for `kind` at `step_number`. Issuing a ticket makes every
    /// earlier ticket stale.
    pub fn begin_fetch(&mut self, kind: StreamKind, step_number: usize) -> FetchTicket {
        self.generation += 1;
        FetchTicket {
            request: FetchRequest {
                file_identity: self.file_identity.clone(),
                decl_identifier: self.metadata.decl_identifier.clone(),
                elab_level: self.elab_level,
                bracket_level: self.bracket_level,
                stream: kind,
                step_number,
                need_table: !self.cache(kind).has_table(),
            },
            generation: self.generation,
        }
    }

    /// Merge a response obtained for `ticket` into the caches and metadata, returning
    /// the requested record. Does not move any current pointer.
    pub fn finish_fetch(
        &mut self,
        ticket: FetchTicket,
        response: FetchResponse,
    ) -> Result<Arc<StepRecord>> {
        self.apply_fetch(ticket, response).map(|fetched| fetched.record)
    }

    fn apply_fetch(&mut self, ticket: FetchTicket, response: FetchResponse) -> Result<Fetched> {
        if ticket.generation != self.generation {
            log::warn!(
                "Discarding response for {} step {} from generation {} (now {})",
                ticket.request.stream,
                ticket.request.step_number,
                ticket.generation,
                self.generation
            );
            return Err(SessionError::StaleResponse {
                ticket: ticket.generation,
                current: self.generation,
            });
        }

        let FetchRequest {
            stream: kind,
            step_number,
            ..
        } = ticket.request;
        let (checked, has_requested) = check_response(&ticket.request, response)?;
        let cache = self.cache_mut(kind);
        if !has_requested {
            // The batch is still valid; keep it for later hits.
            cache.fill(checked.records, None);
            return Err(SessionError::MissingRequestedStep {
                stream: kind,
                step: step_number,
            });
        }

        let fresh_table = checked.table.is_some();
        cache.fill(checked.records, checked.table);
        let record = cache
            .get(step_number)
            .ok_or(SessionError::MissingRequestedStep {
                stream: kind,
                step: step_number,
            })?;
        let table = if fresh_table {
            cache.table().cloned()
        } else {
            None
        };
        self.metadata = checked.metadata;
        Ok(Fetched { record, table })
    }

    fn render(
        &self,
        kind: StreamKind,
        previous_step: usize,
        table: Option<Arc<str>>,
        fetched: bool,
    ) -> RenderInputs {
        RenderInputs {
            metadata: self.metadata.clone(),
            stream: kind,
            current: self.cache(kind).current().clone(),
            table,
            previous_step,
            fetched,
        }
    }
}
