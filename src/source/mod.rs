//! Source Lifecycle Machine
//! The single authoritative state machine for "what source is loaded, who
//! owns it, and which save/fork/create action is legal right now".
//!
//! The machine is synchronous and browser-free: platform access goes
//! through injected ports, and network work is emitted as [`Command`]s
//! that the runtime executes, feeding typed results back in as events.

use std::rc::Rc;

use crate::cache::SharedCache;
use crate::gateway::GatewayError;
use crate::notify::{NotifyHandle, Severity};
use crate::port::{
    cache_key, Auth, Capabilities, EditNotice, Router, SharedEditSink, CANONICAL_VIZ_PATH,
};
use crate::record::{Ownership, RegistrySource, SourceId, SourceProvider, SourceRecord};


/// Canned example shown when a first-time visitor asks for one.
pub const EXAMPLE_SOURCE: &str = "\
fsm TrafficLight {
    [*] -> Red
    Red --> Green : Next
    Green --> Yellow : Next
    Yellow --> Red : Next
}
";

/// Sub-states of the create/fork flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatingState {
    /// Name chooser shown; a non-empty name is required to proceed
    ChoosingName,
    /// Create-or-fork call outstanding
    Persisting,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceState {
    /// Content load invocation outstanding
    LoadingContent,
    /// Content present; ownership re-derived on every identity change
    Loaded { ownership: Ownership },
    /// Content load failed; the error has been broadcast
    LoadFailed,
    /// No provider/id resolved. `welcome_eligible` is set only on a fresh
    /// start with neither URL parameters nor a cached draft.
    NoSource { welcome_eligible: bool },
    Creating(CreatingState),
    /// Update call outstanding
    Updating,
}

/// Payload of a finished content load
#[derive(Debug, Clone)]
pub enum LoadedContent {
    Registry(RegistrySource),
    Gist { text: String },
}

/// Events fed into the machine, from the UI shell and from the runtime's
/// finished invocations
#[derive(Debug, Clone)]
pub enum SourceEvent {
    /// The editor text changed
    CodeUpdated(String),
    Save,
    /// Name chooser confirmed with the given name
    NameConfirmed(String),
    NameCanceled,
    ExampleRequested,
    /// The authenticated identity changed; ownership must be re-derived
    IdentityChanged,
    /// Externally driven rename (e.g. the header's name field)
    DesiredNameChanged(String),
    LoadDone {
        gen: u64,
        result: Result<LoadedContent, GatewayError>,
    },
    /// Result of a create, fork, or update invocation
    PersistDone {
        gen: u64,
        result: Result<RegistrySource, GatewayError>,
    },
}

/// Side effects the machine cannot perform itself. Each invocation carries
/// a generation number; a result tagged with a superseded generation is
/// dropped on arrival.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    LoadContent {
        gen: u64,
        provider: SourceProvider,
        id: SourceId,
    },
    CreateSource {
        gen: u64,
        text: String,
        name: String,
    },
    ForkSource {
        gen: u64,
        text: String,
        name: String,
        from: SourceId,
    },
    UpdateSource {
        gen: u64,
        id: SourceId,
        text: String,
    },
    /// Relay to the parent container: present an authentication prompt.
    /// Never accompanied by an error toast.
    LoginRequired,
}

/// Collaborators injected at construction
pub struct SourceDeps {
    pub router: Box<dyn Router>,
    pub cache: SharedCache,
    pub auth: Rc<dyn Auth>,
    pub notifier: NotifyHandle,
    /// Auxiliary cache-writer / leave-confirmation collaborators; dropped
    /// when the capabilities disable edit forwarding
    pub edit_sinks: Vec<SharedEditSink>,
    /// Server-rendered initial data, if any
    pub initial: Option<RegistrySource>,
    pub capabilities: Capabilities,
}

pub struct SourceMachine {
    state: SourceState,
    record: SourceRecord,
    invoke_seq: u64,
    router: Box<dyn Router>,
    cache: SharedCache,
    auth: Rc<dyn Auth>,
    notifier: NotifyHandle,
    edit_sinks: Vec<SharedEditSink>,
}

impl SourceMachine {
    /// Build the machine and resolve the initial source: legacy-URL
    /// redirect, server-supplied data, URL query parameters, cached
    /// draft, or nothing. Returns the commands the resolution produced.
    pub fn new(deps: SourceDeps) -> (Self, Vec<Command>) {
        // Embedded mode means no auxiliary collaborators at all.
        let edit_sinks = if deps.capabilities.forward_edits {
            deps.edit_sinks
        } else {
            Vec::new()
        };

        let mut machine = Self {
            state: SourceState::NoSource {
                welcome_eligible: false,
            },
            record: SourceRecord::new(),
            invoke_seq: 0,
            router: deps.router,
            cache: deps.cache,
            auth: deps.auth,
            notifier: deps.notifier,
            edit_sinks,
        };
        let commands = machine.resolve_start(deps.initial);
        (machine, commands)
    }

    pub fn state(&self) -> &SourceState {
        &self.state
    }

    pub fn record(&self) -> &SourceRecord {
        &self.record
    }

    pub fn router(&self) -> &dyn Router {
        self.router.as_ref()
    }

    /// Whether a first-run welcome prompt may be shown.
    pub fn welcome_eligible(&self) -> bool {
        matches!(
            self.state,
            SourceState::NoSource {
                welcome_eligible: true
            }
        )
    }

    /// Whether a persistence invocation is outstanding (drives the
    /// "saving" indicator).
    pub fn is_persisting(&self) -> bool {
        matches!(
            self.state,
            SourceState::Creating(CreatingState::Persisting) | SourceState::Updating
        )
    }

    // ========================================================================
    // STARTUP RESOLUTION
    // ========================================================================

    fn resolve_start(&mut self, initial: Option<RegistrySource>) -> Vec<Command> {
        let params = self.router.query_params();

        // Deprecated `?id=` on a non-canonical path: redirect client-side
        // once, unless the server already rendered the source for us.
        if self.router.is_legacy_path() && initial.is_none() {
            if let Some(id) = &params.id {
                log::info!("redirecting legacy url for source {id}");
                self.router
                    .replace_url(&format!("{CANONICAL_VIZ_PATH}?id={id}"));
            }
        }

        if let Some(source) = initial {
            log::debug!("starting from server-supplied source {}", source.id);
            self.record = SourceRecord::from_registry(&source);
            self.enter_loaded();
            return Vec::new();
        }

        if let Some(id) = params.id {
            return vec![self.begin_load(SourceProvider::Registry, SourceId::new(id))];
        }
        if let Some(gist) = params.gist {
            return vec![self.begin_load(SourceProvider::Gist, SourceId::new(gist))];
        }

        // No provider/id: fall back to a cached unsaved draft.
        let cached = self.cache.borrow().get(&cache_key(None), None);
        match cached {
            Some(text) => {
                log::debug!("restoring unsaved draft from cache");
                self.record.raw_content = text;
                self.state = SourceState::NoSource {
                    welcome_eligible: false,
                };
            }
            None => {
                self.state = SourceState::NoSource {
                    welcome_eligible: true,
                };
            }
        }
        Vec::new()
    }

    // ========================================================================
    // EVENT DISPATCH
    // ========================================================================

    /// Dispatch an event: root-level handlers first, then the active
    /// leaf state.
    pub fn handle(&mut self, event: SourceEvent) -> Vec<Command> {
        match event {
            SourceEvent::IdentityChanged => {
                if matches!(self.state, SourceState::Loaded { .. }) {
                    self.state = SourceState::Loaded {
                        ownership: self.current_ownership(),
                    };
                }
                return Vec::new();
            }
            SourceEvent::DesiredNameChanged(name) => {
                self.record.desired_name = name;
                return Vec::new();
            }
            _ => {}
        }

        match (self.state.clone(), event) {
            (
                SourceState::Loaded { .. } | SourceState::NoSource { .. },
                SourceEvent::CodeUpdated(text),
            ) => {
                self.apply_edit(text);
                Vec::new()
            }

            (SourceState::Loaded { ownership }, SourceEvent::Save) => {
                self.save_from_loaded(ownership)
            }

            (SourceState::NoSource { .. }, SourceEvent::Save) => {
                if self.auth.is_authenticated() {
                    self.state = SourceState::Creating(CreatingState::ChoosingName);
                    Vec::new()
                } else {
                    vec![Command::LoginRequired]
                }
            }

            (SourceState::NoSource { .. }, SourceEvent::ExampleRequested) => {
                self.record.raw_content = EXAMPLE_SOURCE.to_string();
                Vec::new()
            }

            (
                SourceState::Creating(CreatingState::ChoosingName),
                SourceEvent::NameConfirmed(name),
            ) => self.confirm_name(name),

            (SourceState::Creating(CreatingState::ChoosingName), SourceEvent::NameCanceled) => {
                if self.record.id.is_some() {
                    // This was a fork-in-progress.
                    self.enter_loaded();
                } else {
                    self.state = SourceState::NoSource {
                        welcome_eligible: false,
                    };
                }
                Vec::new()
            }

            (SourceState::LoadingContent, SourceEvent::LoadDone { gen, result }) => {
                self.finish_load(gen, result)
            }

            (
                SourceState::Creating(CreatingState::Persisting),
                SourceEvent::PersistDone { gen, result },
            ) => self.finish_create(gen, result),

            (SourceState::Updating, SourceEvent::PersistDone { gen, result }) => {
                self.finish_update(gen, result)
            }

            (state, event) => {
                log::debug!("ignoring {event:?} in {state:?}");
                Vec::new()
            }
        }
    }

    // ========================================================================
    // TRANSITIONS
    // ========================================================================

    fn begin_load(&mut self, provider: SourceProvider, id: SourceId) -> Command {
        self.record.id = Some(id.clone());
        self.record.provider = Some(provider);
        self.state = SourceState::LoadingContent;
        self.invoke_seq += 1;
        Command::LoadContent {
            gen: self.invoke_seq,
            provider,
            id,
        }
    }

    /// Entering the loaded state always first overlays a still-valid
    /// cached draft: the user's unsaved edits win over freshly fetched
    /// content until the server reports something newer.
    fn enter_loaded(&mut self) {
        let key = cache_key(self.record.id.as_ref());
        let known = self.record.registry.as_ref().map(|m| m.updated_at);
        let cached = self.cache.borrow().get(&key, known);
        if let Some(text) = cached {
            log::debug!("overlaying cached draft for {key}");
            self.record.raw_content = text;
        }
        self.state = SourceState::Loaded {
            ownership: self.current_ownership(),
        };
    }

    fn current_ownership(&self) -> Ownership {
        self.record
            .ownership(self.auth.current_user_id().as_deref())
    }

    fn apply_edit(&mut self, text: String) {
        self.record.raw_content = text;
        let key = cache_key(self.record.id.as_ref());
        let notice = EditNotice {
            cache_key: &key,
            text: &self.record.raw_content,
            updated_at: self.record.registry.as_ref().map(|m| m.updated_at),
        };
        for sink in &self.edit_sinks {
            sink.borrow_mut().code_updated(notice);
        }
    }

    fn save_from_loaded(&mut self, ownership: Ownership) -> Vec<Command> {
        if !self.auth.is_authenticated() {
            log::info!("save requires login");
            return vec![Command::LoginRequired];
        }
        match ownership {
            Ownership::Owner => {
                // Owned sources are saved registry entries, so an id exists.
                let Some(id) = self.record.id.clone() else {
                    return Vec::new();
                };
                self.state = SourceState::Updating;
                self.invoke_seq += 1;
                vec![Command::UpdateSource {
                    gen: self.invoke_seq,
                    id,
                    text: self.record.raw_content.clone(),
                }]
            }
            Ownership::NotOwner | Ownership::Unknown => {
                self.record.mark_forked();
                self.state = SourceState::Creating(CreatingState::ChoosingName);
                Vec::new()
            }
        }
    }

    fn confirm_name(&mut self, name: String) -> Vec<Command> {
        let name = name.trim().to_string();
        if name.is_empty() {
            log::warn!("ignoring empty machine name");
            return Vec::new();
        }
        self.record.desired_name = name.clone();
        self.state = SourceState::Creating(CreatingState::Persisting);
        self.invoke_seq += 1;
        let gen = self.invoke_seq;
        let text = self.record.raw_content.clone();

        // Fork only from a registry entry; gists and unsaved drafts are
        // fresh creations.
        match (self.record.provider, self.record.id.clone()) {
            (Some(SourceProvider::Registry), Some(from)) => vec![Command::ForkSource {
                gen,
                text,
                name,
                from,
            }],
            _ => vec![Command::CreateSource { gen, text, name }],
        }
    }

    fn finish_load(
        &mut self,
        gen: u64,
        result: Result<LoadedContent, GatewayError>,
    ) -> Vec<Command> {
        if gen != self.invoke_seq {
            log::debug!("dropping superseded load result (gen {gen})");
            return Vec::new();
        }
        match result {
            Ok(LoadedContent::Registry(source)) => {
                self.record.adopt(&source);
                self.enter_loaded();
            }
            Ok(LoadedContent::Gist { text }) => {
                self.record.raw_content = text;
                self.enter_loaded();
            }
            Err(error) => {
                self.state = SourceState::LoadFailed;
                self.notifier.broadcast(error.to_string(), Severity::Error);
                if matches!(error, GatewayError::NotFound) {
                    // Best-effort recovery: drop the dead reference from
                    // the URL without forcing a reload.
                    self.router.strip_query_params(&["id", "gist"]);
                }
            }
        }
        Vec::new()
    }

    fn finish_create(
        &mut self,
        gen: u64,
        result: Result<RegistrySource, GatewayError>,
    ) -> Vec<Command> {
        if gen != self.invoke_seq {
            log::debug!("dropping superseded create result (gen {gen})");
            return Vec::new();
        }
        match result {
            Ok(source) => {
                // The draft cached under the old identity is now obsolete.
                let stale_key = cache_key(self.record.id.as_ref());
                self.cache.borrow_mut().remove(&stale_key);

                self.record.adopt(&source);
                self.router
                    .replace_url(&format!("{CANONICAL_VIZ_PATH}?id={}", source.id));
                self.notifier
                    .broadcast(format!("Saved as \"{}\"", source.name), Severity::Success);
                self.enter_loaded();
            }
            Err(error) => {
                self.notifier
                    .broadcast(format!("Save failed: {error}"), Severity::Error);
                if self.record.id.is_some() {
                    // Failed fork: back to the loaded source.
                    self.enter_loaded();
                } else {
                    self.state = SourceState::NoSource {
                        welcome_eligible: false,
                    };
                }
            }
        }
        Vec::new()
    }

    fn finish_update(
        &mut self,
        gen: u64,
        result: Result<RegistrySource, GatewayError>,
    ) -> Vec<Command> {
        if gen != self.invoke_seq {
            log::debug!("dropping superseded update result (gen {gen})");
            return Vec::new();
        }
        match result {
            Ok(source) => {
                self.record.registry = Some(source.meta());
                self.notifier.broadcast("Saved", Severity::Success);
                self.state = SourceState::Loaded {
                    ownership: Ownership::Owner,
                };
            }
            Err(error) => {
                self.notifier
                    .broadcast(format!("Save failed: {error}"), Severity::Error);
                self.enter_loaded();
            }
        }
        Vec::new()
    }
}
