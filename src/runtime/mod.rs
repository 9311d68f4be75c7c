//! Runtime Driver
//! Cooperative event-loop glue: runs the lifecycle machine's emitted
//! invocations against the gateways and feeds the typed results back in
//! as events. Single-threaded; at most one invocation is outstanding per
//! state region, and a result for a superseded invocation is dropped by
//! the machine itself via its generation tag.

use std::rc::Rc;

use crate::gateway::{GatewayError, GistGateway, SourceGateway};
use crate::port::Auth;
use crate::record::{SourceId, SourceProvider};
use crate::source::{Command, LoadedContent, SourceDeps, SourceEvent, SourceMachine, SourceState};


pub struct SourceRuntime {
    machine: SourceMachine,
    source_gw: Box<dyn SourceGateway>,
    gist_gw: Box<dyn GistGateway>,
    auth: Rc<dyn Auth>,
    login_requests: u32,
}

impl SourceRuntime {
    /// Build the machine and drive its startup resolution to completion.
    pub async fn start(
        deps: SourceDeps,
        source_gw: Box<dyn SourceGateway>,
        gist_gw: Box<dyn GistGateway>,
    ) -> Self {
        let auth = Rc::clone(&deps.auth);
        let (machine, commands) = SourceMachine::new(deps);
        let mut runtime = Self {
            machine,
            source_gw,
            gist_gw,
            auth,
            login_requests: 0,
        };
        runtime.run_commands(commands).await;
        runtime
    }

    pub fn machine(&self) -> &SourceMachine {
        &self.machine
    }

    pub fn state(&self) -> &SourceState {
        self.machine.state()
    }

    /// How many login-required signals have been relayed to the parent
    /// container so far.
    pub fn login_requests(&self) -> u32 {
        self.login_requests
    }

    /// Feed one event through the machine and execute whatever it emits,
    /// including follow-up transitions caused by invocation results.
    pub async fn dispatch(&mut self, event: SourceEvent) {
        let commands = self.machine.handle(event);
        self.run_commands(commands).await;
    }

    async fn run_commands(&mut self, commands: Vec<Command>) {
        let mut pending = commands;
        while !pending.is_empty() {
            let mut follow_ups = Vec::new();
            for command in pending {
                if let Some(event) = self.run_command(command).await {
                    follow_ups.extend(self.machine.handle(event));
                }
            }
            pending = follow_ups;
        }
    }

    async fn run_command(&mut self, command: Command) -> Option<SourceEvent> {
        match command {
            Command::LoadContent { gen, provider, id } => {
                let result = self.load_content(provider, &id).await;
                Some(SourceEvent::LoadDone { gen, result })
            }
            Command::CreateSource { gen, text, name } => {
                let result = match self.auth.access_token() {
                    Some(token) => self.source_gw.create_source(&text, &name, &token).await,
                    None => Err(missing_token()),
                };
                Some(SourceEvent::PersistDone { gen, result })
            }
            Command::ForkSource {
                gen,
                text,
                name,
                from,
            } => {
                let result = match self.auth.access_token() {
                    Some(token) => {
                        self.source_gw
                            .fork_source(&text, &name, &from, &token)
                            .await
                    }
                    None => Err(missing_token()),
                };
                Some(SourceEvent::PersistDone { gen, result })
            }
            Command::UpdateSource { gen, id, text } => {
                let result = match self.auth.access_token() {
                    Some(token) => self.source_gw.update_source(&id, &text, &token).await,
                    None => Err(missing_token()),
                };
                Some(SourceEvent::PersistDone { gen, result })
            }
            Command::LoginRequired => {
                self.login_requests += 1;
                None
            }
        }
    }

    /// Content loading per provider. Gist loads are two steps: metadata
    /// first, then the raw file it points at.
    async fn load_content(
        &self,
        provider: SourceProvider,
        id: &SourceId,
    ) -> Result<LoadedContent, GatewayError> {
        match provider {
            SourceProvider::Registry => {
                let token = self.auth.access_token();
                let source = self.source_gw.get_source(id, token.as_deref()).await?;
                Ok(LoadedContent::Registry(source))
            }
            SourceProvider::Gist => {
                let meta = self.gist_gw.get_gist_meta(id).await?;
                let text = self.gist_gw.get_raw_file(&meta.raw_file_url).await?;
                Ok(LoadedContent::Gist { text })
            }
        }
    }
}

fn missing_token() -> GatewayError {
    // The machine only emits mutations for authenticated users; an absent
    // token here means the session expired mid-flight.
    GatewayError::Transport("missing access token".to_string())
}
