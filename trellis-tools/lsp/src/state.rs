//! Server State and the State Actor
//!
//! All mutation of [`ServerState`] happens on one task that consumes events
//! in the order they were posted. Each applied event produces a new state
//! value which is published as a whole; readers clone an `Arc` out of the
//! publish cell and never observe a partially applied change.
//!
//! ```text
//! post(event) ──► mpsc ──► actor task ──► watch cell ──► current_state()
//!                              │  ▲
//!             reload request   ▼  │  model ready
//!                          ReloadScheduler
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tower_lsp::lsp_types::ClientCapabilities;
use tracing::{debug, trace};
use trellis_model::{ProjectLoader, ProjectModel, SolutionModel};

use crate::config::Settings;
use crate::error::{ServerError, ServerResult};
use crate::reload::{ReloadObserver, ReloadScheduler};

/// Everything a request can read.
#[derive(Debug, Clone)]
pub struct ServerState {
    pub settings: Settings,
    /// Set once `initialize` has been processed.
    pub client_capabilities: Option<ClientCapabilities>,
    pub root_path: Option<PathBuf>,
    /// The current project model; empty until the first successful load.
    pub model: Arc<dyn ProjectModel>,
    /// Incremented by one for every published state.
    pub revision: u64,
}

impl ServerState {
    /// Creates the initial state with an empty model.
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            client_capabilities: None,
            root_path: None,
            model: Arc::new(SolutionModel::empty()),
            revision: 0,
        }
    }

    fn next(&self) -> Self {
        Self {
            revision: self.revision + 1,
            ..self.clone()
        }
    }
}

/// A state transition requested from outside the actor.
#[derive(Debug, Clone)]
pub enum StateEvent {
    ClientCapabilityChange(ClientCapabilities),
    RootPathChange(PathBuf),
    SettingsChange(Settings),
    /// Ask for a model rebuild once `delay` passes without another request.
    SolutionReloadRequest(Duration),
}

pub(crate) enum Message {
    Event(StateEvent),
    ModelReady(Arc<dyn ProjectModel>),
    Sync(oneshot::Sender<()>),
}

/// Applies a non-reload event to `current`.
///
/// Only the field named by the event changes; everything else carries over.
fn apply(current: &ServerState, event: StateEvent) -> Option<ServerState> {
    let mut next = current.next();
    match event {
        StateEvent::ClientCapabilityChange(capabilities) => {
            next.client_capabilities = Some(capabilities);
        }
        StateEvent::RootPathChange(path) => next.root_path = Some(path),
        StateEvent::SettingsChange(settings) => next.settings = settings,
        StateEvent::SolutionReloadRequest(_) => return None,
    }
    Some(next)
}

/// Handle to a running state actor. Cheap to clone.
///
/// The actor stops once every handle has been dropped.
#[derive(Clone)]
pub struct StateHandle {
    tx: mpsc::UnboundedSender<Message>,
    state: watch::Receiver<Arc<ServerState>>,
}

impl std::fmt::Debug for StateHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateHandle")
            .field("revision", &self.state.borrow().revision)
            .finish()
    }
}

impl StateHandle {
    /// Enqueues an event. Never blocks; the caller is not told when it lands.
    pub fn post(&self, event: StateEvent) {
        trace!("post {:?}", event);
        if self.tx.send(Message::Event(event)).is_err() {
            debug!("state actor stopped, event dropped");
        }
    }

    /// Returns the latest published state.
    pub fn current_state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state.borrow())
    }

    /// Waits until every event posted before this call has been applied.
    pub async fn sync(&self) -> ServerResult<()> {
        let (done, applied) = oneshot::channel();
        self.tx
            .send(Message::Sync(done))
            .map_err(|_| ServerError::ActorStopped)?;
        applied.await.map_err(|_| ServerError::ActorStopped)
    }
}

/// The link a reload worker keeps back into the actor.
///
/// Holds a weak sender so a pending reload never keeps the actor alive.
#[derive(Clone)]
pub(crate) struct StateLink {
    tx: mpsc::WeakUnboundedSender<Message>,
    state: watch::Receiver<Arc<ServerState>>,
}

impl StateLink {
    pub(crate) fn current_state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state.borrow())
    }

    /// Hands a freshly built model to the actor. Returns false if it stopped.
    pub(crate) fn model_ready(&self, model: Arc<dyn ProjectModel>) -> bool {
        match self.tx.upgrade() {
            Some(tx) => tx.send(Message::ModelReady(model)).is_ok(),
            None => false,
        }
    }
}

/// Spawns the actor that owns [`ServerState`].
pub struct StateActor;

impl StateActor {
    /// Starts the actor and its reload scheduler on the current runtime.
    pub fn spawn(
        initial: ServerState,
        loader: Arc<dyn ProjectLoader>,
        observer: Option<Arc<dyn ReloadObserver>>,
    ) -> StateHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let (publisher, state) = watch::channel(Arc::new(initial));

        let link = StateLink {
            tx: tx.downgrade(),
            state: state.clone(),
        };
        let reloads = ReloadScheduler::spawn(loader, link, observer);

        tokio::spawn(run(rx, publisher, reloads));

        StateHandle { tx, state }
    }
}

async fn run(
    mut rx: mpsc::UnboundedReceiver<Message>,
    publisher: watch::Sender<Arc<ServerState>>,
    reloads: ReloadScheduler,
) {
    while let Some(message) = rx.recv().await {
        match message {
            Message::Event(StateEvent::SolutionReloadRequest(delay)) => {
                reloads.request(delay);
            }
            Message::Event(event) => {
                let current = Arc::clone(&publisher.borrow());
                if let Some(next) = apply(&current, event) {
                    trace!("publishing revision {}", next.revision);
                    publisher.send_replace(Arc::new(next));
                }
            }
            Message::ModelReady(model) => {
                let current = Arc::clone(&publisher.borrow());
                let mut next = current.next();
                next.model = model;
                debug!("model replaced at revision {}", next.revision);
                publisher.send_replace(Arc::new(next));
            }
            Message::Sync(done) => {
                let _ = done.send(());
            }
        }
    }

    debug!(
        "state actor stopped at revision {}",
        publisher.borrow().revision
    );
}
