//! Debounced Model Reloads
//!
//! Every reload request restarts a single-shot timer; the model is rebuilt
//! only after a quiet period. Rebuilds run one at a time on a dedicated
//! worker task, so requests arriving during a rebuild schedule another
//! rebuild after it instead of running alongside it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use trellis_model::{LoadTarget, ProjectLoader, ProjectModel};

use crate::error::{ServerError, ServerResult};
use crate::state::{ServerState, StateLink};

/// Result of one rebuild.
#[derive(Debug)]
pub enum ReloadOutcome {
    /// A new model was published.
    Loaded { projects: usize, elapsed: Duration },
    /// The previous model stays current.
    Failed(ServerError),
}

/// Notified after every rebuild attempt.
pub trait ReloadObserver: Send + Sync {
    /// `state` is the snapshot the rebuild was started from.
    fn reload_finished(&self, state: &ServerState, outcome: &ReloadOutcome);
}

/// Coalesces reload requests into rebuilds.
#[derive(Debug, Clone)]
pub struct ReloadScheduler {
    tx: mpsc::UnboundedSender<Duration>,
}

impl ReloadScheduler {
    pub(crate) fn spawn(
        loader: Arc<dyn ProjectLoader>,
        link: StateLink,
        observer: Option<Arc<dyn ReloadObserver>>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(worker(rx, loader, link, observer));
        Self { tx }
    }

    /// Restarts the timer to fire `delay` from now.
    pub fn request(&self, delay: Duration) {
        if self.tx.send(delay).is_err() {
            debug!("reload worker stopped, request dropped");
        }
    }
}

async fn worker(
    mut rx: mpsc::UnboundedReceiver<Duration>,
    loader: Arc<dyn ProjectLoader>,
    link: StateLink,
    observer: Option<Arc<dyn ReloadObserver>>,
) {
    while let Some(mut delay) = rx.recv().await {
        let mut coalesced = 0usize;

        // Each new request restarts the quiet period with its own delay.
        loop {
            tokio::select! {
                next = rx.recv() => match next {
                    Some(next_delay) => {
                        delay = next_delay;
                        coalesced += 1;
                    }
                    None => return,
                },
                _ = tokio::time::sleep(delay) => break,
            }
        }

        if coalesced > 0 {
            debug!("coalesced {} reload requests", coalesced + 1);
        }

        let state = link.current_state();
        let outcome = match rebuild(Arc::clone(&loader), &state).await {
            Ok((model, elapsed)) => {
                let projects = model.project_count();
                if !link.model_ready(model) {
                    return;
                }
                info!("Reloaded {} projects in {:?}", projects, elapsed);
                ReloadOutcome::Loaded { projects, elapsed }
            }
            Err(err) => {
                warn!("Reload failed, keeping previous model: {}", err);
                ReloadOutcome::Failed(err)
            }
        };

        if let Some(observer) = &observer {
            observer.reload_finished(&state, &outcome);
        }
    }
}

async fn rebuild(
    loader: Arc<dyn ProjectLoader>,
    state: &ServerState,
) -> ServerResult<(Arc<dyn ProjectModel>, Duration)> {
    let root = state.root_path.clone();
    let solution = state.settings.solution_path.clone();

    let task = tokio::task::spawn_blocking(move || {
        let start = Instant::now();
        let target = match LoadTarget::discover(root.as_deref(), solution.as_deref()) {
            Some(target) => target,
            None => {
                return Err(match root {
                    Some(root) => ServerError::NothingToLoad { root },
                    None => ServerError::NoWorkspace,
                })
            }
        };
        debug!("loading {:?}", target);
        let model = loader.load(&target)?;
        Ok((model, start.elapsed()))
    });

    match task.await {
        Ok(result) => result,
        Err(err) => Err(ServerError::LoaderPanicked(err.to_string())),
    }
}
