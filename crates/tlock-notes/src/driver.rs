//! Command loop around `NoteManager`.
//!
//! The UI side holds a `DriverHandle` and sends `Command`s; the driver owns
//! the manager, re-evaluates on every tick and after every command, and hands
//! the resulting views to a `Render` sink. Create and reveal run as spawned
//! tasks so ticks keep firing while key derivation is in progress.

use std::sync::Arc;
use std::time::Duration;

use tlock_core::{Note, NoteId, NoteView, TlockError, TlockResult};
use tlock_crypto::TimeLock;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::manager::NoteManager;
use crate::store::NoteStore;

/// Commands consumed by the driver.
#[derive(Debug)]
pub enum Command {
    Create {
        text: String,
        unlock_time_ms: i64,
        reply: oneshot::Sender<TlockResult<Note>>,
    },
    /// Caller must have obtained user confirmation first.
    Reveal {
        id: NoteId,
        reply: oneshot::Sender<TlockResult<Note>>,
    },
    /// Re-evaluate and render now, outside the regular cadence.
    Tick,
}

/// Receives the classified notes after every evaluation pass.
pub trait Render: Send {
    fn render(&mut self, views: &[NoteView]);
}

impl<F> Render for F
where
    F: FnMut(&[NoteView]) + Send,
{
    fn render(&mut self, views: &[NoteView]) {
        self(views)
    }
}

/// Sending side of the driver's command channel.
#[derive(Debug, Clone)]
pub struct DriverHandle {
    tx: mpsc::Sender<Command>,
}

impl DriverHandle {
    /// A handle plus the receiver to pass to `run_driver`.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Command>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub async fn create(&self, text: impl Into<String>, unlock_time_ms: i64) -> TlockResult<Note> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Create {
            text: text.into(),
            unlock_time_ms,
            reply,
        })
        .await?;
        rx.await.map_err(|_| driver_gone())?
    }

    pub async fn reveal(&self, id: NoteId) -> TlockResult<Note> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Reveal { id, reply }).await?;
        rx.await.map_err(|_| driver_gone())?
    }

    pub async fn tick(&self) -> TlockResult<()> {
        self.send(Command::Tick).await
    }

    async fn send(&self, cmd: Command) -> TlockResult<()> {
        self.tx.send(cmd).await.map_err(|_| driver_gone())
    }
}

fn driver_gone() -> TlockError {
    TlockError::Other(anyhow::anyhow!("note driver has stopped"))
}

/// Run until `cancel` fires or every handle is dropped.
///
/// Renders once immediately, then every `tick`. In-flight commands are
/// allowed to finish before returning so no reveal is lost half way.
pub async fn run_driver<S, C, K, R>(
    manager: Arc<NoteManager<S, C>>,
    clock: K,
    mut commands: mpsc::Receiver<Command>,
    mut renderer: R,
    tick: Duration,
    cancel: CancellationToken,
) where
    S: NoteStore + 'static,
    C: TimeLock + 'static,
    K: Clock + Clone + 'static,
    R: Render,
{
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut inflight: JoinSet<()> = JoinSet::new();

    info!(tick_ms = tick.as_millis() as u64, "note driver started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("note driver cancelled");
                break;
            }
            _ = interval.tick() => {}
            Some(joined) = inflight.join_next(), if !inflight.is_empty() => {
                if let Err(e) = joined {
                    warn!(error = %e, "note command task failed");
                }
            }
            cmd = commands.recv() => match cmd {
                None => {
                    debug!("all driver handles dropped");
                    break;
                }
                Some(Command::Tick) => {}
                Some(cmd) => {
                    spawn_command(&mut inflight, Arc::clone(&manager), clock.clone(), cmd);
                    continue;
                }
            },
        }

        let views = manager.evaluate(clock.now_ms()).await;
        renderer.render(&views);
    }

    while let Some(joined) = inflight.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "note command task failed during shutdown");
        }
    }
}

fn spawn_command<S, C, K>(
    inflight: &mut JoinSet<()>,
    manager: Arc<NoteManager<S, C>>,
    clock: K,
    cmd: Command,
) where
    S: NoteStore + 'static,
    C: TimeLock + 'static,
    K: Clock + 'static,
{
    inflight.spawn(async move {
        match cmd {
            Command::Create {
                text,
                unlock_time_ms,
                reply,
            } => {
                let result = manager
                    .create_note(&text, unlock_time_ms, clock.now_ms())
                    .await;
                let _ = reply.send(result);
            }
            Command::Reveal { id, reply } => {
                let result = manager.reveal(&id, clock.now_ms()).await;
                let _ = reply.send(result);
            }
            Command::Tick => {}
        }
    });
}
