use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::{self, Duration, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::{SessionConfig, TransportTarget},
    transport::{Transport, TransportError},
};

use super::{ExportError, Presenter, SessionSnapshot, SessionState, StreamingSession};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

const COMMAND_BUFFER: usize = 16;

type Reply<R> = oneshot::Sender<R>;

enum SessionCommand {
    ExportImage {
        path: PathBuf,
        reply: Reply<Result<(u32, u32), ExportError>>,
    },
    ExportData {
        path: PathBuf,
        reply: Reply<Result<usize, ExportError>>,
    },
    Snapshot {
        reply: Reply<SessionSnapshot>,
    },
}

struct LoopTiming {
    settle_delay: Duration,
    tick_interval: Duration,
    heartbeat_every_ticks: u64,
}

/// Runs a [`StreamingSession`] on its own tokio task.
///
/// Ticks, exports and snapshots are all served by that one task, so the
/// session itself needs no locking. Dropping the controller cancels the task.
pub struct SessionController {
    commands: mpsc::Sender<SessionCommand>,
    state_rx: watch::Receiver<SessionState>,
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<SessionSnapshot>>,
}

impl SessionController {
    /// Connects through `open` and starts streaming after the settle delay.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<T, P, F>(config: &SessionConfig, presenter: P, open: F) -> Self
    where
        T: Transport + Send + 'static,
        P: Presenter + Send + 'static,
        F: FnOnce(&TransportTarget) -> Result<T, TransportError> + Send + 'static,
    {
        let session = StreamingSession::new(config, presenter);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let cancel_token = CancellationToken::new();

        let timing = LoopTiming {
            settle_delay: config.settle_delay(),
            tick_interval: config.tick_interval(),
            heartbeat_every_ticks: if config.debug { 1 } else { 50 },
        };

        let handle = tokio::spawn(session_loop(
            session,
            config.transport.clone(),
            open,
            timing,
            command_rx,
            state_tx,
            cancel_token.clone(),
        ));

        Self {
            commands: command_tx,
            state_rx,
            cancel_token,
            handle: Some(handle),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Resolves once the session has stopped or failed.
    pub async fn wait_until_terminal(&self) -> Result<SessionState> {
        let mut rx = self.state_rx.clone();
        let state = rx
            .wait_for(|state| state.is_terminal())
            .await
            .context("session task exited without reporting a final state")?;
        Ok(*state)
    }

    pub async fn export_image(&self, path: &Path) -> Result<(u32, u32)> {
        let path = path.to_path_buf();
        let result = self
            .request(|reply| SessionCommand::ExportImage { path, reply })
            .await?;
        Ok(result?)
    }

    pub async fn export_data(&self, path: &Path) -> Result<usize> {
        let path = path.to_path_buf();
        let result = self
            .request(|reply| SessionCommand::ExportData { path, reply })
            .await?;
        Ok(result?)
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        self.request(|reply| SessionCommand::Snapshot { reply }).await
    }

    async fn request<R>(&self, build: impl FnOnce(Reply<R>) -> SessionCommand) -> Result<R> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(build(reply_tx))
            .await
            .map_err(|_| anyhow!("session task is not running"))?;
        reply_rx.await.context("session task dropped the request")
    }

    /// Stops the session, releases the transport and returns the final
    /// snapshot.
    pub async fn stop(&mut self) -> Result<SessionSnapshot> {
        self.cancel_token.cancel();
        let handle = self
            .handle
            .take()
            .ok_or_else(|| anyhow!("session already stopped"))?;
        handle.await.context("session task failed to join")
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn session_loop<T, P, F>(
    mut session: StreamingSession<T, P>,
    target: TransportTarget,
    open: F,
    timing: LoopTiming,
    mut commands: mpsc::Receiver<SessionCommand>,
    state_tx: watch::Sender<SessionState>,
    cancel_token: CancellationToken,
) -> SessionSnapshot
where
    T: Transport,
    P: Presenter,
    F: FnOnce(&TransportTarget) -> Result<T, TransportError>,
{
    if let Err(err) = session.connect(&target, open) {
        log_error!("Could not connect to {}: {}", target.identifier(), err);
    }
    state_tx.send_replace(session.state());

    // Instruments reset when the port opens; the first poll waits out the
    // settle delay. Commands are served throughout.
    let first_tick = time::Instant::now() + timing.settle_delay;
    let mut ticker = time::interval_at(first_tick, timing.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick(), if !session.state().is_terminal() => {
                let outcome = session.tick();
                ticks += 1;
                if ticks % timing.heartbeat_every_ticks == 0 {
                    let readings = session.history().len();
                    log_debug!("tick {}: {:?} ({} readings)", ticks, outcome, readings);
                }
                state_tx.send_if_modified(|state| {
                    let changed = *state != session.state();
                    *state = session.state();
                    changed
                });
            }
            Some(command) = commands.recv() => handle_command(&mut session, command),
            _ = cancel_token.cancelled() => {
                session.stop();
                state_tx.send_replace(session.state());
                log_info!("session loop shutting down");
                break;
            }
        }
    }

    session.snapshot()
}

fn handle_command<T: Transport, P: Presenter>(
    session: &mut StreamingSession<T, P>,
    command: SessionCommand,
) {
    // A dropped receiver only means the caller stopped waiting.
    match command {
        SessionCommand::ExportImage { path, reply } => {
            let _ = reply.send(session.export_image(&path));
        }
        SessionCommand::ExportData { path, reply } => {
            let _ = reply.send(session.export_data(&path));
        }
        SessionCommand::Snapshot { reply } => {
            let _ = reply.send(session.snapshot());
        }
    }
}
