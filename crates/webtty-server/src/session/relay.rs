//! Session relay: pairs one WebSocket with one pty process.
//!
//! Two pumps run per session. The outbound pump forwards pty output to the
//! socket as binary frames and the inbound pump writes every client frame
//! to the pty. Whichever finishes first triggers a one-shot teardown that
//! cancels the other, kills and reaps the child and drops the pty master.

use super::pty::{self, PtyProcess, PtyWriter};
use crate::server::WebttyServer;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, Stream, StreamExt};
use portable_pty::{Child, MasterPty};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use webtty_core::{join_words, CommandLine, WebttyError, WebttyResult};

/// Delay before the first startup command is written.
pub const SETTLE_DELAY: Duration = Duration::from_secs(1);
/// Pause between consecutive startup commands.
pub const COMMAND_INTERVAL: Duration = Duration::from_millis(200);

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Upgrading,
    Spawning,
    Active,
    Draining,
    Closed,
}

impl SessionState {
    fn advance(&mut self, next: SessionState) {
        debug!(from = ?self, to = ?next, "session state");
        *self = next;
    }
}

/// Run a session on an upgraded socket until either side ends.
pub async fn run(server: Arc<WebttyServer>, socket: WebSocket) {
    let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
    relay(server, socket)
        .instrument(info_span!("session", id))
        .await
}

async fn relay(server: Arc<WebttyServer>, mut socket: WebSocket) {
    let mut state = SessionState::Upgrading;
    state.advance(SessionState::Spawning);

    let Launched { process, commands } = match launch(&server).await {
        Ok(launched) => launched,
        Err(e) => {
            error!(error = %e, "failed to start session");
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::ERROR,
                    reason: "failed to start session".into(),
                })))
                .await;
            state.advance(SessionState::Closed);
            return;
        }
    };

    state.advance(SessionState::Active);
    server.session_opened();
    info!(live = server.live_sessions(), "session started");

    let PtyProcess {
        reader,
        writer,
        master,
        child,
    } = process;
    let teardown = Arc::new(Teardown::new(master, child));

    let (tx, rx) = mpsc::channel(64);
    let _reader = pty::spawn_reader(reader, tx);

    if !commands.is_empty() {
        tokio::spawn(
            inject_commands(commands, writer.clone(), teardown.cancel.clone()).in_current_span(),
        );
    }

    let (sink, stream) = socket.split();
    let (outbound, inbound) = tokio::join!(
        pump_outbound(sink, rx, teardown.clone()),
        pump_inbound(stream, writer, teardown.clone()),
    );
    for err in [outbound.err(), inbound.err()].into_iter().flatten() {
        debug!(error = %err, "pump ended with error");
    }

    state.advance(SessionState::Draining);
    teardown.close().await;
    state.advance(SessionState::Closed);
    server.session_closed();
    info!(live = server.live_sessions(), "session closed");
}

struct Launched {
    process: PtyProcess,
    /// Startup commands, already re-quoted for the shell.
    commands: Vec<String>,
}

/// Resolve the active profile into a process and spawn it.
async fn launch(server: &WebttyServer) -> WebttyResult<Launched> {
    let name = server.active_profile().await;
    let profile = server.profiles().resolve(&name)?;

    let mut command = CommandLine::login_shell();
    profile.apply_to_command(&mut command)?;
    let commands = profile
        .parse_commands()?
        .iter()
        .map(|words| join_words(words))
        .collect::<WebttyResult<Vec<_>>>()?;

    let geometry = server.geometry().current().await;
    debug!(profile = %profile.name, argv = ?command.argv, cwd = ?command.cwd, "launching");
    let process = tokio::task::spawn_blocking(move || pty::launch(&command, geometry))
        .await
        .map_err(|e| WebttyError::SpawnFailed(format!("launcher task failed: {e}")))??;
    Ok(Launched { process, commands })
}

/// Handles released exactly once when the session ends.
struct Teardown {
    cancel: CancellationToken,
    process: Mutex<Option<(Box<dyn MasterPty + Send>, Box<dyn Child + Send + Sync>)>>,
}

impl Teardown {
    fn new(master: Box<dyn MasterPty + Send>, child: Box<dyn Child + Send + Sync>) -> Self {
        Self {
            cancel: CancellationToken::new(),
            process: Mutex::new(Some((master, child))),
        }
    }

    /// Cancel both pumps, then kill and reap the child. Later calls only
    /// re-signal cancellation.
    async fn close(&self) {
        self.cancel.cancel();
        let taken = match self.process.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some((master, mut child)) = taken else {
            return;
        };
        let reaped = tokio::task::spawn_blocking(move || {
            // Already-exited children report an error here.
            let _ = child.kill();
            let status = child.wait();
            drop(master);
            status
        })
        .await;
        match reaped {
            Ok(Ok(status)) => debug!(code = status.exit_code(), "child reaped"),
            Ok(Err(e)) => warn!(error = %e, "failed to reap child"),
            Err(e) => warn!(error = %e, "reaper task failed"),
        }
    }
}

async fn pump_outbound(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<WebttyResult<Vec<u8>>>,
    teardown: Arc<Teardown>,
) -> WebttyResult<()> {
    let mut result = Ok(());
    loop {
        let chunk = tokio::select! {
            _ = teardown.cancel.cancelled() => break,
            chunk = rx.recv() => chunk,
        };
        match chunk {
            Some(Ok(data)) => {
                if let Err(e) = sink.send(Message::Binary(data)).await {
                    result = Err(WebttyError::Transport(format!("send failed: {e}")));
                    break;
                }
            }
            Some(Err(e)) => {
                warn!(error = %e, "PTY read error");
                result = Err(e);
                break;
            }
            None => {
                debug!("PTY closed");
                break;
            }
        }
    }
    teardown.close().await;
    let _ = sink.send(Message::Close(None)).await;
    let _ = sink.close().await;
    result
}

async fn pump_inbound<S>(
    mut stream: S,
    writer: PtyWriter,
    teardown: Arc<Teardown>,
) -> WebttyResult<()>
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let mut result = Ok(());
    loop {
        let msg = tokio::select! {
            _ = teardown.cancel.cancelled() => break,
            msg = stream.next() => msg,
        };
        let data = match msg {
            Some(Ok(Message::Text(text))) => text.into_bytes(),
            Some(Ok(Message::Binary(data))) => data,
            Some(Ok(Message::Close(_))) | None => {
                debug!("client closed");
                break;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                result = Err(WebttyError::Transport(format!("read failed: {e}")));
                break;
            }
        };
        if let Err(e) = writer.write(data).await {
            error!(error = %e, "PTY write failed, ending session");
            result = Err(e);
            break;
        }
    }
    teardown.close().await;
    result
}

/// Type each startup command into the shell once it has had time to start.
async fn inject_commands(commands: Vec<String>, writer: PtyWriter, cancel: CancellationToken) {
    let mut delay = SETTLE_DELAY;
    for line in commands {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = COMMAND_INTERVAL;
        debug!(command = %line, "injecting startup command");
        if let Err(e) = writer.write(format!("{line}\n").into_bytes()).await {
            warn!(error = %e, "failed to inject startup command");
            return;
        }
    }
}
