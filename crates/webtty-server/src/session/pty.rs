//! PTY launcher using portable-pty.
//!
//! Spawns a resolved command line on a fresh pseudo-terminal and exposes
//! the master's reader and writer for the relay pumps.

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use std::io::{ErrorKind, Read, Write};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webtty_core::{CommandLine, Geometry, WebttyError, WebttyResult};

/// Size of each chunk read from the pty master.
pub const READ_CHUNK: usize = 1024;

/// A spawned child and the master side of its pty.
pub struct PtyProcess {
    pub reader: Box<dyn Read + Send>,
    pub writer: PtyWriter,
    pub master: Box<dyn MasterPty + Send>,
    pub child: Box<dyn Child + Send + Sync>,
}

/// Spawn `command` on a new pty sized to `geometry`.
pub fn launch(command: &CommandLine, geometry: Geometry) -> WebttyResult<PtyProcess> {
    let program = command
        .program()
        .ok_or_else(|| WebttyError::SpawnFailed("empty command".into()))?;

    let mut builder = CommandBuilder::new(program);
    builder.args(command.args());
    if let Some(cwd) = &command.cwd {
        // portable-pty falls back to the home directory for a missing cwd.
        if !cwd.is_dir() {
            return Err(WebttyError::SpawnFailed(format!(
                "working directory {} does not exist",
                cwd.display()
            )));
        }
        builder.cwd(cwd);
    }
    builder.env("TERM", "xterm-256color");

    let pair = native_pty_system()
        .openpty(PtySize {
            rows: geometry.rows,
            cols: geometry.cols,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(|e| WebttyError::SpawnFailed(format!("failed to open PTY: {e}")))?;

    let child = pair
        .slave
        .spawn_command(builder)
        .map_err(|e| WebttyError::SpawnFailed(format!("failed to spawn {program}: {e}")))?;
    // Only the child should hold the slave, so EOF reaches the master on exit.
    drop(pair.slave);

    let reader = pair
        .master
        .try_clone_reader()
        .map_err(|e| WebttyError::SpawnFailed(format!("failed to clone PTY reader: {e}")))?;
    let writer = pair
        .master
        .take_writer()
        .map_err(|e| WebttyError::SpawnFailed(format!("failed to take PTY writer: {e}")))?;

    info!(
        program,
        cols = geometry.cols,
        rows = geometry.rows,
        pid = child.process_id(),
        "PTY spawned"
    );

    Ok(PtyProcess {
        reader,
        writer: PtyWriter::new(writer),
        master: pair.master,
        child,
    })
}

/// Shared handle to the pty master's input side.
#[derive(Clone)]
pub struct PtyWriter {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl PtyWriter {
    pub(crate) fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    /// Write and flush `data` (blocking; call from a blocking context).
    pub fn write_blocking(&self, data: &[u8]) -> WebttyResult<()> {
        let mut writer = self
            .inner
            .lock()
            .map_err(|_| WebttyError::Other("PTY writer lock poisoned".into()))?;
        writer.write_all(data)?;
        writer.flush()?;
        Ok(())
    }

    /// Write `data` on the blocking pool.
    pub async fn write(&self, data: Vec<u8>) -> WebttyResult<()> {
        let writer = self.clone();
        tokio::task::spawn_blocking(move || writer.write_blocking(&data))
            .await
            .map_err(|e| WebttyError::Other(format!("join error: {e}")))?
    }
}

/// Read the pty until EOF, forwarding chunks to `tx`. Runs on the blocking
/// pool; stops early if the receiver goes away.
pub fn spawn_reader(
    mut reader: Box<dyn Read + Send>,
    tx: mpsc::Sender<WebttyResult<Vec<u8>>>,
) -> tokio::task::JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.blocking_send(Ok(buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if is_hangup(&e) => break,
                Err(e) => {
                    warn!(error = %e, "PTY read failed");
                    let _ = tx.blocking_send(Err(e.into()));
                    break;
                }
            }
        }
        debug!("PTY reader finished");
    })
}

/// Linux reports EIO on the master once every slave descriptor is closed.
fn is_hangup(e: &std::io::Error) -> bool {
    cfg!(target_os = "linux") && e.raw_os_error() == Some(5)
}
