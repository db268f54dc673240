//! PTY backend built on `portable-pty`.
//!
//! Each spawned PTY gets a reader thread that forwards output chunks over a
//! channel, so [`PtyBackend::read`] never blocks. The child counts as exited
//! once the reader has hit EOF, the channel is drained and the process has
//! been reaped.

use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use protocol::{decode_command_line, decode_env_block, SpawnRequest, BACKEND_ERROR, CHILD_EXITED};

use super::PtyBackend;

/// Size of the chunks the reader thread pulls from the PTY master.
const READER_CHUNK_SIZE: usize = 4096;

struct NativePty {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    child: Box<dyn Child + Send + Sync>,
    output: Receiver<Vec<u8>>,
    /// Bytes from a chunk that did not fit the caller's buffer.
    pending: Vec<u8>,
    exit_code: Option<i32>,
}

impl NativePty {
    fn reap(&mut self) -> Option<i32> {
        if self.exit_code.is_none() {
            if let Ok(Some(status)) = self.child.try_wait() {
                self.exit_code = Some(status.exit_code() as i32);
            }
        }
        self.exit_code
    }
}

/// [`PtyBackend`] backed by the operating system's pseudo-terminals.
pub struct NativeBackend {
    ptys: Mutex<HashMap<i32, NativePty>>,
    next_handle: AtomicI32,
}

impl NativeBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self {
            ptys: Mutex::new(HashMap::new()),
            next_handle: AtomicI32::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<i32, NativePty>> {
        self.ptys.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open(&self, request: &SpawnRequest, cols: i32, rows: i32) -> anyhow::Result<NativePty> {
        let size = PtySize {
            rows: u16::try_from(rows)?,
            cols: u16::try_from(cols)?,
            pixel_width: 0,
            pixel_height: 0,
        };

        let (program, args) = decode_command_line(request.command_line().to_str()?)?;
        let mut cmd = CommandBuilder::new(program);
        cmd.args(args);

        let cwd = request.cwd().to_str()?;
        if !cwd.is_empty() {
            cmd.cwd(cwd);
        }

        for (key, value) in decode_env_block(request.env_block())? {
            cmd.env(key, value);
        }

        let pair = native_pty_system().openpty(size)?;
        let mut child = pair.slave.spawn_command(cmd)?;
        // Only the child may hold the slave side, otherwise EOF never arrives.
        drop(pair.slave);

        let (writer, rx) = kill_on_error(&mut child, attach(pair.master.as_ref()))?;

        Ok(NativePty {
            master: pair.master,
            writer,
            child,
            output: rx,
            pending: Vec::new(),
            exit_code: None,
        })
    }
}

/// Take the master's writer and start a reader thread feeding a channel.
fn attach(master: &dyn MasterPty) -> anyhow::Result<(Box<dyn Write + Send>, Receiver<Vec<u8>>)> {
    let mut reader = master.try_clone_reader()?;
    let writer = master.take_writer()?;

    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("pty-reader".to_string())
        .spawn(move || {
            let mut buf = [0u8; READER_CHUNK_SIZE];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    // EIO is how Linux reports a hung-up PTY.
                    Err(_) => break,
                }
            }
        })?;

    Ok((writer, rx))
}

/// Kill and reap `child` when `result` is an error.
fn kill_on_error<T>(
    child: &mut Box<dyn Child + Send + Sync>,
    result: anyhow::Result<T>,
) -> anyhow::Result<T> {
    if let Err(e) = &result {
        tracing::debug!(pid = ?child.process_id(), error = %e, "PTY setup failed, killing child");
        let _ = child.kill();
        let _ = child.wait();
    }
    result
}

impl Default for NativeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PtyBackend for NativeBackend {
    fn spawn(&self, request: &SpawnRequest, cols: i32, rows: i32) -> i32 {
        match self.open(request, cols, rows) {
            Ok(pty) => {
                let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(
                    handle = handle,
                    pid = ?pty.child.process_id(),
                    "Spawned native PTY"
                );
                self.lock().insert(handle, pty);
                handle
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to spawn native PTY");
                BACKEND_ERROR
            }
        }
    }

    fn write(&self, handle: i32, data: &[u8]) -> i32 {
        let mut ptys = self.lock();
        let Some(pty) = ptys.get_mut(&handle) else {
            return BACKEND_ERROR;
        };
        match pty.writer.write_all(data).and_then(|_| pty.writer.flush()) {
            Ok(()) => data.len() as i32,
            Err(e) => {
                tracing::debug!(handle = handle, error = %e, "PTY write failed");
                BACKEND_ERROR
            }
        }
    }

    fn read(&self, handle: i32, buf: &mut [u8]) -> i32 {
        let mut ptys = self.lock();
        let Some(pty) = ptys.get_mut(&handle) else {
            return BACKEND_ERROR;
        };

        if pty.pending.is_empty() {
            match pty.output.try_recv() {
                Ok(chunk) => pty.pending = chunk,
                Err(TryRecvError::Empty) => return 0,
                Err(TryRecvError::Disconnected) => {
                    // Output is drained; wait for the process to be reapable.
                    return match pty.reap() {
                        Some(_) => CHILD_EXITED,
                        None => 0,
                    };
                }
            }
        }

        let n = pty.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&pty.pending[..n]);
        pty.pending.drain(..n);
        n as i32
    }

    fn resize(&self, handle: i32, cols: i32, rows: i32) -> i32 {
        let (Ok(cols), Ok(rows)) = (u16::try_from(cols), u16::try_from(rows)) else {
            return BACKEND_ERROR;
        };
        let ptys = self.lock();
        let Some(pty) = ptys.get(&handle) else {
            return BACKEND_ERROR;
        };
        match pty.master.resize(PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        }) {
            Ok(()) => 0,
            Err(e) => {
                tracing::debug!(handle = handle, error = %e, "PTY resize failed");
                BACKEND_ERROR
            }
        }
    }

    fn kill(&self, handle: i32) -> i32 {
        let mut ptys = self.lock();
        let Some(pty) = ptys.get_mut(&handle) else {
            return BACKEND_ERROR;
        };
        match pty.child.kill() {
            Ok(()) => 0,
            Err(e) => {
                tracing::debug!(handle = handle, error = %e, "PTY kill failed");
                BACKEND_ERROR
            }
        }
    }

    fn pid(&self, handle: i32) -> i32 {
        self.lock()
            .get(&handle)
            .and_then(|pty| pty.child.process_id())
            .and_then(|pid| i32::try_from(pid).ok())
            .unwrap_or(BACKEND_ERROR)
    }

    fn exit_code(&self, handle: i32) -> i32 {
        self.lock()
            .get_mut(&handle)
            .and_then(NativePty::reap)
            .unwrap_or(BACKEND_ERROR)
    }

    fn close(&self, handle: i32) {
        if let Some(mut pty) = self.lock().remove(&handle) {
            // Reap if possible so no zombie is left behind.
            let _ = pty.reap();
            tracing::debug!(handle = handle, "Closed native PTY");
        }
    }
}
