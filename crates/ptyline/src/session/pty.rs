//! PTY session lifecycle.
//!
//! A [`Session`] owns one backend handle from spawn until close and moves
//! through `Spawning -> Running -> Closing -> Closed`. Output and exit are
//! delivered through [`EventChannel`]s; input, resize and kill are forwarded
//! to the backend under the session lock, so they never interleave with a
//! read-loop step.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use protocol::{ProtocolError, SpawnRequest};
use thiserror::Error;
use uuid::Uuid;

use crate::backend::PtyBackend;
use crate::config::Config;
use crate::events::{Event, EventChannel};

use super::read_loop;

/// Unique identifier for a session, used for log correlation.
pub type SessionId = String;

/// Default terminal width.
pub const DEFAULT_COLS: i32 = 80;

/// Default terminal height.
pub const DEFAULT_ROWS: i32 = 24;

/// Program spawned when none is given.
pub const DEFAULT_FILE: &str = "sh";

/// Terminal type exported as `TERM` when none is given.
pub const DEFAULT_NAME: &str = "xterm";

/// Scratch buffer size for backend reads.
pub const READ_BUFFER_SIZE: usize = 4096;

/// Pause between reads when the backend has no data.
pub const POLL_INTERVAL: Duration = Duration::from_millis(8);

/// Errors that can occur while creating a session.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The backend returned a negative handle.
    #[error("PTY spawn failed with code {code}")]
    SpawnFailed { code: i32 },

    /// The program, arguments, cwd or environment could not be encoded.
    #[error("failed to encode spawn request: {0}")]
    Encode(#[from] ProtocolError),

    /// No Tokio runtime is available to drive the read loop.
    #[error("a Tokio runtime is required to spawn a session")]
    NoRuntime,
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Handle obtained, not yet accepting calls.
    Spawning,
    /// Read loop active; write, resize and kill are accepted.
    Running,
    /// Releasing the handle.
    Closing,
    /// Handle released; every call is a no-op.
    Closed,
}

/// Signal reported with a caller-initiated kill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Name(String),
    Number(i32),
}

impl Default for Signal {
    fn default() -> Self {
        Signal::Name("SIGTERM".to_string())
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Name(name) => f.write_str(name),
            Signal::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for Signal {
    fn from(name: &str) -> Self {
        Signal::Name(name.to_string())
    }
}

impl From<i32> for Signal {
    fn from(n: i32) -> Self {
        Signal::Number(n)
    }
}

/// Exit notification.
///
/// `signal` is set only when the session was ended by [`Pty::kill`]; in
/// that case `exit_code` is always `0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitEvent {
    pub exit_code: i32,
    pub signal: Option<Signal>,
}

/// Options for [`Session::spawn`].
#[derive(Debug, Clone)]
pub struct SpawnOptions {
    /// Terminal type, exported as `TERM` unless `env` sets it.
    pub name: Option<String>,
    pub cols: Option<i32>,
    pub rows: Option<i32>,
    /// Working directory; defaults to the current directory.
    pub cwd: Option<String>,
    /// Extra environment on top of the inherited one.
    pub env: Option<BTreeMap<String, String>>,
    pub poll_interval: Duration,
    pub read_buffer_size: usize,
}

impl Default for SpawnOptions {
    fn default() -> Self {
        Self {
            name: None,
            cols: None,
            rows: None,
            cwd: None,
            env: None,
            poll_interval: POLL_INTERVAL,
            read_buffer_size: READ_BUFFER_SIZE,
        }
    }
}

impl SpawnOptions {
    /// Options seeded from the configuration defaults.
    pub fn from_config(config: &Config) -> Self {
        Self {
            name: Some(config.session.term_name.clone()),
            cols: Some(i32::from(config.session.cols)),
            rows: Some(i32::from(config.session.rows)),
            cwd: None,
            env: None,
            poll_interval: Duration::from_millis(config.read_loop.poll_interval_ms),
            read_buffer_size: config.read_loop.buffer_size,
        }
    }
}

/// Capabilities of an interactive PTY process.
pub trait Pty: Send + Sync {
    /// Process id of the child.
    fn pid(&self) -> i32;

    /// Current width as last accepted by [`Pty::resize`].
    fn cols(&self) -> i32;

    /// Current height as last accepted by [`Pty::resize`].
    fn rows(&self) -> i32;

    /// Name of the spawned program.
    fn process(&self) -> &str;

    /// Send input. Ignored once the session is closing.
    fn write(&self, data: &str);

    /// Change the terminal size. Ignored once the session is closing.
    fn resize(&self, cols: i32, rows: i32);

    /// Terminate the process and fire the exit event. `None` means SIGTERM.
    fn kill(&self, signal: Option<Signal>);

    /// Output text as it arrives.
    fn on_data(&self) -> Event<'_, String>;

    /// Fired exactly once when the session ends.
    fn on_exit(&self) -> Event<'_, ExitEvent>;
}

#[derive(Debug)]
pub(super) struct Core {
    pub(super) state: SessionState,
    cols: i32,
    rows: i32,
}

pub(super) struct Inner {
    id: SessionId,
    backend: Arc<dyn PtyBackend>,
    handle: i32,
    pid: i32,
    file: String,
    name: String,
    core: Mutex<Core>,
    read_loop_active: AtomicBool,
    exit_fired: AtomicBool,
    on_data: EventChannel<String>,
    on_exit: EventChannel<ExitEvent>,
    runtime: tokio::runtime::Handle,
    pub(super) poll_interval: Duration,
    pub(super) read_buffer_size: usize,
}

impl Inner {
    pub(super) fn id(&self) -> &SessionId {
        &self.id
    }

    pub(super) fn handle(&self) -> i32 {
        self.handle
    }

    pub(super) fn backend(&self) -> &dyn PtyBackend {
        self.backend.as_ref()
    }

    pub(super) fn lock_core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Close the backend handle. The caller holds the lock and has checked
    /// that the session was still running, so this runs once per handle.
    pub(super) fn release(&self, core: &mut Core) {
        core.state = SessionState::Closing;
        self.backend.close(self.handle);
        core.state = SessionState::Closed;
    }

    pub(super) fn publish_data(&self, text: String) {
        if let Err(e) = self.on_data.publish(&text) {
            tracing::warn!(session_id = %self.id, error = %e, "Data listener failed");
        }
    }

    pub(super) fn fire_exit(&self, event: ExitEvent) {
        if self.exit_fired.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!(
            session_id = %self.id,
            exit_code = event.exit_code,
            signal = ?event.signal,
            "Session exited"
        );
        if let Err(e) = self.on_exit.publish(&event) {
            tracing::warn!(session_id = %self.id, error = %e, "Exit listener failed");
        }
    }

    fn write(&self, data: &[u8]) {
        let core = self.lock_core();
        if core.state != SessionState::Running {
            return;
        }
        let status = self.backend.write(self.handle, data);
        if status < 0 {
            tracing::debug!(session_id = %self.id, status = status, "Backend write failed");
        }
    }

    fn resize(&self, cols: i32, rows: i32) {
        let mut core = self.lock_core();
        if core.state != SessionState::Running {
            return;
        }
        core.cols = cols;
        core.rows = rows;
        let status = self.backend.resize(self.handle, cols, rows);
        tracing::debug!(
            session_id = %self.id,
            cols = cols,
            rows = rows,
            status = status,
            "Resized PTY"
        );
    }

    fn kill(&self, signal: Signal) {
        {
            let mut core = self.lock_core();
            if core.state != SessionState::Running {
                return;
            }
            core.state = SessionState::Closing;
            self.backend.kill(self.handle);
            self.release(&mut core);
        }
        tracing::info!(session_id = %self.id, signal = %signal, "Session killed");
        self.fire_exit(ExitEvent {
            exit_code: 0,
            signal: Some(signal),
        });
    }
}

/// A program running on a pseudo-terminal.
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Spawns `file` (default `sh`) with `args` on a new PTY.
    ///
    /// The session is returned running but silent: no read happens until
    /// [`Session::start`] is called, so listeners subscribed in between see
    /// every data event and the exit event. Must be called from within a
    /// Tokio runtime.
    pub fn spawn<S: AsRef<str>>(
        backend: Arc<dyn PtyBackend>,
        file: Option<&str>,
        args: &[S],
        options: SpawnOptions,
    ) -> Result<Self, SessionError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SessionError::NoRuntime)?;

        let file = file.unwrap_or(DEFAULT_FILE);
        let name = options.name.unwrap_or_else(|| DEFAULT_NAME.to_string());
        let cols = options.cols.unwrap_or(DEFAULT_COLS);
        let rows = options.rows.unwrap_or(DEFAULT_ROWS);
        let cwd = options.cwd.unwrap_or_else(current_dir);

        let mut env = options.env.unwrap_or_default();
        env.entry("TERM".to_string()).or_insert_with(|| name.clone());

        let request = SpawnRequest::new(
            file,
            args,
            &cwd,
            env.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        )?;

        let handle = backend.spawn(&request, cols, rows);
        if handle < 0 {
            tracing::error!(file = %file, code = handle, "PTY spawn failed");
            return Err(SessionError::SpawnFailed { code: handle });
        }

        let pid = backend.pid(handle);
        let session = Session {
            inner: Arc::new(Inner {
                id: Uuid::new_v4().to_string(),
                backend,
                handle,
                pid,
                file: file.to_string(),
                name,
                core: Mutex::new(Core {
                    state: SessionState::Spawning,
                    cols,
                    rows,
                }),
                read_loop_active: AtomicBool::new(false),
                exit_fired: AtomicBool::new(false),
                on_data: EventChannel::new(),
                on_exit: EventChannel::new(),
                runtime,
                poll_interval: options.poll_interval,
                read_buffer_size: options.read_buffer_size.max(1),
            }),
        };

        session.inner.lock_core().state = SessionState::Running;

        tracing::info!(
            session_id = %session.inner.id,
            handle = handle,
            pid = pid,
            cols = cols,
            rows = rows,
            "Created new session"
        );

        Ok(session)
    }

    /// Returns the session ID.
    pub fn id(&self) -> &SessionId {
        &self.inner.id
    }

    /// Terminal type the session was started with.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.inner.lock_core().state
    }

    /// Returns whether the session is still running.
    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Running
    }

    /// Starts streaming output on the runtime the session was spawned on.
    ///
    /// Subscribe to `on_data` and `on_exit` first. Returns `false` if the
    /// read loop was already started. Starting a killed session is harmless:
    /// the loop sees the closed state and stops without reading.
    pub fn start(&self) -> bool {
        if self.inner.read_loop_active.swap(true, Ordering::SeqCst) {
            tracing::warn!(session_id = %self.inner.id, "Read loop already running");
            return false;
        }
        self.inner
            .runtime
            .spawn(read_loop::run(Arc::clone(&self.inner)));
        true
    }
}

impl Pty for Session {
    fn pid(&self) -> i32 {
        self.inner.pid
    }

    fn cols(&self) -> i32 {
        self.inner.lock_core().cols
    }

    fn rows(&self) -> i32 {
        self.inner.lock_core().rows
    }

    fn process(&self) -> &str {
        &self.inner.file
    }

    fn write(&self, data: &str) {
        self.inner.write(data.as_bytes());
    }

    fn resize(&self, cols: i32, rows: i32) {
        self.inner.resize(cols, rows);
    }

    fn kill(&self, signal: Option<Signal>) {
        self.inner.kill(signal.unwrap_or_default());
    }

    fn on_data(&self) -> Event<'_, String> {
        self.inner.on_data.event()
    }

    fn on_exit(&self) -> Event<'_, ExitEvent> {
        self.inner.on_exit.event()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("handle", &self.inner.handle)
            .field("pid", &self.inner.pid)
            .field("core", &*self.inner.lock_core())
            .finish()
    }
}

fn current_dir() -> String {
    std::env::current_dir()
        .map(|dir| dir.to_string_lossy().into_owned())
        .unwrap_or_default()
}
