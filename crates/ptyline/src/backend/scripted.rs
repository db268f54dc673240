//! A backend that replays scripted read results and records its calls.
//!
//! Meant for tests that exercise session logic without a real PTY. A running
//! read loop polls continuously, so the call log keeps only the most recent
//! [`DEFAULT_CALL_LIMIT`] entries unless [`ScriptedBackend::with_call_limit`]
//! says otherwise.
//!
//! ```rust
//! use std::sync::Arc;
//! use ptyline::backend::{BackendCall, PtyBackend, ScriptedBackend};
//!
//! let backend = Arc::new(ScriptedBackend::new().with_pid(42).with_exit_code(3));
//! backend.push_output(b"hello");
//! backend.push_code(protocol::CHILD_EXITED);
//!
//! let mut buf = [0u8; 16];
//! assert_eq!(backend.read(0, &mut buf), 5);
//! assert_eq!(backend.read(0, &mut buf), -2);
//! assert_eq!(backend.count(|c| matches!(c, BackendCall::Read { .. })), 2);
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use protocol::SpawnRequest;

use super::PtyBackend;

/// Default number of calls kept in the log.
pub const DEFAULT_CALL_LIMIT: usize = 65_536;

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Spawn {
        command_line: String,
        cwd: String,
        env_block: Vec<u8>,
        cols: i32,
        rows: i32,
    },
    Write {
        handle: i32,
        data: Vec<u8>,
    },
    Read {
        handle: i32,
    },
    Resize {
        handle: i32,
        cols: i32,
        rows: i32,
    },
    Kill {
        handle: i32,
    },
    Pid {
        handle: i32,
    },
    ExitCode {
        handle: i32,
    },
    Close {
        handle: i32,
    },
}

#[derive(Debug)]
enum ReadStep {
    Output(Vec<u8>),
    Code(i32),
}

#[derive(Debug)]
struct Script {
    spawn_result: Option<i32>,
    next_handle: i32,
    pid: i32,
    exit_code: i32,
    reads: VecDeque<ReadStep>,
    calls: VecDeque<BackendCall>,
    call_limit: usize,
}

impl Script {
    fn record(&mut self, call: BackendCall) {
        if self.calls.len() == self.call_limit {
            self.calls.pop_front();
        }
        self.calls.push_back(call);
    }
}

/// Scripted [`PtyBackend`] for tests.
///
/// Reads return queued steps in order and `0` once the queue is empty.
#[derive(Debug)]
pub struct ScriptedBackend {
    script: Mutex<Script>,
}

impl ScriptedBackend {
    /// Create a backend that spawns successfully with handle `0`.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script {
                spawn_result: None,
                next_handle: 0,
                pid: 1000,
                exit_code: 0,
                reads: VecDeque::new(),
                calls: VecDeque::new(),
                call_limit: DEFAULT_CALL_LIMIT,
            }),
        }
    }

    /// Make every spawn return `code` instead of a handle.
    pub fn fail_spawn(self, code: i32) -> Self {
        self.lock().spawn_result = Some(code);
        self
    }

    /// Set the pid reported for every handle.
    pub fn with_pid(self, pid: i32) -> Self {
        self.lock().pid = pid;
        self
    }

    /// Set the exit code reported after [`protocol::CHILD_EXITED`].
    pub fn with_exit_code(self, code: i32) -> Self {
        self.lock().exit_code = code;
        self
    }

    /// Keep at most `limit` calls in the log, dropping the oldest first.
    pub fn with_call_limit(self, limit: usize) -> Self {
        {
            let mut script = self.lock();
            script.call_limit = limit.max(1);
            while script.calls.len() > script.call_limit {
                script.calls.pop_front();
            }
        }
        self
    }

    /// Queue output bytes for a future read.
    pub fn push_output(&self, data: &[u8]) {
        self.lock().reads.push_back(ReadStep::Output(data.to_vec()));
    }

    /// Queue a raw return code for a future read.
    pub fn push_code(&self, code: i32) {
        self.lock().reads.push_back(ReadStep::Code(code));
    }

    /// Logged calls, oldest first.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.iter().cloned().collect()
    }

    /// Number of recorded calls matching `pred`.
    pub fn count<F>(&self, pred: F) -> usize
    where
        F: Fn(&BackendCall) -> bool,
    {
        self.lock().calls.iter().filter(|c| pred(c)).count()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PtyBackend for ScriptedBackend {
    fn spawn(&self, request: &SpawnRequest, cols: i32, rows: i32) -> i32 {
        let mut script = self.lock();
        script.record(BackendCall::Spawn {
            command_line: request.command_line().to_string_lossy().into_owned(),
            cwd: request.cwd().to_string_lossy().into_owned(),
            env_block: request.env_block().to_vec(),
            cols,
            rows,
        });

        if let Some(code) = script.spawn_result {
            return code;
        }
        let handle = script.next_handle;
        script.next_handle += 1;
        handle
    }

    fn write(&self, handle: i32, data: &[u8]) -> i32 {
        self.lock().record(BackendCall::Write {
            handle,
            data: data.to_vec(),
        });
        data.len() as i32
    }

    fn read(&self, handle: i32, buf: &mut [u8]) -> i32 {
        let mut script = self.lock();
        script.record(BackendCall::Read { handle });

        match script.reads.pop_front() {
            None => 0,
            Some(ReadStep::Code(code)) => code,
            Some(ReadStep::Output(mut data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    let rest = data.split_off(n);
                    script.reads.push_front(ReadStep::Output(rest));
                }
                n as i32
            }
        }
    }

    fn resize(&self, handle: i32, cols: i32, rows: i32) -> i32 {
        self.lock().record(BackendCall::Resize { handle, cols, rows });
        0
    }

    fn kill(&self, handle: i32) -> i32 {
        self.lock().record(BackendCall::Kill { handle });
        0
    }

    fn pid(&self, handle: i32) -> i32 {
        let mut script = self.lock();
        script.record(BackendCall::Pid { handle });
        script.pid
    }

    fn exit_code(&self, handle: i32) -> i32 {
        let mut script = self.lock();
        script.record(BackendCall::ExitCode { handle });
        script.exit_code
    }

    fn close(&self, handle: i32) {
        self.lock().record(BackendCall::Close { handle });
    }
}
