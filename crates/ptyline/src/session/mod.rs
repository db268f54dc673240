//! Session management module.
//!
//! This module spawns programs on a pseudo-terminal and drives their
//! lifecycle: output streaming, input, resize, kill and exit reporting.

pub mod pty;
mod read_loop;

pub use pty::{
    ExitEvent, Pty, Session, SessionError, SessionId, SessionState, Signal, SpawnOptions,
    DEFAULT_COLS, DEFAULT_FILE, DEFAULT_NAME, DEFAULT_ROWS, POLL_INTERVAL, READ_BUFFER_SIZE,
};
