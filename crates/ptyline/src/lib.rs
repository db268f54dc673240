//! # ptyline
//!
//! Run interactive programs on a pseudo-terminal and drive them from Rust.
//!
//! ## Overview
//!
//! A [`Session`] wraps one program running on a PTY. It streams output as
//! text through `on_data`, reports termination exactly once through
//! `on_exit`, and forwards input, resize and kill requests to the backend.
//! Output is only read once [`Session::start`] is called, so subscribe first.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                  Session                     │
//! │   state machine · read loop · events         │
//! ├──────────────────────────────────────────────┤
//! │             PtyBackend (trait)               │
//! │   NativeBackend  │  ScriptedBackend (tests)  │
//! ├──────────────────────────────────────────────┤
//! │   protocol: command line · env block · codes │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ptyline::{NativeBackend, Pty, PtyBackend, Session, SpawnOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend: Arc<dyn PtyBackend> = Arc::new(NativeBackend::new());
//!     let session = Session::spawn(backend, Some("echo"), &["hello world"], SpawnOptions::default())?;
//!
//!     session.on_data().subscribe(|text| print!("{text}"));
//!     session.on_exit().subscribe(|exit| println!("exited with {}", exit.exit_code));
//!     session.start();
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`backend`]: The PTY backend boundary and its implementations
//! - [`session`]: Session lifecycle and the read loop
//! - [`events`]: Publish/subscribe channels with disposable subscriptions
//! - [`config`]: Configuration loading and defaults

pub mod backend;
pub mod config;
pub mod events;
pub mod session;

// Re-export protocol for convenience
pub use protocol;

pub use backend::{BackendCall, NativeBackend, PtyBackend, ScriptedBackend};
pub use config::{Config, ConfigError};
pub use events::{Disposable, Event, EventChannel, Listener, PublishError};
pub use session::{
    ExitEvent, Pty, Session, SessionError, SessionId, SessionState, Signal, SpawnOptions,
};
