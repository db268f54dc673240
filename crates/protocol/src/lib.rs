//! # Ptyline Protocol Library
//!
//! This crate defines the contract between a PTY session and the native
//! backend that owns the actual pseudo-terminals.
//!
//! ## Overview
//!
//! Every value crossing the backend boundary is a byte string or an
//! integer:
//!
//! - **Command line**: program and arguments, shell-word quoted so the
//!   backend can split them back byte for byte
//! - **Environment block**: `key=value` pairs separated and terminated by NUL
//! - **Spawn request**: command line, cwd and environment, each NUL-terminated
//! - **Read status**: the sentinel codes returned by `read`
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::{decode_command_line, ReadStatus, SpawnRequest};
//!
//! let req = SpawnRequest::new("echo", &["hello world"], "/tmp", [("TERM", "xterm")]).unwrap();
//! assert_eq!(req.command_line().to_str().unwrap(), "'echo' 'hello world'");
//!
//! let (program, args) = decode_command_line("'echo' 'hello world'").unwrap();
//! assert_eq!(program, "echo");
//! assert_eq!(args, vec!["hello world"]);
//!
//! assert_eq!(ReadStatus::from_code(-2), ReadStatus::ChildExited);
//! ```
//!
//! ## Modules
//!
//! - [`command`]: shell-word quoting and splitting
//! - [`env`]: environment block encoding
//! - [`spawn`]: the spawn payload
//! - [`status`]: read return codes
//! - [`error`]: Error types

pub mod command;
pub mod env;
pub mod error;
pub mod spawn;
pub mod status;

pub use command::{decode_command_line, encode_command_line, quote, split};
pub use env::{decode_env_block, encode_env_block};
pub use error::{ProtocolError, Result};
pub use spawn::SpawnRequest;
pub use status::{ReadStatus, BACKEND_ERROR, CHILD_EXITED};
