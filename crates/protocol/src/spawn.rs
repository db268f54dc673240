//! The spawn payload handed to a PTY backend.

use std::ffi::{CStr, CString};

use crate::command::encode_command_line;
use crate::env::encode_env_block;
use crate::error::{ProtocolError, Result};

/// Encoded arguments for a backend `spawn` call.
///
/// All three fields are NUL-terminated independently. The environment
/// block already ends with its own NUL, so on the wire it carries one more
/// terminator than [`encode_env_block`] produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRequest {
    command_line: CString,
    cwd: CString,
    env_block: Vec<u8>,
}

impl SpawnRequest {
    /// Encode a program, its arguments, working directory and environment.
    pub fn new<'a, S, I>(program: &str, args: &[S], cwd: &str, env: I) -> Result<Self>
    where
        S: AsRef<str>,
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let command_line = CString::new(encode_command_line(program, args)?)?;
        let cwd = CString::new(cwd).map_err(|_| ProtocolError::InteriorNul { field: "cwd" })?;

        let mut env_block = encode_env_block(env)?;
        env_block.push(0);

        Ok(Self {
            command_line,
            cwd,
            env_block,
        })
    }

    /// The quoted command line.
    pub fn command_line(&self) -> &CStr {
        &self.command_line
    }

    /// The working directory; empty means inherit.
    pub fn cwd(&self) -> &CStr {
        &self.cwd
    }

    /// The environment block including the boundary terminator.
    pub fn env_block(&self) -> &[u8] {
        &self.env_block
    }
}
