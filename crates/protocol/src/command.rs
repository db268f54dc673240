//! Shell-word quoting for the backend command line.
//!
//! No shell is ever invoked. Quoting exists only so the backend can split
//! the line back into the exact program name and argument list with a
//! POSIX word splitter ([`split`], backed by `shell-words`).
//!
//! Every token is wrapped in single quotes. A literal `'` inside a token is
//! written as `'\''` (close quote, escaped quote, reopen quote), and the
//! empty token becomes `''`. Any string without NUL bytes survives
//! `split(&quote(s))` unchanged.

use crate::error::{ProtocolError, Result};

/// Quote a single token for shell-word splitting.
pub fn quote(token: &str) -> String {
    if token.is_empty() {
        return "''".to_string();
    }

    let mut out = String::with_capacity(token.len() + 2);
    out.push('\'');
    for c in token.chars() {
        if c == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    out
}

/// Build the command line for `program` followed by `args`.
///
/// Fails if any token contains a NUL byte, since the line is handed to the
/// backend as a C string.
pub fn encode_command_line<S: AsRef<str>>(program: &str, args: &[S]) -> Result<String> {
    if program.contains('\0') {
        return Err(ProtocolError::InteriorNul { field: "program" });
    }

    let mut line = quote(program);
    for arg in args {
        let arg = arg.as_ref();
        if arg.contains('\0') {
            return Err(ProtocolError::InteriorNul { field: "argument" });
        }
        line.push(' ');
        line.push_str(&quote(arg));
    }
    Ok(line)
}

/// Split a command line into words with POSIX shell rules.
///
/// Single quotes, double quotes, backslash escapes and line continuations
/// are honored; nothing is expanded.
pub fn split(line: &str) -> Result<Vec<String>> {
    shell_words::split(line).map_err(|e| ProtocolError::MalformedCommandLine(e.to_string()))
}

/// Split a command line into the program name and its arguments.
pub fn decode_command_line(line: &str) -> Result<(String, Vec<String>)> {
    let mut words = split(line)?.into_iter();
    let program = words.next().ok_or(ProtocolError::EmptyCommandLine)?;
    Ok((program, words.collect()))
}
