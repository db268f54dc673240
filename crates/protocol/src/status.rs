//! Integer return codes of the backend `read` call.
//!
//! | code  | meaning                         |
//! |-------|---------------------------------|
//! | `> 0` | that many bytes are in the buffer |
//! | `0`   | no data right now               |
//! | `-2`  | the child process has exited    |
//! | `< 0` | any other negative: backend error |

/// Sentinel returned by `read` once the child process has exited.
pub const CHILD_EXITED: i32 = -2;

/// Generic failure code used by backends for everything except [`CHILD_EXITED`].
pub const BACKEND_ERROR: i32 = -1;

/// Interpretation of a `read` return code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// This many bytes of output are available.
    Data(usize),
    /// Nothing to read yet.
    Idle,
    /// The child has exited; query the exit code next.
    ChildExited,
    /// Unrecoverable backend error with its raw code.
    Error(i32),
}

impl ReadStatus {
    /// Classify a raw return code.
    pub fn from_code(code: i32) -> Self {
        match code {
            CHILD_EXITED => ReadStatus::ChildExited,
            n if n > 0 => ReadStatus::Data(n as usize),
            0 => ReadStatus::Idle,
            n => ReadStatus::Error(n),
        }
    }

    /// Whether no further reads should be issued after this status.
    pub fn is_terminal(self) -> bool {
        matches!(self, ReadStatus::ChildExited | ReadStatus::Error(_))
    }
}
