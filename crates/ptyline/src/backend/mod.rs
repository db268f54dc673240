//! The native PTY backend boundary.
//!
//! A backend owns the real pseudo-terminals and hands out opaque integer
//! handles. Sessions talk to it only through [`PtyBackend`], using the
//! integer return conventions of [`protocol::status`].
//!
//! One backend instance is created at startup and shared by every session
//! as an `Arc<dyn PtyBackend>`.

pub mod native;
pub mod scripted;

pub use native::NativeBackend;
pub use scripted::{BackendCall, ScriptedBackend};

use protocol::SpawnRequest;

/// Operations a PTY backend must provide.
///
/// All methods are synchronous and must not block for long; `read` in
/// particular returns `0` instead of waiting for output.
pub trait PtyBackend: Send + Sync {
    /// Open a PTY and start the program. Returns a non-negative handle, or a
    /// negative code on failure.
    fn spawn(&self, request: &SpawnRequest, cols: i32, rows: i32) -> i32;

    /// Best-effort write of input bytes.
    fn write(&self, handle: i32, data: &[u8]) -> i32;

    /// Copy available output into `buf`.
    ///
    /// Returns the byte count, `0` when nothing is available,
    /// [`protocol::CHILD_EXITED`] once the child has exited, or another
    /// negative value on error.
    fn read(&self, handle: i32, buf: &mut [u8]) -> i32;

    /// Change the PTY dimensions.
    fn resize(&self, handle: i32, cols: i32, rows: i32) -> i32;

    /// Terminate the child process.
    fn kill(&self, handle: i32) -> i32;

    /// Process id of the child, or a negative value.
    fn pid(&self, handle: i32) -> i32;

    /// Exit code of the child once it has exited.
    fn exit_code(&self, handle: i32) -> i32;

    /// Release the handle. Called at most once per handle.
    fn close(&self, handle: i32);
}
