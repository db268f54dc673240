//! Background task that polls the backend for output.

use std::sync::Arc;

use protocol::ReadStatus;

use super::pty::{ExitEvent, Inner, SessionState};

/// Outcome of one locked read.
enum Step {
    Data(usize),
    Idle,
    Exited(i32),
    Failed(i32),
    Stopped,
}

/// Poll until the child exits, the backend fails, or the session is killed.
///
/// The session lock is taken for each backend read and released before any
/// listener runs, so listeners may call back into the session.
pub(super) async fn run(inner: Arc<Inner>) {
    let mut buf = vec![0u8; inner.read_buffer_size];

    tracing::debug!(session_id = %inner.id(), "Read loop started");

    loop {
        match read_step(&inner, &mut buf) {
            // One event per read. Invalid or truncated UTF-8 becomes U+FFFD.
            Step::Data(n) => inner.publish_data(String::from_utf8_lossy(&buf[..n]).into_owned()),
            Step::Idle => tokio::time::sleep(inner.poll_interval).await,
            Step::Exited(exit_code) => {
                inner.fire_exit(ExitEvent {
                    exit_code,
                    signal: None,
                });
                break;
            }
            Step::Failed(code) => {
                tracing::error!(session_id = %inner.id(), code = code, "PTY read failed");
                break;
            }
            Step::Stopped => break,
        }
    }

    tracing::debug!(session_id = %inner.id(), "Read loop stopped");
}

fn read_step(inner: &Inner, buf: &mut [u8]) -> Step {
    let mut core = inner.lock_core();
    if core.state != SessionState::Running {
        return Step::Stopped;
    }

    let backend = inner.backend();
    let handle = inner.handle();
    let status = ReadStatus::from_code(backend.read(handle, buf));
    if !status.is_terminal() {
        return match status {
            ReadStatus::Data(n) => Step::Data(n.min(buf.len())),
            _ => Step::Idle,
        };
    }

    // The exit code must be read before the handle is released.
    let step = match status {
        ReadStatus::ChildExited => Step::Exited(backend.exit_code(handle)),
        ReadStatus::Error(code) => Step::Failed(code),
        _ => Step::Stopped,
    };
    inner.release(&mut core);
    step
}
