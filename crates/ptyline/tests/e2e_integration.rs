//! End-to-end integration tests for ptyline.
//!
//! These tests drive complete session flows through the public API:
//! - Spawn request encoding as seen by the backend
//! - Output streaming and exit reporting
//! - Kill, write and resize lifecycle rules
//! - A real program on the native backend

use std::sync::Arc;
use std::time::Duration;

use ptyline::backend::{BackendCall, PtyBackend, ScriptedBackend};
use ptyline::{ExitEvent, Pty, Session, SessionState, Signal, SpawnOptions};
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn spawn(backend: &Arc<ScriptedBackend>, file: Option<&str>, args: &[&str]) -> Session {
    Session::spawn(
        Arc::clone(backend) as Arc<dyn PtyBackend>,
        file,
        args,
        SpawnOptions::default(),
    )
    .unwrap()
}

/// Subscribe collectors to both events, then start the read loop.
fn subscribe_all(
    session: &Session,
) -> (
    mpsc::UnboundedReceiver<String>,
    mpsc::UnboundedReceiver<ExitEvent>,
) {
    let (data_tx, data_rx) = mpsc::unbounded_channel();
    let (exit_tx, exit_rx) = mpsc::unbounded_channel();
    session.on_data().subscribe(move |d: &String| {
        let _ = data_tx.send(d.clone());
    });
    session.on_exit().subscribe(move |e: &ExitEvent| {
        let _ = exit_tx.send(e.clone());
    });
    session.start();
    (data_rx, exit_rx)
}

// =============================================================================
// Spawn Tests
// =============================================================================

#[tokio::test]
async fn test_spawn_uses_defaults() {
    let backend = Arc::new(ScriptedBackend::new());
    let session = spawn(&backend, None, &[]);

    assert_eq!(session.cols(), 80);
    assert_eq!(session.rows(), 24);
    assert_eq!(session.process(), "sh");
    assert_eq!(session.name(), "xterm");
    assert!(session.is_running());
    assert!(!session.id().is_empty());

    session.kill(None);
}

#[tokio::test]
async fn test_spawn_quotes_arguments() {
    let backend = Arc::new(ScriptedBackend::new());
    let session = spawn(&backend, Some("echo"), &["hello world"]);

    let calls = backend.calls();
    let BackendCall::Spawn { command_line, .. } = &calls[0] else {
        panic!("first call should be spawn, got {:?}", calls[0]);
    };
    assert_eq!(command_line, "'echo' 'hello world'");

    let (program, args) = protocol::decode_command_line(command_line).unwrap();
    assert_eq!(program, "echo");
    assert_eq!(args, vec!["hello world"]);

    session.kill(None);
}

#[tokio::test]
async fn test_spawn_failure_is_reported() {
    let backend = Arc::new(ScriptedBackend::new().fail_spawn(-3));
    let none: [&str; 0] = [];
    let err = Session::spawn(
        Arc::clone(&backend) as Arc<dyn PtyBackend>,
        None,
        &none,
        SpawnOptions::default(),
    )
    .unwrap_err();

    assert_eq!(err.to_string(), "PTY spawn failed with code -3");
}

// =============================================================================
// Read Loop Tests
// =============================================================================

#[tokio::test]
async fn test_output_then_natural_exit() {
    let backend = Arc::new(ScriptedBackend::new().with_exit_code(3));
    backend.push_output(b"hello");
    backend.push_code(protocol::CHILD_EXITED);

    let session = spawn(&backend, None, &[]);
    let (mut data, mut exits) = subscribe_all(&session);

    let exit = timeout(WAIT, exits.recv()).await.unwrap().unwrap();
    assert_eq!(
        exit,
        ExitEvent {
            exit_code: 3,
            signal: None
        }
    );
    assert_eq!(data.try_recv().unwrap(), "hello");
    assert!(data.try_recv().is_err());
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_idle_reads_are_polled() {
    let backend = Arc::new(ScriptedBackend::new());
    let session = spawn(&backend, None, &[]);
    session.start();

    tokio::time::sleep(Duration::from_millis(60)).await;
    let reads = backend.count(|c| matches!(c, BackendCall::Read { .. }));
    assert!(reads >= 2, "expected repeated polling, saw {reads} reads");

    session.kill(None);
}

#[tokio::test]
async fn test_output_after_idle_is_delivered() {
    let backend = Arc::new(ScriptedBackend::new());
    let session = spawn(&backend, None, &[]);
    let (mut data, _exits) = subscribe_all(&session);

    tokio::time::sleep(Duration::from_millis(20)).await;
    backend.push_output("\u{4E16}\u{754C}".as_bytes());

    assert_eq!(
        timeout(WAIT, data.recv()).await.unwrap().unwrap(),
        "\u{4E16}\u{754C}"
    );
    session.kill(None);
}

#[tokio::test]
async fn test_disposed_listener_stops_receiving() {
    let backend = Arc::new(ScriptedBackend::new());
    let session = spawn(&backend, None, &[]);

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let token = session.on_data().subscribe(move |d: &String| {
        let _ = tx.send(d.clone());
    });
    let (mut keep, _exits) = subscribe_all(&session);

    backend.push_output(b"first");
    assert_eq!(timeout(WAIT, rx.recv()).await.unwrap().unwrap(), "first");
    assert_eq!(timeout(WAIT, keep.recv()).await.unwrap().unwrap(), "first");

    token.dispose();
    token.dispose();
    backend.push_output(b"second");
    assert_eq!(timeout(WAIT, keep.recv()).await.unwrap().unwrap(), "second");
    assert!(rx.try_recv().is_err());

    session.kill(None);
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[tokio::test]
async fn test_double_kill_fires_one_exit() {
    let backend = Arc::new(ScriptedBackend::new());
    let session = spawn(&backend, None, &[]);
    let (_data, mut exits) = subscribe_all(&session);

    session.kill(Some(Signal::from("SIGKILL")));
    session.kill(None);

    let exit = timeout(WAIT, exits.recv()).await.unwrap().unwrap();
    assert_eq!(exit.exit_code, 0);
    assert_eq!(exit.signal, Some(Signal::Name("SIGKILL".to_string())));

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(exits.try_recv().is_err());
    assert_eq!(backend.count(|c| matches!(c, BackendCall::Close { .. })), 1);
}

#[tokio::test]
async fn test_resize_and_write_only_while_running() {
    let backend = Arc::new(ScriptedBackend::new());
    let session = spawn(&backend, None, &[]);

    session.resize(100, 30);
    session.write("ls\r");
    assert_eq!((session.cols(), session.rows()), (100, 30));
    assert_eq!(backend.count(|c| matches!(c, BackendCall::Resize { .. })), 1);
    assert_eq!(backend.count(|c| matches!(c, BackendCall::Write { .. })), 1);

    session.kill(None);
    session.resize(10, 10);
    session.write("ignored");
    assert_eq!((session.cols(), session.rows()), (100, 30));
    assert_eq!(backend.count(|c| matches!(c, BackendCall::Resize { .. })), 1);
    assert_eq!(backend.count(|c| matches!(c, BackendCall::Write { .. })), 1);
}

#[tokio::test]
async fn test_sessions_share_one_backend() {
    let backend = Arc::new(ScriptedBackend::new());
    let first = spawn(&backend, Some("a"), &[]);
    let second = spawn(&backend, Some("b"), &[]);

    first.write("x");
    second.write("y");
    assert_eq!(
        backend.count(|c| matches!(c, BackendCall::Write { handle: 0, .. })),
        1
    );
    assert_eq!(
        backend.count(|c| matches!(c, BackendCall::Write { handle: 1, .. })),
        1
    );
    assert_ne!(first.id(), second.id());

    first.kill(None);
    assert!(second.is_running());
    second.kill(None);
}

// =============================================================================
// Native Backend Tests
// =============================================================================

#[cfg(unix)]
#[tokio::test]
async fn test_native_echo_and_exit_code() {
    let backend: Arc<dyn PtyBackend> = Arc::new(ptyline::NativeBackend::new());
    let session = Session::spawn(
        backend,
        Some("/bin/sh"),
        &["-c", "echo \"$GREETING\"; exit 7"],
        SpawnOptions {
            env: Some([("GREETING".to_string(), "hello world".to_string())].into()),
            ..SpawnOptions::default()
        },
    )
    .unwrap();
    let (mut data, mut exits) = subscribe_all(&session);

    assert!(session.pid() > 0);
    let exit = timeout(WAIT, exits.recv()).await.unwrap().unwrap();
    assert_eq!(exit.exit_code, 7);
    assert_eq!(exit.signal, None);

    let mut output = String::new();
    while let Ok(chunk) = data.try_recv() {
        output.push_str(&chunk);
    }
    assert!(output.contains("hello world"), "unexpected output: {output:?}");
}

#[cfg(unix)]
#[tokio::test]
async fn test_native_interactive_kill() {
    let backend: Arc<dyn PtyBackend> = Arc::new(ptyline::NativeBackend::new());
    let session = Session::spawn(backend, Some("/bin/cat"), &[] as &[&str], SpawnOptions::default())
        .unwrap();
    let (mut data, mut exits) = subscribe_all(&session);

    session.write("ping\n");
    let mut output = String::new();
    while !output.contains("ping") {
        let chunk = timeout(WAIT, data.recv()).await.unwrap().unwrap();
        output.push_str(&chunk);
    }

    session.resize(120, 40);
    session.kill(None);

    let exit = timeout(WAIT, exits.recv()).await.unwrap().unwrap();
    assert_eq!(exit.signal, Some(Signal::default()));
    assert_eq!(session.state(), SessionState::Closed);
}
