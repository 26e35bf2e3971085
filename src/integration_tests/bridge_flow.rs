//! Full bridge runs: real queues, a real child, real pipes.

use std::{convert::Infallible, thread, time::Duration};

use nix::mqueue::MqAttr;

use super::util::{self, TestQueues};
use crate::Bridge;
use crate::comm::mqueue::{MessageQueue, QueueAccess};
use crate::runtime::error::BridgeError;

type BridgeThread = thread::JoinHandle<Result<Infallible, BridgeError>>;

/// Keep sending "7" until the bridge stops, and return its error.
/// Only stops once the child has closed its stdin.
fn feed_until_stopped(tx: &MessageQueue, handle: BridgeThread) -> BridgeError {
    util::wait_until("bridge to stop", Duration::from_secs(10), || {
        if handle.is_finished() {
            return true;
        }
        tx.send(b"7").expect("send 7");
        false
    });
    let Err(err) = handle.join().expect("bridge thread panicked");
    err
}

fn assert_broken_pipe(err: BridgeError) {
    match err {
        BridgeError::ChildInput(e) => assert_eq!(e.kind(), std::io::ErrorKind::BrokenPipe),
        e => panic!("unexpected error: {e}"),
    }
}

/// Commands 7 and 8 reach the child in order, 5 is dropped, and once the
/// child has gone the next forwarded command stops the bridge.
#[test]
fn forwards_commands_until_child_exits() {
    let queues = TestQueues::new("flow");
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("child_stdin.txt");
    let config = util::shell_config(&queues, &format!("head -n 2 > {}", util::quoted(&out)));

    let bridge = Bridge::new(config).expect("valid config");
    let handle = thread::spawn(move || bridge.run());

    let tx = MessageQueue::open_or_create(&queues.command, QueueAccess::Send).expect("open queue");
    tx.send(b"7").expect("send 7");
    tx.send(b"5").expect("send 5");
    tx.send(b"8").expect("send 8");

    assert_broken_pipe(feed_until_stopped(&tx, handle));
    let written = std::fs::read_to_string(&out).expect("read child output");
    assert_eq!(written, "onoff off 8888 3\nonoff on 8888 3\n");

    // The wakeword queue was created and left in place.
    MessageQueue::unlink(&queues.wakeword).expect("wakeword queue exists");
}

/// A child that cannot be found stops the bridge before any receive, with
/// both queues already created.
#[test]
fn missing_child_fails_at_startup() {
    let queues = TestQueues::new("missing");
    let mut config = util::shell_config(&queues, "true");
    config.child.program = "no-such-chip-tool-for-bridge-tests".to_string();

    let Err(err) = Bridge::new(config).expect("valid config").run();
    match err {
        BridgeError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
        e => panic!("unexpected error: {e}"),
    }
    MessageQueue::unlink(&queues.command).expect("command queue exists");
    MessageQueue::unlink(&queues.wakeword).expect("wakeword queue exists");
}

/// The child sees the configured TMPDIR, and no wakeword queue is created
/// when it is disabled.
#[test]
fn child_gets_tmpdir_override() {
    let queues = TestQueues::new("tmpdir");
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("tmpdir.txt");
    let mut config = util::shell_config(
        &queues,
        &format!("printf %s \"$TMPDIR\" > {}", util::quoted(&out)),
    );
    config.child.tmpdir = "/etc".to_string();
    config.wakeword_queue = String::new();

    let bridge = Bridge::new(config).expect("valid config");
    let handle = thread::spawn(move || bridge.run());

    util::wait_until("child to record TMPDIR", Duration::from_secs(10), || {
        std::fs::read_to_string(&out).is_ok_and(|s| s == "/etc")
    });

    let tx = MessageQueue::open_or_create(&queues.command, QueueAccess::Send).expect("open queue");
    assert_broken_pipe(feed_until_stopped(&tx, handle));
    assert!(MessageQueue::unlink(&queues.wakeword).is_err());
}

/// A producer that created the command queue first, with its own limits,
/// still drives the bridge byte by byte.
#[test]
fn producer_created_queue_is_used_as_is() {
    let queues = TestQueues::new("producer");
    let tx = MessageQueue::open_with_attr(&queues.command, QueueAccess::Send, &MqAttr::new(0, 4, 16, 0))
        .expect("producer creates queue");

    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("child_stdin.txt");
    let config = util::shell_config(&queues, &format!("head -n 2 > {}", util::quoted(&out)));
    let bridge = Bridge::new(config).expect("valid config");
    let handle = thread::spawn(move || bridge.run());

    tx.send(&[0x37]).expect("send 0x37");
    tx.send(&[0x35]).expect("send 0x35");
    tx.send(&[0x38]).expect("send 0x38");

    assert_broken_pipe(feed_until_stopped(&tx, handle));
    let written = std::fs::read_to_string(&out).expect("read child output");
    assert_eq!(written, "onoff off 8888 3\nonoff on 8888 3\n");
}

/// Ignored values never touch the child's stdin, so a child that has already
/// exited goes unnoticed until the first forwarded command, which is fatal.
#[test]
fn exited_child_fails_on_first_forwarded_command() {
    let queues = TestQueues::new("early_exit");
    let dir = tempfile::tempdir().expect("tempdir");
    let marker = dir.path().join("exited");
    let config = util::shell_config(&queues, &format!(": > {}; exit 0", util::quoted(&marker)));
    let bridge = Bridge::new(config).expect("valid config");
    let handle = thread::spawn(move || bridge.run());

    util::wait_until("child to run", Duration::from_secs(10), || marker.exists());
    let tx = MessageQueue::open_or_create(&queues.command, QueueAccess::Send).expect("open queue");
    tx.send(b"5").expect("send 5");
    tx.send(b"9").expect("send 9");
    thread::sleep(Duration::from_millis(300));
    assert!(!handle.is_finished(), "ignored values must not stop the bridge");

    assert_broken_pipe(feed_until_stopped(&tx, handle));
}
