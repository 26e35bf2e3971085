//! Utility helpers for running the tests.

use std::{
    path::Path,
    thread,
    time::{Duration, Instant},
};

use crate::comm::mqueue::MessageQueue;
use crate::config::{BridgeConfig, ChildConfig};

/// Queue names unique to this test process, removed on drop.
pub struct TestQueues {
    pub command: String,
    pub wakeword: String,
}

impl TestQueues {
    pub fn new(tag: &str) -> Self {
        let pid = std::process::id();
        TestQueues {
            command: format!("/chiptool_bridge_it_{tag}_cmd_{pid}"),
            wakeword: format!("/chiptool_bridge_it_{tag}_ww_{pid}"),
        }
    }
}

impl Drop for TestQueues {
    fn drop(&mut self) {
        let _ = MessageQueue::unlink(&self.command);
        let _ = MessageQueue::unlink(&self.wakeword);
    }
}

/// A bridge configuration whose child is a shell script.
pub fn shell_config(queues: &TestQueues, script: &str) -> BridgeConfig {
    BridgeConfig {
        command_queue: queues.command.clone(),
        wakeword_queue: queues.wakeword.clone(),
        child: ChildConfig {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            cwd: ".".into(),
            tmpdir: String::new(),
        },
    }
}

/// Shell-quote a path for use in a `sh -c` script.
pub fn quoted(path: &Path) -> String {
    format!("'{}'", path.display())
}

/// Poll until the condition holds, or panic after the timeout.
pub fn wait_until<F: FnMut() -> bool>(what: &str, timeout: Duration, mut cond: F) {
    let start = Instant::now();
    while !cond() {
        assert!(start.elapsed() < timeout, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(10));
    }
}
