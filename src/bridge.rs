// SPDX-License-Identifier: MIT

//! Ties the queues, the child process, and the dispatch loop together.

use std::{convert::Infallible, ffi::OsString, path::PathBuf};

use tracing::{error, info};

use crate::config::BridgeConfig;
use crate::dispatch::{CommandSource, Dispatcher};
use crate::runtime::{Child, CommHandler, FdSet, LaunchEnv, error::BridgeError};

/// The running shim: one command queue, one child, one loop.
pub struct Bridge {
    config: BridgeConfig,
}

impl Bridge {
    /// Validate the configuration and build the bridge.
    pub fn new(config: BridgeConfig) -> Result<Self, BridgeError> {
        config.validate()?;
        Ok(Bridge { config })
    }

    /// Describe the child launch: inherited environment with `TMPDIR`
    /// overridden, stdin piped, stderr merged into stdout.
    pub fn launch_env(&self) -> LaunchEnv {
        let child = &self.config.child;
        let mut overrides = Vec::new();
        if !child.tmpdir.is_empty() {
            overrides.push((OsString::from("TMPDIR"), OsString::from(&child.tmpdir)));
        }
        LaunchEnv {
            cmd: PathBuf::from(&child.program),
            args: child.args.iter().map(OsString::from).collect(),
            cwd: child.cwd.clone(),
            env: LaunchEnv::inherited_env(&overrides),
            fds: FdSet::interactive(),
        }
    }

    /// Open the queues, start the child, and forward commands until
    /// something fails.
    #[cfg(target_os = "linux")]
    pub fn run(self) -> Result<Infallible, BridgeError> {
        use crate::comm::mqueue::{MessageQueue, QueueAccess};

        // Held for the life of the loop so the queue exists for the wake
        // word engine.  Never read here.
        let _wakeword = match self.config.wakeword_queue() {
            Some(name) => Some(MessageQueue::open_or_create(name, QueueAccess::Both)?),
            None => None,
        };
        let commands = MessageQueue::open_or_create(&self.config.command_queue, QueueAccess::Both)?;
        info!(
            command_queue = %self.config.command_queue,
            wakeword_queue = self.config.wakeword_queue().unwrap_or("-"),
            program = %self.config.child.program,
            "bridge starting"
        );

        let code = crate::runtime::bridge_child(self.launch_env(), ForwardHandler::new(commands))?;
        Err(BridgeError::ProcessError(format!(
            "dispatch loop ended without error; child exit code {code}"
        )))
    }

    #[cfg(not(target_os = "linux"))]
    pub fn run(self) -> Result<Infallible, BridgeError> {
        Err(BridgeError::ProcessError(
            "POSIX message queues are only supported on Linux".to_string(),
        ))
    }
}

/// Runs the dispatch loop against the child's stdin.
pub struct ForwardHandler<S> {
    source: S,
}

impl<S: CommandSource> ForwardHandler<S> {
    pub fn new(source: S) -> Self {
        ForwardHandler { source }
    }
}

impl<S: CommandSource> CommHandler for ForwardHandler<S> {
    fn handle(self, mut child: Box<dyn Child>) -> Result<(), BridgeError> {
        let stdin = child
            .take_stream_to_child(0)
            .ok_or_else(|| BridgeError::ProcessError("child has no stdin stream".to_string()))?;
        let mut dispatcher = Dispatcher::new(self.source, stdin);
        let Err(err) = dispatcher.run();
        error!(%err, exit_status = ?child.exit_status(), "dispatch loop stopped");
        Err(err)
    }
}
