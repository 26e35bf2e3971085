// SPDX-License-Identifier: MIT

//! Manages the runtime execution of the child process, and the communication
//! with the process.
//!
//! The `bridge_child` function launches the child described by a `LaunchEnv`
//! and hands it to a `CommHandler`.  When the handler returns, the child is
//! killed if it is still running and reaped, and its exit code is returned.
//! The handler's own error takes precedence over the exit code.

pub mod error;
pub mod spawn;

pub use spawn::{Child, CommHandler, FdMode, FdSet, LaunchEnv};

#[cfg(target_os = "linux")]
mod spawn_linux;

#[cfg(target_os = "linux")]
pub fn bridge_child<CH: CommHandler>(
    env: LaunchEnv,
    handler: CH,
) -> Result<i32, error::BridgeError> {
    let child = spawn_linux::launch_child(env)?;
    let state = child.state();
    let err = handler.handle(Box::new(child));
    let ret = state.kill().map_err(error::BridgeError::from);
    if let Ok(code) = &ret {
        tracing::info!(exit_code = *code, "child process reaped");
    }
    err?;
    ret
}

#[cfg(not(target_os = "linux"))]
pub fn bridge_child<CH: CommHandler>(
    _env: LaunchEnv,
    _handler: CH,
) -> Result<i32, error::BridgeError> {
    Err(error::BridgeError::ProcessError(
        "child launching is only supported on Linux".to_string(),
    ))
}
