// SPDX-License-Identifier: MIT

//! General model for spawning the child process and managing its state.

use std::{collections::HashMap, ffi::OsString, path::PathBuf};

use crate::runtime::error::BridgeError;

/// Handles communication to the child from the parent process.
///
/// The handler owns the child for as long as it runs.  When it returns,
/// the runtime reaps the child.
pub trait CommHandler {
    fn handle(self, child: Box<dyn Child>) -> Result<(), BridgeError>;
}

/// Simple method for communicating with the child process.
pub trait Child {
    /// Request a hard termination of the child process.
    fn terminate(&self) -> Result<(), std::io::Error>;

    /// Take the stream that receives from the child, as was marked with the child's FD.
    /// If called again with the same FD, this will return None.
    fn take_stream_from_child(&mut self, fd: u32) -> Option<Box<dyn std::io::Read>>;

    /// Take the stream that sends to the child, as was marked with the child's FD.
    /// If called again with the same FD, this will return None.
    fn take_stream_to_child(&mut self, fd: u32) -> Option<Box<dyn std::io::Write>>;

    /// Get the current exit status for the child process.
    fn exit_status(&self) -> Option<i32>;
}

/// Defines the required file descriptors used in the construction of the child process.
///
/// By default, STDIN is at index 0, STDOUT is at index 1, and STDERR is at index 2.
#[derive(Debug, Clone)]
pub struct FdSet {
    fds: Vec<Fd>,
}

/// The FD mode description, indicating the direction of data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FdMode {
    // The FD is closed in the child.
    Null,
    // The data flows from the parent to the child.
    ToChild,
    // The data flows from the child to the parent.
    FromChild,
    // The FD is kept open in the child without redirection.
    KeepInChild,
    // The FD is a duplicate of another FD the child sees, e.g. stderr into stdout.
    SameAs(u32),
}

/// A single file descriptor, which has an index and a direction.
#[derive(Debug, Clone)]
pub struct Fd {
    pub fd: u32,
    pub mode: FdMode,
}

impl FdSet {
    /// Create a new FdSet using mode definitions, one per slice index.
    /// That is, index 0 is assigned FD 0, index 1 to FD 1, and so on.
    pub fn basic(modes: &[FdMode]) -> Self {
        let fds = modes
            .iter()
            .enumerate()
            .map(|(i, mode)| Fd {
                fd: i as u32,
                mode: mode.clone(),
            })
            .collect();
        FdSet { fds }
    }

    /// Construct the file descriptors from the list of values.
    pub fn from_vec(fds: Vec<Fd>) -> Self {
        FdSet { fds }
    }

    /// The descriptors for an interactive control-plane child:
    ///     stdin (0): a stream that writes to the child.
    ///    stdout (1): inherited from this process.
    ///    stderr (2): merged into the child's stdout.
    pub fn interactive() -> Self {
        FdSet::basic(&[FdMode::ToChild, FdMode::KeepInChild, FdMode::SameAs(1)])
    }

    /// Retrieve the file descriptor modes used in the request.
    pub fn modes(&self) -> Vec<Fd> {
        self.fds.clone()
    }

    pub fn len(&self) -> usize {
        self.fds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fds.is_empty()
    }
}

/// Describes how to launch the child process.
pub struct LaunchEnv {
    pub cmd: PathBuf,
    pub args: Vec<OsString>,
    pub cwd: PathBuf,
    pub env: HashMap<OsString, OsString>,
    pub fds: FdSet,
}

impl LaunchEnv {
    /// Build the child environment from this process's environment, with the
    /// given overrides applied on top.
    pub fn inherited_env(overrides: &[(OsString, OsString)]) -> HashMap<OsString, OsString> {
        let mut env: HashMap<OsString, OsString> = std::env::vars_os().collect();
        for (key, val) in overrides {
            env.insert(key.clone(), val.clone());
        }
        env
    }
}
