// SPDX-License-Identifier: MIT

//! Spawns the child process with fork + execve.
//! Specific to Linux.

mod fd;
mod launch;

pub(crate) use launch::launch_child;
