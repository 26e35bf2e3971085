// SPDX-License-Identifier: MIT

//! Construct file descriptors for the passing between the parent and child processes.

use std::{
    collections::HashSet,
    fs::File,
    os::fd::{AsRawFd, OwnedFd, RawFd},
};

use nix::{libc::dup2, unistd::pipe};

use crate::runtime::{
    error::BridgeError,
    spawn::{FdMode, FdSet},
};

pub struct ForkedFd {
    fds: Vec<FdForkMap>,
    aliases: Vec<FdAlias>,
    keep_fds: HashSet<nix::libc::c_int>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamDirection {
    ToChild,
    FromChild,
}

/// Maps the FD as requested that the child sees the connection + the stream to
/// talk with the child.
pub struct FdMap {
    pub dup_to: u32,
    pub stream: File,
    pub direction: StreamDirection,
}

/// An FD in the child that duplicates another child FD.
#[derive(Debug, Clone, Copy)]
struct FdAlias {
    dup_to: u32,
    source: u32,
}

impl ForkedFd {
    /// Construct the new forked FD mappings.
    /// This will construct the pipes as needed.
    pub fn new(config: FdSet) -> Result<Self, BridgeError> {
        let mut fds: Vec<FdForkMap> = Vec::new();
        let mut aliases: Vec<FdAlias> = Vec::new();
        let mut keep_fds: HashSet<nix::libc::c_int> = HashSet::new();

        for fd_m in config.modes() {
            match fd_m.mode {
                FdMode::Null => {}
                FdMode::KeepInChild => {
                    keep_fds.insert(fd_m.fd as nix::libc::c_int);
                }
                FdMode::SameAs(source) => {
                    aliases.push(FdAlias {
                        dup_to: fd_m.fd,
                        source,
                    });
                    keep_fds.insert(fd_m.fd as nix::libc::c_int);
                }
                FdMode::FromChild => {
                    let (read_fd, write_fd) = pipe()?;
                    fds.push(FdForkMap {
                        dup_to: fd_m.fd,
                        parent_fd: read_fd,
                        child_fd: write_fd,
                        direction: StreamDirection::FromChild,
                    });
                    keep_fds.insert(fd_m.fd as nix::libc::c_int);
                }
                FdMode::ToChild => {
                    let (read_fd, write_fd) = pipe()?;
                    fds.push(FdForkMap {
                        dup_to: fd_m.fd,
                        parent_fd: write_fd,
                        child_fd: read_fd,
                        direction: StreamDirection::ToChild,
                    });
                    keep_fds.insert(fd_m.fd as nix::libc::c_int);
                }
            }
        }
        Ok(ForkedFd {
            fds,
            aliases,
            keep_fds,
        })
    }

    /// Get the list of FDs that the child process will use.
    pub fn child_fd_list(&self) -> HashSet<nix::libc::c_int> {
        self.keep_fds.clone()
    }

    /// Called by the parent process after fork, to retrieve the parent process's version of the FDs.
    /// This will drop the child's end of the pipes.
    pub fn parent_after_fork(self) -> Vec<FdMap> {
        self.fds
            .into_iter()
            .map(FdForkMap::parent_after_fork)
            .collect()
    }

    /// Called by the child process after fork, to prepare the file descriptors.
    /// Because this must run after the fork, errors cause an immediate
    /// exit.  It must also be careful to not allocate memory.
    pub fn child_after_fork(self) {
        for fd in self.fds {
            fd.child_after_fork();
        }
        // Aliases run last, so they see the pipes already in place.
        for alias in self.aliases.iter() {
            let res = unsafe { dup2(alias.source as RawFd, alias.dup_to as RawFd) };
            if res < 0 {
                unsafe { nix::libc::_exit(253) };
            }
        }
    }
}

struct FdForkMap {
    dup_to: u32,
    /// FD used by the parent.
    parent_fd: OwnedFd,
    /// FD used by the child.
    child_fd: OwnedFd,
    direction: StreamDirection,
}

impl FdForkMap {
    /// Duplicate the child's pipe end onto dup_to.  Both pipe ends close when
    /// self drops at the end of this call.
    fn child_after_fork(self) {
        let res = unsafe { dup2(self.child_fd.as_raw_fd(), self.dup_to as RawFd) };
        // dup2 returns the new fd (dup_to) on success, and -1 on error.
        if res < 0 {
            unsafe { nix::libc::_exit(253) };
        }
    }

    // Hands the parent's pipe end over to a File; the child's end closes here.
    fn parent_after_fork(self) -> FdMap {
        FdMap {
            dup_to: self.dup_to,
            stream: File::from(self.parent_fd),
            direction: self.direction,
        }
    }
}
