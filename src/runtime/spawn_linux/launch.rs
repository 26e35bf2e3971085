// SPDX-License-Identifier: MIT

//! Launch the child process.

use std::{
    collections::{HashMap, HashSet},
    ffi::{CString, OsStr},
    os::unix::ffi::OsStrExt as _,
    sync::{Arc, Mutex},
};

use nix::{
    sys::{
        signal::{Signal, kill},
        wait::{WaitPidFlag, WaitStatus, waitpid},
    },
    unistd::{ForkResult, Pid},
};
use tracing::{debug, info};

use crate::runtime::{
    error::BridgeError,
    spawn::{Child, LaunchEnv},
    spawn_linux::fd::{FdMap, ForkedFd, StreamDirection},
};

pub struct LinuxChild {
    state: LinuxChildState,
    fds: HashMap<u32, FdMap>,
}

impl LinuxChild {
    pub(crate) fn state(&self) -> LinuxChildState {
        self.state.clone()
    }
}

/// Handle the child process launching.
pub fn launch_child(env: LaunchEnv) -> Result<LinuxChild, BridgeError> {
    // Everything that allocates happens before the fork; the child may only
    // call async-signal-safe functions until execve.
    let exec_path = which::which(&env.cmd)?;
    debug!(cmd = %env.cmd.display(), resolved = %exec_path.display(), "resolved child executable");
    let fd_set = ForkedFd::new(env.fds)?;
    let exec_c = CString::new(exec_path.as_os_str().as_bytes())?;
    let exec_c = exec_c.as_c_str();
    let cwd = CString::new(env.cwd.as_os_str().as_bytes())?;
    let cwd = cwd.as_c_str();

    // argv[0] is the name the command was requested under.
    let arg0 = env
        .cmd
        .file_name()
        .unwrap_or_else(|| OsStr::new("child"));
    let mut args = vec![CString::new(arg0.as_bytes())?];
    for arg in env.args.iter() {
        args.push(CString::new(arg.as_bytes())?);
    }
    let args = args.as_slice();
    let mut environ = Vec::with_capacity(env.env.len());
    for (key, val) in env.env.iter() {
        let mut entry = key.clone();
        entry.push("=");
        entry.push(val);
        environ.push(CString::new(entry.as_bytes())?);
    }
    let environ = environ.as_slice();
    let child_fds = fd_set.child_fd_list();

    match unsafe { nix::unistd::fork() } {
        Err(e) => Err(BridgeError::Io(e.into())),
        Ok(ForkResult::Child) => {
            fd_set.child_after_fork();

            if nix::unistd::chdir(cwd).is_err() {
                unsafe { nix::libc::_exit(253) };
            }

            close_open_fds(&child_fds);

            // This process ignores SIGPIPE, and ignored dispositions survive
            // execve.  The child starts with the default.
            unsafe { nix::libc::signal(nix::libc::SIGPIPE, nix::libc::SIG_DFL) };

            let _ = nix::unistd::execve(exec_c, args, environ);
            // To reach here means the exec failed.
            unsafe { nix::libc::_exit(254) };
        }
        Ok(ForkResult::Parent { child }) => {
            let fds = fd_set.parent_after_fork();
            info!(pid = child.as_raw(), cmd = %exec_path.display(), "child process started");
            Ok(LinuxChild {
                state: LinuxChildState::new(child),
                fds: fd_map(fds),
            })
        }
    }
}

impl Child for LinuxChild {
    fn terminate(&self) -> Result<(), std::io::Error> {
        self.state.kill().and(Ok(()))
    }

    fn take_stream_from_child(&mut self, fd: u32) -> Option<Box<dyn std::io::Read>> {
        match self.fds.remove(&fd) {
            Some(fd) if fd.direction == StreamDirection::FromChild => Some(Box::new(fd.stream)),
            _ => None,
        }
    }

    fn take_stream_to_child(&mut self, fd: u32) -> Option<Box<dyn std::io::Write>> {
        match self.fds.remove(&fd) {
            Some(fd) if fd.direction == StreamDirection::ToChild => Some(Box::new(fd.stream)),
            _ => None,
        }
    }

    fn exit_status(&self) -> Option<i32> {
        self.state.exit_code()
    }
}

fn fd_map(src: Vec<FdMap>) -> HashMap<u32, FdMap> {
    src.into_iter().map(|f| (f.dup_to, f)).collect()
}

/// Close all open file descriptors except those listed.
/// Walking /proc/self/fd would allocate, so this sweeps up to the
/// descriptor limit instead.
fn close_open_fds(except: &HashSet<nix::libc::c_int>) {
    let max_fd = match nix::unistd::sysconf(nix::unistd::SysconfVar::OPEN_MAX) {
        Ok(Some(n)) => n as nix::libc::c_int,
        _ => 1024,
    };
    for fd in 0..max_fd {
        if !except.contains(&fd) {
            // Already-closed FDs report an error, which is fine.
            let _ = unsafe { nix::libc::close(fd) };
        }
    }
}

/// Exit code reported for a child terminated by a signal, shell style.
fn signal_exit_code(sig: Signal) -> i32 {
    128 + sig as i32
}

/// Structure that allows querying the state of a launched Linux child process,
/// outside the CommHandler use.
#[derive(Clone)]
pub(crate) struct LinuxChildState {
    pid: Pid,
    exit_code: Arc<Mutex<Option<i32>>>,
}

impl LinuxChildState {
    pub(crate) fn new(pid: Pid) -> Self {
        LinuxChildState {
            pid,
            exit_code: Arc::new(Mutex::new(None)),
        }
    }

    /// Non-blocking check of the child's exit code.
    pub(crate) fn exit_code(&self) -> Option<i32> {
        let mut c = self.exit_code.lock().ok()?;
        if c.is_none() {
            *c = match waitpid(self.pid, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::Exited(_pid, ec)) => Some(ec),
                Ok(WaitStatus::Signaled(_pid, sig, _core)) => Some(signal_exit_code(sig)),
                // Still alive, or not ours to wait on.
                _ => None,
            };
        }
        *c
    }

    /// Kill the child if it is still running, and reap it.
    pub(crate) fn kill(&self) -> Result<i32, std::io::Error> {
        let mut ec = self
            .exit_code
            .lock()
            .map_err(|_| std::io::Error::other("lock poisoned"))?;
        if let Some(c) = *ec {
            return Ok(c);
        }

        match kill(self.pid, Signal::SIGKILL) {
            // ESRCH: it already exited but has not been reaped yet.
            Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
            Err(e) => {
                return Err(std::io::Error::other(format!(
                    "failed terminating child {}: {:?}",
                    self.pid, e
                )));
            }
        }

        loop {
            match waitpid(self.pid, None)? {
                WaitStatus::Exited(_pid, c) => {
                    *ec = Some(c);
                    return Ok(c);
                }
                WaitStatus::Signaled(_pid, sig, _core) => {
                    let c = signal_exit_code(sig);
                    *ec = Some(c);
                    return Ok(c);
                }
                // Stop/continue notifications; keep waiting for the exit.
                _ => continue,
            }
        }
    }
}
