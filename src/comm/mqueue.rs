// SPDX-License-Identifier: MIT

//! POSIX named message queues.
//!
//! Queues are opened with `O_CREAT`, owner read/write permissions, and the
//! system default attributes, so whichever side starts first creates the
//! queue.  An existing queue keeps the attributes it was created with.
//! Receives block until a message arrives.

use std::path::Path;

use nix::{
    mqueue::{
        MQ_OFlag, MqAttr, MqdT, mq_attr_member_t, mq_close, mq_getattr, mq_open, mq_receive,
        mq_send, mq_unlink,
    },
    sys::stat::Mode,
};
use tracing::debug;

use crate::runtime::error::BridgeError;

const MSG_DEFAULT_PATH: &str = "/proc/sys/fs/mqueue/msg_default";
const MSGSIZE_DEFAULT_PATH: &str = "/proc/sys/fs/mqueue/msgsize_default";

// Kernel defaults, used when /proc/sys/fs/mqueue is not readable.
const FALLBACK_MAXMSG: mq_attr_member_t = 10;
const FALLBACK_MSGSIZE: mq_attr_member_t = 8192;

/// Read one positive integer tunable, falling back when absent or malformed.
fn read_tunable(path: &Path, fallback: mq_attr_member_t) -> mq_attr_member_t {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|text| text.trim().parse::<mq_attr_member_t>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(fallback)
}

/// Attributes a newly created queue gets: the system's default depth and
/// message size.
///
/// These have to be passed explicitly; `mq_open` with `O_CREAT` and no
/// attributes does not reach the kernel with valid arguments.
pub fn default_attr() -> MqAttr {
    MqAttr::new(
        0,
        read_tunable(Path::new(MSG_DEFAULT_PATH), FALLBACK_MAXMSG),
        read_tunable(Path::new(MSGSIZE_DEFAULT_PATH), FALLBACK_MSGSIZE),
        0,
    )
}

/// Direction the queue is opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueAccess {
    Receive,
    Send,
    Both,
}

impl QueueAccess {
    fn flags(self) -> MQ_OFlag {
        let dir = match self {
            QueueAccess::Receive => MQ_OFlag::O_RDONLY,
            QueueAccess::Send => MQ_OFlag::O_WRONLY,
            QueueAccess::Both => MQ_OFlag::O_RDWR,
        };
        dir | MQ_OFlag::O_CREAT | MQ_OFlag::O_CLOEXEC
    }
}

/// An open message queue descriptor.  Closed on drop.
pub struct MessageQueue {
    name: String,
    mqd: Option<MqdT>,
    msg_size: usize,
}

impl MessageQueue {
    /// Open the named queue, creating it if it does not exist.
    pub fn open_or_create(name: &str, access: QueueAccess) -> Result<Self, BridgeError> {
        Self::open_with_attr(name, access, &default_attr())
    }

    /// Open the named queue, creating it with `attr` if it does not exist.
    pub fn open_with_attr(
        name: &str,
        access: QueueAccess,
        attr: &MqAttr,
    ) -> Result<Self, BridgeError> {
        let mode = Mode::S_IRUSR | Mode::S_IWUSR;
        let mqd = mq_open(name, access.flags(), mode, Some(attr))
            .map_err(|e| BridgeError::queue(name, e))?;
        let attr = mq_getattr(&mqd).map_err(|e| BridgeError::queue(name, e))?;
        let msg_size = usize::try_from(attr.msgsize()).map_err(|_| {
            BridgeError::queue(
                name,
                std::io::Error::new(std::io::ErrorKind::InvalidData, "negative message size"),
            )
        })?;
        debug!(queue = name, msg_size, max_msgs = attr.maxmsg(), "message queue opened");
        Ok(MessageQueue {
            name: name.to_string(),
            mqd: Some(mqd),
            msg_size,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[cfg(test)]
    fn msg_size(&self) -> usize {
        self.msg_size
    }

    fn mqd(&self) -> Result<&MqdT, BridgeError> {
        self.mqd.as_ref().ok_or_else(|| {
            BridgeError::queue(
                &self.name,
                std::io::Error::new(std::io::ErrorKind::NotConnected, "queue closed"),
            )
        })
    }

    /// Block until the next message arrives, and return its payload.
    pub fn receive(&self) -> Result<Vec<u8>, BridgeError> {
        let mqd = self.mqd()?;
        let mut buf = vec![0u8; self.msg_size];
        let mut prio = 0u32;
        let len = mq_receive(mqd, &mut buf, &mut prio)
            .map_err(|e| BridgeError::queue(&self.name, e))?;
        buf.truncate(len);
        Ok(buf)
    }

    /// Send one message at priority 0, blocking while the queue is full.
    pub fn send(&self, payload: &[u8]) -> Result<(), BridgeError> {
        let mqd = self.mqd()?;
        mq_send(mqd, payload, 0).map_err(|e| BridgeError::queue(&self.name, e))
    }

    /// Remove the queue name from the system.  Open descriptors stay usable.
    pub fn unlink(name: &str) -> Result<(), BridgeError> {
        mq_unlink(name).map_err(|e| BridgeError::queue(name, e))
    }

    /// Remove the queue name if it exists.  Returns whether it existed.
    pub fn remove_if_exists(name: &str) -> Result<bool, BridgeError> {
        match mq_unlink(name) {
            Ok(()) => Ok(true),
            Err(nix::errno::Errno::ENOENT) => Ok(false),
            Err(e) => Err(BridgeError::queue(name, e)),
        }
    }
}

impl Drop for MessageQueue {
    fn drop(&mut self) {
        if let Some(mqd) = self.mqd.take() {
            let _ = mq_close(mqd);
        }
    }
}
