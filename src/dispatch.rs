// SPDX-License-Identifier: MIT

//! The dispatch loop.
//!
//! One blocking receive at a time: receive a message, decode its first byte,
//! and for a recognised command write the command's line to the child's
//! stdin and flush it before the next receive.  Nothing is retried; the first
//! receive or write error ends the loop.

use std::convert::Infallible;

use tracing::{debug, info};

use crate::comm::{
    command::{self, Command},
    line,
};
use crate::runtime::error::BridgeError;

/// A blocking supplier of command messages.
pub trait CommandSource {
    /// Block until the next message is available.
    fn receive(&mut self) -> Result<Vec<u8>, BridgeError>;
}

#[cfg(target_os = "linux")]
impl CommandSource for crate::comm::mqueue::MessageQueue {
    fn receive(&mut self) -> Result<Vec<u8>, BridgeError> {
        crate::comm::mqueue::MessageQueue::receive(self)
    }
}

/// Owns the command source and the child's input stream.
pub struct Dispatcher<S, W: ?Sized> {
    source: S,
    out: Box<W>,
}

impl<S: CommandSource, W: std::io::Write + ?Sized> Dispatcher<S, W> {
    pub fn new(source: S, out: Box<W>) -> Self {
        Dispatcher { source, out }
    }

    /// Receive and handle exactly one message.
    ///
    /// Returns the command that was forwarded, if any.
    pub fn step(&mut self) -> Result<Option<Command>, BridgeError> {
        let message = self.source.receive()?;
        let value = command::decode(&message);
        info!(value, "command received");

        let Some(cmd) = Command::from_value(value) else {
            debug!(value, "no command mapped, ignoring");
            return Ok(None);
        };
        line::write_line(&mut *self.out, cmd.line().as_bytes())
            .map_err(BridgeError::ChildInput)?;
        debug!(?cmd, line = cmd.line(), "command forwarded to child");
        Ok(Some(cmd))
    }

    /// Run until the first error.
    pub fn run(&mut self) -> Result<Infallible, BridgeError> {
        loop {
            self.step()?;
        }
    }
}
