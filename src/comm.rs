//! # Communications Library
//!
//! Commands arrive as single-byte messages on a POSIX message queue, and
//! leave as newline-terminated text lines on the child's stdin.

pub mod command;
pub mod line;

#[cfg(target_os = "linux")]
pub mod mqueue;
