//! # chiptool-bridge
//!
//! Listens on a POSIX message queue for single-digit commands and forwards
//! the recognised ones as text lines to an interactive `chip-tool` child.

pub mod bridge;
pub mod comm;
pub mod config;
pub mod dispatch;
pub mod runtime;


pub use bridge::{Bridge, ForwardHandler};
pub use config::{BridgeConfig, ChildConfig};
pub use dispatch::{CommandSource, Dispatcher};
pub use runtime::{Child, CommHandler, FdMode, FdSet, LaunchEnv, bridge_child, error::BridgeError};
