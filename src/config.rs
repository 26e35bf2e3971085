//! Bridge configuration.
//!
//! Every field has a default matching the stock voice UI deployment, so an
//! empty TOML document (or no file at all) yields a working configuration.
//!
//! ```toml
//! command_queue = "/command_queue"
//! wakeword_queue = "/wakeword_queue"
//!
//! [child]
//! program = "chip-tool"
//! args = ["interactive", "start"]
//! cwd = "."
//! tmpdir = "/etc"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::runtime::error::BridgeError;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct BridgeConfig {
    /// Queue the command bytes arrive on.
    #[serde(default = "default_command_queue")]
    pub command_queue: String,
    /// Queue created alongside the command queue for the wake word engine.
    /// Held open but never read.  An empty name skips it.
    #[serde(default = "default_wakeword_queue")]
    pub wakeword_queue: String,
    #[serde(default)]
    pub child: ChildConfig,
}

/// How to launch the control-plane child.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct ChildConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    #[serde(default = "default_cwd")]
    pub cwd: PathBuf,
    /// Value of `TMPDIR` in the child's environment.  chip-tool keeps its
    /// storage there.  Empty leaves the inherited value alone.
    #[serde(default = "default_tmpdir")]
    pub tmpdir: String,
}

fn default_command_queue() -> String {
    "/command_queue".to_string()
}

fn default_wakeword_queue() -> String {
    "/wakeword_queue".to_string()
}

fn default_program() -> String {
    "chip-tool".to_string()
}

fn default_args() -> Vec<String> {
    vec!["interactive".to_string(), "start".to_string()]
}

fn default_cwd() -> PathBuf {
    PathBuf::from(".")
}

fn default_tmpdir() -> String {
    "/etc".to_string()
}

impl Default for ChildConfig {
    fn default() -> Self {
        ChildConfig {
            program: default_program(),
            args: default_args(),
            cwd: default_cwd(),
            tmpdir: default_tmpdir(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            command_queue: default_command_queue(),
            wakeword_queue: default_wakeword_queue(),
            child: ChildConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Config` if the document is malformed or fails
    /// validation.
    pub fn from_toml_str(text: &str) -> Result<Self, BridgeError> {
        let config: BridgeConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read the configuration file.
    pub fn load(path: &Path) -> Result<Self, BridgeError> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            BridgeError::Config(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// The wakeword queue name, if enabled.
    pub fn wakeword_queue(&self) -> Option<&str> {
        if self.wakeword_queue.is_empty() {
            None
        } else {
            Some(&self.wakeword_queue)
        }
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        validate_queue_name("command_queue", &self.command_queue)?;
        if let Some(name) = self.wakeword_queue() {
            validate_queue_name("wakeword_queue", name)?;
            if name == self.command_queue {
                return Err(BridgeError::Config(
                    "wakeword_queue must differ from command_queue".to_string(),
                ));
            }
        }
        if self.child.program.trim().is_empty() {
            return Err(BridgeError::Config("child.program is empty".to_string()));
        }
        Ok(())
    }
}

/// POSIX queue names are a leading `/` followed by at least one character,
/// with no further slashes.
fn validate_queue_name(field: &str, name: &str) -> Result<(), BridgeError> {
    let valid = name
        .strip_prefix('/')
        .is_some_and(|rest| !rest.is_empty() && !rest.contains('/') && !rest.contains('\0'));
    if valid {
        Ok(())
    } else {
        Err(BridgeError::Config(format!(
            "{field} {name:?} must be '/' followed by a name without slashes"
        )))
    }
}
