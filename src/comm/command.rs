//! Command byte decoding.
//!
//! A message's first byte is an ASCII digit.  Its value is the byte minus
//! `b'0'`; nothing is validated, so any byte decodes to some value, and only
//! two values map to a command.

/// Value reported for an empty message.
pub const EMPTY_VALUE: i16 = -(b'0' as i16);

/// Decode the command value from the first byte of the message.
#[inline]
pub fn decode(message: &[u8]) -> i16 {
    match message.first() {
        Some(b) => *b as i16 - b'0' as i16,
        None => EMPTY_VALUE,
    }
}

/// The commands forwarded to the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Value 7.
    LightOff,
    /// Value 8.
    LightOn,
}

impl Command {
    pub fn from_value(value: i16) -> Option<Self> {
        match value {
            7 => Some(Command::LightOff),
            8 => Some(Command::LightOn),
            _ => None,
        }
    }

    /// The line sent to the child, without the trailing newline.
    pub fn line(&self) -> &'static str {
        match self {
            Command::LightOff => "onoff off 8888 3",
            Command::LightOn => "onoff on 8888 3",
        }
    }
}
