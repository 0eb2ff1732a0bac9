//! Error types for message layout, device I/O and configuration parsing

use thiserror::Error;

/// Errors from laying a message out over the display lines.
///
/// These are content faults: the caller handed over text the display cannot
/// show, so they are returned instead of being reported to a listener.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// A single word is wider than a display line; there is no hyphenation
    #[error("Word too long to fit in {chars_per_line} characters: '{line}'")]
    WordTooLong { line: String, chars_per_line: usize },

    /// The text needs more lines than the display has
    #[error("Could not display text '{text}'. It requires {required} lines, only {max_lines} available")]
    Overflow {
        text: String,
        required: usize,
        max_lines: usize,
    },
}

/// Errors raised by a device transport or by the device itself
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// Socket level failure (refused, reset, closed)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Modbus exception response
    #[error("Device exception: {0}")]
    Exception(String),

    /// Reader answered a command with a non-zero status
    #[error("Command rejected with status {status}: {message}")]
    Protocol { status: i32, message: String },

    #[error("Timeout after {0} ms")]
    Timeout(u64),

    #[error("Login failed")]
    LoginFailed,

    /// Reply could not be understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<std::io::Error> for DeviceError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::TimedOut => DeviceError::Timeout(0),
            _ => DeviceError::Transport(e.to_string()),
        }
    }
}

/// A device error together with where it happened.
///
/// This is what error listeners receive: the device's logical name (the
/// workstation name for the display), the operation that failed and the
/// underlying fault.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{device}: {operation} failed: {error}")]
pub struct DeviceFault {
    pub device: String,
    pub operation: &'static str,
    #[source]
    pub error: DeviceError,
}

impl DeviceFault {
    pub fn new(device: impl Into<String>, operation: &'static str, error: DeviceError) -> Self {
        DeviceFault {
            device: device.into(),
            operation,
            error,
        }
    }
}

/// Errors while loading translation rules or a dictionary file
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DictionaryError {
    /// Line is not of the form `key|value` (lines are 1-based)
    #[error("Dictionary line {line} has invalid format, expected 'key|value': '{content}'")]
    InvalidLine { line: usize, content: String },

    #[error("Invalid translation rule '{pattern}': {message}")]
    InvalidRule { pattern: String, message: String },
}

/// Errors that can occur when parsing discovery datagrams
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Response payload is not UTF-8
    #[error("Invalid string encoding")]
    InvalidString,
}
