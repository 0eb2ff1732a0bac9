//! Signage display model.
//!
//! The display is a Modbus-TCP slave. Everything it shows is driven by
//! writing holding registers and coils:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ background page (one register)               │
//! │                                              │
//! │   message line 1   ─┐                        │
//! │   message line 2    ├─ text slots (registers)│
//! │   message line 3   ─┘                        │
//! │                                              │
//! │  [label 1]   [label 2]   [label 3]           │
//! │   coil 10     coil 11     coil 12   pressed  │
//! └──────────────────────────────────────────────┘
//!   window coils select how many buttons are visible
//! ```
//!
//! Types in this module only compute what to write; the host applies the
//! writes over its Modbus session.

pub mod address;
pub mod button;
pub mod message;
pub mod page;
pub mod window;

pub use address::{AddressTable, DisplayMode};
pub use button::{Button, DisplayButton};
pub use message::DisplayMessage;
pub use page::{DisplayPage, Page};
pub use window::{plan_window, Window, WindowCoils, WindowPlan};

/// Modbus-TCP port the display listens on
pub const DISPLAY_PORT: u16 = 8000;

/// Modbus unit identifier of the display
pub const DISPLAY_UNIT_ID: u8 = 1;

/// Bounded wait for the display connect
pub const CONNECT_TIMEOUT_MS: u64 = 5000;

/// Number of message lines on the display
pub const MESSAGE_LINES: usize = 3;

/// Logical address reported before any session was opened
pub const UNDEFINED_IP: &str = "IP is undefined";

/// A block of holding registers to write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterWrite {
    pub address: u16,
    pub words: Vec<u16>,
}

/// A single coil to write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoilWrite {
    pub address: u16,
    pub value: bool,
}

impl CoilWrite {
    pub fn on(address: u16) -> Self {
        CoilWrite {
            address,
            value: true,
        }
    }

    pub fn off(address: u16) -> Self {
        CoilWrite {
            address,
            value: false,
        }
    }
}
