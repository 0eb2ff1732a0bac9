//! # Stationlink Core
//!
//! Platform-independent protocol logic for a workstation that drives two
//! field devices: a Modbus-TCP signage display (background page, three
//! message lines, three illuminated pushbuttons) and a network barcode
//! reader speaking DMCC text commands.
//!
//! This crate contains pure encoding, layout and state logic with **zero I/O
//! dependencies**. Sockets, timers and tasks live in `stationlink-host`.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  stationlink-core (platform-independent, no tokio/async)   │
//! │  ├── codec/       (text and page → register words)        │
//! │  ├── layout/      (message line splitting)                 │
//! │  ├── display/     (pages, slots, buttons, window plans)    │
//! │  ├── reader/      (read filter, presets, allow-list)       │
//! │  ├── discovery/   (broadcast probe and response parsing)   │
//! │  ├── translate/   (translator port, rule + dictionary)     │
//! │  └── connection/  (session state machine)                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              ▲
//!                 ┌────────────┴────────────┐
//!                 │  stationlink-host       │
//!                 │  (tokio, tokio-modbus)  │
//!                 └─────────────────────────┘
//! ```
//!
//! ## Example: Encoding a message line
//!
//! ```rust
//! use stationlink_core::codec::{encode_text, TextEncoding};
//!
//! let words = encode_text("OK", 4, TextEncoding::Narrow);
//! assert_eq!(words, vec![0x4F4B, 0x2020]);
//! ```
//!
//! ## Example: Splitting a message over the display lines
//!
//! ```rust
//! use stationlink_core::layout::split_message;
//!
//! let lines = split_message("Scan the next\npart", 3, 32).unwrap();
//! assert_eq!(lines, vec!["Scan the next", "part"]);
//! ```

pub mod codec;
pub mod connection;
pub mod discovery;
pub mod display;
pub mod error;
pub mod layout;
pub mod reader;
pub mod translate;

// Re-export commonly used types
pub use codec::TextEncoding;
pub use connection::{SessionState, SessionTracker};
pub use display::{AddressTable, Button, DisplayMode, Page, Window, WindowPlan};
pub use error::{DeviceError, DeviceFault, DictionaryError, LayoutError, ParseError};
pub use reader::{ReadDecision, ReadFilter, ReaderType};
pub use translate::{RuleTranslator, Translation, Translator};
