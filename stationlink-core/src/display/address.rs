//! Register and coil map of the display.
//!
//! The display firmware exists in three flavours: a narrow one, a wide
//! (unicode) one, and a translated one that uses the wide register map with
//! shorter message lines and its own set of window coils.
//!
//! | item                 | narrow               | wide / translated    |
//! |----------------------|----------------------|----------------------|
//! | background page      | 10010                | 10010                |
//! | message slots        | 10018, 10100, 10150  | 10200, 10250, 10300  |
//! | message length       | 32                   | 32 / 14              |
//! | label slots (len 10) | 10050, 10060, 10070  | 10050, 10080, 10110  |
//! | button coils         | 10, 11, 12           | 10, 11, 12           |
//! | window coils         | -, 1, 2, 3           | -, 1, 2, 3 / 4..7    |

use serde::{Deserialize, Serialize};

use super::button::LABEL_LEN;
use super::WindowCoils;
use crate::codec::TextEncoding;

const BACKGROUND_REGISTER: u16 = 10010;
const BUTTON_COILS: [u16; 3] = [10, 11, 12];

const NARROW_MESSAGES: [u16; 3] = [10018, 10100, 10150];
const NARROW_LABELS: [u16; 3] = [10050, 10060, 10070];
const WIDE_MESSAGES: [u16; 3] = [10200, 10250, 10300];
const WIDE_LABELS: [u16; 3] = [10050, 10080, 10110];

const MESSAGE_LEN: usize = 32;
const TRANSLATED_MESSAGE_LEN: usize = 14;

/// Display flavour flags, as configured per workstation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMode {
    /// Wide (UTF-16) text encoding
    pub unicode: bool,
    /// Messages and labels go through the translator
    pub translate: bool,
}

/// Addresses resolved once from a [`DisplayMode`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressTable {
    pub background: u16,
    pub messages: [u16; 3],
    pub message_len: usize,
    pub labels: [u16; 3],
    pub label_len: usize,
    pub buttons: [u16; 3],
    pub windows: WindowCoils,
    pub encoding: TextEncoding,
}

impl AddressTable {
    pub fn resolve(mode: DisplayMode) -> Self {
        let wide_map = mode.unicode || mode.translate;

        AddressTable {
            background: BACKGROUND_REGISTER,
            messages: if wide_map { WIDE_MESSAGES } else { NARROW_MESSAGES },
            message_len: if mode.translate {
                TRANSLATED_MESSAGE_LEN
            } else {
                MESSAGE_LEN
            },
            labels: if wide_map { WIDE_LABELS } else { NARROW_LABELS },
            label_len: LABEL_LEN,
            buttons: BUTTON_COILS,
            windows: if mode.translate {
                WindowCoils::TRANSLATED
            } else {
                WindowCoils::PLAIN
            },
            encoding: if mode.unicode {
                TextEncoding::Wide
            } else {
                TextEncoding::Narrow
            },
        }
    }

    /// Every window coil of both layouts, released on connect
    pub fn all_window_coils() -> [u16; 7] {
        [1, 2, 3, 4, 5, 6, 7]
    }
}
