//! Illuminated pushbuttons

use serde::{Deserialize, Serialize};

/// Default interval between two polls of a button coil
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Length of a button label slot in characters
pub const LABEL_LEN: usize = 10;

/// The three pushbuttons, left to right
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Button {
    One,
    Two,
    Three,
}

impl Button {
    pub const ALL: [Button; 3] = [Button::One, Button::Two, Button::Three];

    /// Zero-based position
    pub fn index(&self) -> usize {
        match self {
            Button::One => 0,
            Button::Two => 1,
            Button::Three => 2,
        }
    }

    /// One-based number as printed next to the button
    pub fn number(&self) -> u8 {
        self.index() as u8 + 1
    }
}

impl std::fmt::Display for Button {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "button {}", self.number())
    }
}

impl TryFrom<u8> for Button {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        match n {
            1 => Ok(Button::One),
            2 => Ok(Button::Two),
            3 => Ok(Button::Three),
            _ => Err(format!("Unknown button: {} (expected 1, 2 or 3)", n)),
        }
    }
}

/// What a button is bound to and where it lives on the bus.
///
/// Whether the button is polled is owned by the host's poller.
#[derive(Debug, Clone)]
pub struct DisplayButton {
    button: Button,
    /// Coil the display sets while the button is pressed
    coil: u16,
    poll_interval_ms: u64,
    /// Command reported when pressed; empty means unbound
    command: String,
    label: String,
}

impl DisplayButton {
    pub fn new(button: Button, coil: u16, poll_interval_ms: u64) -> Self {
        DisplayButton {
            button,
            coil,
            poll_interval_ms,
            command: String::new(),
            label: String::new(),
        }
    }

    pub fn button(&self) -> Button {
        self.button
    }

    pub fn coil(&self) -> u16 {
        self.coil
    }

    pub fn poll_interval_ms(&self) -> u64 {
        self.poll_interval_ms
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn bind(&mut self, command: &str, label: &str) {
        self.command = command.to_string();
        self.label = label.to_string();
    }

    /// `(command, label)` to report for a press, `None` while unbound
    pub fn press(&self) -> Option<(String, String)> {
        if self.command.is_empty() {
            None
        } else {
            Some((self.command.clone(), self.label.clone()))
        }
    }
}
