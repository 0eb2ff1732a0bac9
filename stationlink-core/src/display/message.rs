//! Fixed-size text slots (message lines and button labels)

use super::RegisterWrite;
use crate::codec::{encode_text, TextEncoding};

/// One text slot on the display.
///
/// Address and length are fixed at construction; only the text changes.
#[derive(Debug, Clone)]
pub struct DisplayMessage {
    address: u16,
    max_len: usize,
    encoding: TextEncoding,
    /// Text last written, `None` until the first write
    text: Option<String>,
}

impl DisplayMessage {
    pub fn new(address: u16, max_len: usize, encoding: TextEncoding) -> Self {
        DisplayMessage {
            address,
            max_len,
            encoding,
            text: None,
        }
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Record `text` and return the full-slot write for it
    pub fn set(&mut self, text: &str) -> RegisterWrite {
        self.text = Some(text.to_string());
        RegisterWrite {
            address: self.address,
            words: encode_text(text, self.max_len, self.encoding),
        }
    }

    /// Blank the slot, unless it holds no text already.
    ///
    /// Returns `None` when nothing non-empty was written since the last clear.
    pub fn clear(&mut self) -> Option<RegisterWrite> {
        match self.text.as_deref() {
            Some(text) if !text.is_empty() => Some(self.set("")),
            _ => None,
        }
    }

    /// Unconditionally blank the slot, as done right after connecting
    pub fn reset(&mut self) -> RegisterWrite {
        self.set("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::NARROW_PAD_WORD;

    #[test]
    fn test_set_writes_full_slot() {
        let mut slot = DisplayMessage::new(10018, 32, TextEncoding::Narrow);
        let write = slot.set("Hello");
        assert_eq!(write.address, 10018);
        assert_eq!(write.words.len(), 16);
        assert_eq!(slot.text(), Some("Hello"));
    }

    #[test]
    fn test_clear_is_noop_until_text_set() {
        let mut slot = DisplayMessage::new(10100, 32, TextEncoding::Narrow);
        assert!(slot.clear().is_none());

        slot.set("Hello");
        let write = slot.clear().unwrap();
        assert!(write.words.iter().all(|w| *w == NARROW_PAD_WORD));
        assert_eq!(slot.text(), Some(""));

        // Already blank
        assert!(slot.clear().is_none());
    }

    #[test]
    fn test_reset_always_writes() {
        let mut slot = DisplayMessage::new(10200, 14, TextEncoding::Wide);
        let write = slot.reset();
        assert_eq!(write.words.len(), 14);
        assert!(slot.clear().is_none());
    }
}
