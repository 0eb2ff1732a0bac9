//! Register payload encoding for the signage display.
//!
//! Every text slot on the display is a run of consecutive holding registers
//! of fixed size. Narrow slots pack two single-byte characters per word,
//! first character in the high byte. Wide slots carry one UTF-16 code unit
//! per word. Payloads are always padded to the full slot so a shorter text
//! overwrites whatever was shown before.

use serde::{Deserialize, Serialize};

/// Character encoding of a display text slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextEncoding {
    /// One byte per character, two characters per register
    #[default]
    Narrow,
    /// One UTF-16 code unit per register
    Wide,
}

const SPACE: u8 = 0x20;

/// Unused narrow register: two spaces
pub const NARROW_PAD_WORD: u16 = 0x2020;

/// Unused wide register: the space code unit.
///
/// Note this differs from [`NARROW_PAD_WORD`]; the display firmware expects
/// exactly this asymmetry.
pub const WIDE_PAD_WORD: u16 = 0x0020;

/// Number of registers a slot of `max_len` characters occupies
pub fn word_count(max_len: usize, encoding: TextEncoding) -> usize {
    match encoding {
        TextEncoding::Narrow => max_len.div_ceil(2),
        TextEncoding::Wide => max_len,
    }
}

/// Encode `text` into exactly [`word_count`] registers.
///
/// Text longer than `max_len` characters is truncated. In narrow mode
/// characters outside ASCII are replaced by `?`. In wide mode a character
/// outside the basic plane takes two code units and therefore two registers.
pub fn encode_text(text: &str, max_len: usize, encoding: TextEncoding) -> Vec<u16> {
    match encoding {
        TextEncoding::Narrow => encode_narrow(text, max_len),
        TextEncoding::Wide => encode_wide(text, max_len),
    }
}

fn encode_narrow(text: &str, max_len: usize) -> Vec<u16> {
    let bytes: Vec<u8> = text
        .chars()
        .take(max_len)
        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
        .collect();

    (0..max_len)
        .step_by(2)
        .map(|i| {
            let hi = bytes.get(i).copied().unwrap_or(SPACE);
            let lo = bytes.get(i + 1).copied().unwrap_or(SPACE);
            u16::from_be_bytes([hi, lo])
        })
        .collect()
}

fn encode_wide(text: &str, max_len: usize) -> Vec<u16> {
    let mut words: Vec<u16> = text.encode_utf16().take(max_len).collect();
    words.resize(max_len, WIDE_PAD_WORD);
    words
}

/// Decode narrow registers back into text, padding included
pub fn decode_narrow(words: &[u16]) -> String {
    words
        .iter()
        .flat_map(|w| w.to_be_bytes())
        .map(char::from)
        .collect()
}

/// Decode wide registers back into text, padding included
pub fn decode_wide(words: &[u16]) -> String {
    String::from_utf16_lossy(words)
}

/// Upper 16 bits of the IEEE-754 single precision form of `value`.
///
/// The background page register holds a float of which the display only
/// looks at the most significant word; small integers are exact in it.
pub fn float_high_word(value: f32) -> u16 {
    (value.to_bits() >> 16) as u16
}
