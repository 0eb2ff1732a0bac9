//! Barcode reader model: reader types, power presets, the command
//! allow-list and the duplicate-read filter.

use serde::{Deserialize, Serialize};
use unicase::UniCase;

/// Reply returned by a send that never reached the reader
pub const NOT_SENT: &str = "Not sent";

/// Address reported before the first connect
pub const UNDEFINED_IP: &str = "Undefined IP Address";

/// DMCC login used by the readers on the line
pub const DEFAULT_USER: &str = "admin";
pub const DEFAULT_PASSWORD: &str = "";

/// Window in which a fixed reader's repeated read counts as a duplicate
pub const SUPPRESSION_WINDOW_MS: u64 = 4000;

/// Connect and send are each tried at most this many times
pub const MAX_ATTEMPTS: u32 = 2;

/// Selects read-string result reporting
pub const RESULT_TYPE_COMMAND: &str = "SET DATA.RESULT-TYPE 1";

const VALID_COMMANDS: [&str; 5] = [
    "GET DEVICE.TYPE",
    "TRIGGER ON",
    "TRIGGER OFF",
    "GET DEVICE.SERIAL-NUMBER",
    "GET RESULT",
];

const HANDHELD_ON: [&str; 3] = ["SET BEEP.GOOD 1 1", "SET LIGHT.AIMER 3", "SET TRIGGER.TYPE 2"];
const HANDHELD_OFF: [&str; 2] = ["SET BEEP.GOOD 0 1", "SET LIGHT.AIMER 0"];
const FIXED_ON: [&str; 3] = ["SET BEEP.GOOD 3 2", "SET LIGHT.AIMER 1", "SET TRIGGER.TYPE 1"];
const FIXED_OFF: [&str; 3] = ["SET TRIGGER.TYPE 0", "SET LIGHT.AIMER 0", "SET BEEP.GOOD 0 0"];

/// Kind of reader attached to the workstation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReaderType {
    #[default]
    Handheld,
    /// Mounted over the conveyor, triggers by itself
    Fixed,
}

impl ReaderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReaderType::Handheld => "Handheld",
            ReaderType::Fixed => "Fixed",
        }
    }

    /// Commands that switch the scanner on or off
    pub fn power_preset(&self, on: bool) -> &'static [&'static str] {
        match (self, on) {
            (ReaderType::Handheld, true) => &HANDHELD_ON,
            (ReaderType::Handheld, false) => &HANDHELD_OFF,
            (ReaderType::Fixed, true) => &FIXED_ON,
            (ReaderType::Fixed, false) => &FIXED_OFF,
        }
    }

    /// Fixed readers see the same label several times as it passes
    pub fn suppresses_duplicates(&self) -> bool {
        matches!(self, ReaderType::Fixed)
    }
}

impl std::fmt::Display for ReaderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for ReaderType {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_ascii_lowercase().as_str() {
            "handheld" => Ok(ReaderType::Handheld),
            "fixed" => Ok(ReaderType::Fixed),
            _ => Err(format!("Unknown reader type: {}", s)),
        }
    }
}

/// Whether `cmd` is one of the commands operators may send directly.
///
/// Advisory only: [`NOT_SENT`] and the send path do not consult it.
pub fn is_command_valid(cmd: &str) -> bool {
    let cmd = UniCase::new(cmd);
    VALID_COMMANDS.iter().any(|c| UniCase::new(*c) == cmd)
}

/// Outcome of filtering one incoming read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadDecision {
    /// Deliver `text`; when `restart_window` is set the suppression window
    /// must be (re)started
    Forward { text: String, restart_window: bool },
    /// Same code as the last accepted read while the window is open
    Duplicate,
    /// Scanner is switched off
    PoweredOff,
}

/// Duplicate-read filter.
///
/// A fixed reader reports the same code repeatedly while a part passes under
/// it. The last accepted code is remembered until the suppression window
/// elapses ([`ReadFilter::expire`]); repeats of it are dropped meanwhile.
#[derive(Debug, Clone, Default)]
pub struct ReadFilter {
    reader_type: ReaderType,
    last_accepted: Option<String>,
}

impl ReadFilter {
    pub fn new(reader_type: ReaderType) -> Self {
        ReadFilter {
            reader_type,
            last_accepted: None,
        }
    }

    pub fn reader_type(&self) -> ReaderType {
        self.reader_type
    }

    pub fn last_accepted(&self) -> Option<&str> {
        self.last_accepted.as_deref()
    }

    pub fn process(&mut self, raw: &str, scanner_on: bool) -> ReadDecision {
        let text: String = raw.chars().filter(|c| *c != '\0').collect();

        if self.reader_type.suppresses_duplicates()
            && self.last_accepted.as_deref() == Some(text.as_str())
        {
            return ReadDecision::Duplicate;
        }
        if !scanner_on {
            return ReadDecision::PoweredOff;
        }

        self.last_accepted = Some(text.clone());
        ReadDecision::Forward {
            text,
            restart_window: self.reader_type.suppresses_duplicates(),
        }
    }

    /// Suppression window elapsed: the next read is new whatever it is
    pub fn expire(&mut self) {
        self.last_accepted = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list_is_case_insensitive() {
        assert!(is_command_valid("GET DEVICE.TYPE"));
        assert!(is_command_valid("trigger on"));
        assert!(is_command_valid("Get Result"));
        assert!(is_command_valid("get device.serial-number"));
        assert!(!is_command_valid("SET LIGHT.AIMER 3"));
        assert!(!is_command_valid(" TRIGGER ON"));
        assert!(!is_command_valid(""));
    }

    #[test]
    fn test_presets() {
        assert_eq!(
            ReaderType::Handheld.power_preset(true),
            &["SET BEEP.GOOD 1 1", "SET LIGHT.AIMER 3", "SET TRIGGER.TYPE 2"]
        );
        assert_eq!(
            ReaderType::Handheld.power_preset(false),
            &["SET BEEP.GOOD 0 1", "SET LIGHT.AIMER 0"]
        );
        assert_eq!(
            ReaderType::Fixed.power_preset(true),
            &["SET BEEP.GOOD 3 2", "SET LIGHT.AIMER 1", "SET TRIGGER.TYPE 1"]
        );
        assert_eq!(
            ReaderType::Fixed.power_preset(false),
            &["SET TRIGGER.TYPE 0", "SET LIGHT.AIMER 0", "SET BEEP.GOOD 0 0"]
        );
    }

    #[test]
    fn test_fixed_reader_suppresses_repeat_until_expired() {
        let mut filter = ReadFilter::new(ReaderType::Fixed);
        assert_eq!(
            filter.process("ABC123", true),
            ReadDecision::Forward {
                text: "ABC123".into(),
                restart_window: true
            }
        );
        assert_eq!(filter.process("ABC123", true), ReadDecision::Duplicate);

        filter.expire();
        assert!(matches!(
            filter.process("ABC123", true),
            ReadDecision::Forward { .. }
        ));
    }

    #[test]
    fn test_handheld_never_suppresses() {
        let mut filter = ReadFilter::new(ReaderType::Handheld);
        for _ in 0..2 {
            assert_eq!(
                filter.process("ABC123", true),
                ReadDecision::Forward {
                    text: "ABC123".into(),
                    restart_window: false
                }
            );
        }
    }

    #[test]
    fn test_nul_bytes_are_stripped() {
        let mut filter = ReadFilter::new(ReaderType::Fixed);
        filter.process("ABC\0123\0", true);
        assert_eq!(filter.last_accepted(), Some("ABC123"));
        assert_eq!(filter.process("ABC123", true), ReadDecision::Duplicate);
    }

    #[test]
    fn test_powered_off_leaves_marker() {
        let mut filter = ReadFilter::new(ReaderType::Fixed);
        filter.process("A", true);
        assert_eq!(filter.process("B", false), ReadDecision::PoweredOff);
        assert_eq!(filter.last_accepted(), Some("A"));
        // Duplicates are still reported as such while off
        assert_eq!(filter.process("A", false), ReadDecision::Duplicate);
    }

    #[test]
    fn test_reader_type_parse() {
        assert_eq!(ReaderType::try_from("FIXED"), Ok(ReaderType::Fixed));
        assert!(ReaderType::try_from("wand").is_err());
    }
}
