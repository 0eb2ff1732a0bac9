//! Background page register

use serde::{Deserialize, Serialize};

use super::RegisterWrite;
use crate::codec::float_high_word;

/// Background pages, in register ordinal order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Page {
    Pass,
    Fail,
    Message,
    PassOk,
    FailNg,
    Blue,
}

impl Page {
    pub const ALL: [Page; 6] = [
        Page::Pass,
        Page::Fail,
        Page::Message,
        Page::PassOk,
        Page::FailNg,
        Page::Blue,
    ];

    pub fn ordinal(&self) -> u8 {
        match self {
            Page::Pass => 0,
            Page::Fail => 1,
            Page::Message => 2,
            Page::PassOk => 3,
            Page::FailNg => 4,
            Page::Blue => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Page::Pass => "Pass",
            Page::Fail => "Fail",
            Page::Message => "Message",
            Page::PassOk => "PassOk",
            Page::FailNg => "FailNg",
            Page::Blue => "Blue",
        }
    }

    /// Value written to the page register
    pub fn register_value(&self) -> u16 {
        float_high_word(self.ordinal() as f32)
    }
}

impl std::fmt::Display for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for Page {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_ascii_lowercase().as_str() {
            "pass" => Ok(Page::Pass),
            "fail" => Ok(Page::Fail),
            "message" => Ok(Page::Message),
            "passok" | "pass-ok" => Ok(Page::PassOk),
            "failng" | "fail-ng" => Ok(Page::FailNg),
            "blue" => Ok(Page::Blue),
            _ => Err(format!("Unknown page: {}", s)),
        }
    }
}

impl std::str::FromStr for Page {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Page::try_from(s)
    }
}

/// The page register and the page last written to it
#[derive(Debug, Clone)]
pub struct DisplayPage {
    address: u16,
    current: Option<Page>,
}

impl DisplayPage {
    pub fn new(address: u16) -> Self {
        DisplayPage {
            address,
            current: None,
        }
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn current(&self) -> Option<Page> {
        self.current
    }

    pub fn set(&mut self, page: Page) -> RegisterWrite {
        self.current = Some(page);
        RegisterWrite {
            address: self.address,
            words: vec![page.register_value()],
        }
    }
}
