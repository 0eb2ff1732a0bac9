//! Button windows and the transition between them.
//!
//! A window decides how many buttons the display shows. Switching windows is
//! a single computed plan: which window coils to write and which buttons
//! must be polled afterwards. The host applies both halves together.

use serde::{Deserialize, Serialize};

use super::{Button, CoilWrite};

/// How many buttons are visible
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Window {
    NoButton,
    OneButton,
    TwoButtons,
    ThreeButtons,
}

impl Window {
    pub fn button_count(&self) -> usize {
        match self {
            Window::NoButton => 0,
            Window::OneButton => 1,
            Window::TwoButtons => 2,
            Window::ThreeButtons => 3,
        }
    }

    /// Whether `button` is visible (and therefore polled) in this window
    pub fn shows(&self, button: Button) -> bool {
        button.index() < self.button_count()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Window::NoButton => "none",
            Window::OneButton => "one",
            Window::TwoButtons => "two",
            Window::ThreeButtons => "three",
        }
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for Window {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "0" => Ok(Window::NoButton),
            "one" | "1" => Ok(Window::OneButton),
            "two" | "2" => Ok(Window::TwoButtons),
            "three" | "3" => Ok(Window::ThreeButtons),
            _ => Err(format!("Unknown window: {}", s)),
        }
    }
}

impl std::str::FromStr for Window {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Window::try_from(s)
    }
}

/// The window coils of one layout.
///
/// The plain layout has no coil for the no-button window; that window is
/// selected by releasing the other three.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCoils {
    pub none: Option<u16>,
    pub one: u16,
    pub two: u16,
    pub three: u16,
}

impl WindowCoils {
    pub const PLAIN: WindowCoils = WindowCoils {
        none: None,
        one: 1,
        two: 2,
        three: 3,
    };

    pub const TRANSLATED: WindowCoils = WindowCoils {
        none: Some(4),
        one: 5,
        two: 6,
        three: 7,
    };

    pub fn coil_for(&self, window: Window) -> Option<u16> {
        match window {
            Window::NoButton => self.none,
            Window::OneButton => Some(self.one),
            Window::TwoButtons => Some(self.two),
            Window::ThreeButtons => Some(self.three),
        }
    }

    fn all(&self) -> impl Iterator<Item = u16> + '_ {
        self.none
            .into_iter()
            .chain([self.one, self.two, self.three])
    }
}

/// Everything a window change has to apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowPlan {
    pub window: Window,
    /// Releases first, then the one asserted coil (if any)
    pub coils: Vec<CoilWrite>,
    /// Poll enablement per button, indexed by [`Button::index`]
    pub polling: [bool; 3],
}

/// Compute the transition to `window` for the given coil layout
pub fn plan_window(window: Window, layout: &WindowCoils) -> WindowPlan {
    let selected = layout.coil_for(window);

    let mut coils: Vec<CoilWrite> = layout
        .all()
        .filter(|c| Some(*c) != selected)
        .map(CoilWrite::off)
        .collect();
    if let Some(coil) = selected {
        coils.push(CoilWrite::on(coil));
    }

    WindowPlan {
        window,
        coils,
        polling: Button::ALL.map(|b| window.shows(b)),
    }
}
