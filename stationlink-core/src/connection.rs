//! Session state machine shared by the display and reader clients.
//!
//! Pure state transitions, no I/O. The host performs the actual connect,
//! login and close and tells the tracker what happened.
//!
//! ```text
//!               start_connecting            connected
//! Disconnected ─────────────────▶ Connecting ─────────▶ Connected
//!      ▲                            │  ▲                   │
//!      │            failed          │  │ start_            │ start_disconnecting
//!      ├────────────────────────────┘  │ authenticating    ▼
//!      │                          Authenticating      Disconnecting
//!      │            disconnected                           │
//!      └───────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use stationlink_core::connection::{SessionState, SessionTracker};
//!
//! let mut session = SessionTracker::new();
//! session.start_connecting();
//! session.connected();
//! assert!(session.can_send());
//! session.start_disconnecting();
//! session.disconnected();
//! assert_eq!(session.state(), SessionState::Disconnected);
//! ```

use serde::{Deserialize, Serialize};

// =============================================================================
// Session State
// =============================================================================

/// Lifecycle of a device session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionState {
    /// No session, no connection attempt in progress
    #[default]
    Disconnected,
    /// TCP connect in progress
    Connecting,
    /// Connected, login handshake in progress
    Authenticating,
    /// Session usable for commands
    Connected,
    /// Close requested, not yet completed
    Disconnecting,
}

impl SessionState {
    /// Check if the session is usable for sending commands
    pub fn can_send(&self) -> bool {
        matches!(self, SessionState::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self, SessionState::Connecting | SessionState::Authenticating)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Disconnected => write!(f, "Disconnected"),
            SessionState::Connecting => write!(f, "Connecting"),
            SessionState::Authenticating => write!(f, "Authenticating"),
            SessionState::Connected => write!(f, "Connected"),
            SessionState::Disconnecting => write!(f, "Disconnecting"),
        }
    }
}

// =============================================================================
// Session Tracker
// =============================================================================

/// Tracks session state, ignoring transitions that make no sense from the
/// current one.
#[derive(Debug, Clone, Default)]
pub struct SessionTracker {
    state: SessionState,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn can_send(&self) -> bool {
        self.state.can_send()
    }

    pub fn is_connecting(&self) -> bool {
        self.state.is_connecting()
    }

    // -------------------------------------------------------------------------
    // State Transitions
    // -------------------------------------------------------------------------

    /// Start a connect attempt. Ignored while a session is up or closing.
    pub fn start_connecting(&mut self) {
        if matches!(self.state, SessionState::Disconnected) {
            self.state = SessionState::Connecting;
        }
    }

    /// Transport is up, login follows
    pub fn start_authenticating(&mut self) {
        if self.state == SessionState::Connecting {
            self.state = SessionState::Authenticating;
        }
    }

    /// Connect (and login, if any) completed
    pub fn connected(&mut self) {
        if self.state.is_connecting() {
            self.state = SessionState::Connected;
        }
    }

    /// Connect attempt failed or an established session was lost
    pub fn failed(&mut self) {
        self.state = SessionState::Disconnected;
    }

    pub fn start_disconnecting(&mut self) {
        if self.state == SessionState::Connected {
            self.state = SessionState::Disconnecting;
        }
    }

    /// Close completed (successfully or not)
    pub fn disconnected(&mut self) {
        self.state = SessionState::Disconnected;
    }
}

// =============================================================================
// Tests
// =============================================================================
