//! # Pause Switch
//!
//! A two-state halt flag gating every value-moving operation.
//!
//! ```text
//! Active --pause--> Paused --unpause--> Active
//! ```
//!
//! Re-entering the current state is accepted and changes nothing.

use serde::{Deserialize, Serialize};

use crate::error::{TokenError, TokenResult};

/// Whether value movement is currently allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseState {
    #[default]
    Active,
    Paused,
}

impl std::fmt::Display for PauseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PauseState::Active => write!(f, "active"),
            PauseState::Paused => write!(f, "paused"),
        }
    }
}

/// Holds the [`PauseState`]. Starts `Active`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseSwitch {
    state: PauseState,
}

impl PauseSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PauseState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.state == PauseState::Paused
    }

    pub fn pause(&mut self) {
        self.state = PauseState::Paused;
    }

    pub fn unpause(&mut self) {
        self.state = PauseState::Active;
    }

    /// Fails with [`TokenError::SystemPaused`] while paused.
    pub fn ensure_active(&self) -> TokenResult<()> {
        match self.state {
            PauseState::Active => Ok(()),
            PauseState::Paused => Err(TokenError::SystemPaused),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_active() {
        let switch = PauseSwitch::new();
        assert_eq!(switch.state(), PauseState::Active);
        assert!(switch.ensure_active().is_ok());
    }

    #[test]
    fn pause_then_unpause() {
        let mut switch = PauseSwitch::new();
        switch.pause();
        assert!(switch.is_paused());
        assert_eq!(switch.ensure_active(), Err(TokenError::SystemPaused));

        switch.unpause();
        assert!(!switch.is_paused());
        assert!(switch.ensure_active().is_ok());
    }

    #[test]
    fn repeated_transitions_are_idempotent() {
        let mut switch = PauseSwitch::new();
        switch.unpause();
        assert_eq!(switch.state(), PauseState::Active);

        switch.pause();
        switch.pause();
        assert_eq!(switch.state(), PauseState::Paused);
    }
}
