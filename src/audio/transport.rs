//! Transport state machine for narration playback

use std::fmt;
use thiserror::Error;

/// Narration transport state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Loading,
    Playing,
    Paused,
}

impl TransportState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportState::Stopped => "stopped",
            TransportState::Loading => "loading",
            TransportState::Playing => "playing",
            TransportState::Paused => "paused",
        }
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs that drive the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// Play without a reusable buffer: decode first
    BeginLoad,
    LoadSucceeded,
    LoadFailed,
    /// Play with the paused buffer still valid for the viewed page
    Resume,
    Pause,
    /// Explicit stop or page navigation
    Stop,
    /// Sink reached the end of the buffer
    NaturalEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Event {event:?} is not valid while {from}")]
pub struct TransitionError {
    pub from: TransportState,
    pub event: TransportEvent,
}

/// Holds the single live transport state
#[derive(Debug, Default)]
pub struct Transport {
    state: TransportState,
}

impl Transport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Next state for `event`, without applying it
    pub fn next_state(&self, event: TransportEvent) -> Result<TransportState, TransitionError> {
        use TransportEvent::*;
        use TransportState::*;

        let next = match (self.state, event) {
            (_, Stop) => Stopped,
            (Stopped | Paused, BeginLoad) => Loading,
            (Loading, LoadSucceeded) => Playing,
            (Loading, LoadFailed) => Stopped,
            (Paused, Resume) => Playing,
            (Playing, Pause) => Paused,
            (Playing, NaturalEnd) => Stopped,
            (from, event) => return Err(TransitionError { from, event }),
        };
        Ok(next)
    }

    /// Apply `event`; the state is unchanged on error
    pub fn apply(&mut self, event: TransportEvent) -> Result<TransportState, TransitionError> {
        let next = self.next_state(event)?;
        self.state = next;
        Ok(next)
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    pub fn is_loading(&self) -> bool {
        self.state == TransportState::Loading
    }

    pub fn is_paused(&self) -> bool {
        self.state == TransportState::Paused
    }

    pub fn is_stopped(&self) -> bool {
        self.state == TransportState::Stopped
    }
}
