use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("asset unavailable: {0}")]
    AssetUnavailable(String),
    #[error("playback blocked: {0}")]
    PlaybackBlocked(String),
    #[error("audio output unavailable: {0}")]
    OutputUnavailable(String),
}

impl PlaybackError {
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::AssetUnavailable(_) | Self::PlaybackBlocked(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackOutcome {
    PlayedAsset,
    PlayedSynth,
    Silent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyState {
    Idle,
    AttemptAsset,
    AttemptSynth,
    Done(PlaybackOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyEvent {
    Begin { asset_installed: bool },
    AssetPlayed,
    AssetFailed(PlaybackError),
    SynthScheduled,
    OutputUnavailable,
}

/// One policy value lives for exactly one activation. Events that do not
/// apply to the current state leave it unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackFallbackPolicy {
    state: PolicyState,
    has_fallback: bool,
}

impl PlaybackFallbackPolicy {
    #[must_use]
    pub fn new(has_fallback: bool) -> Self {
        Self {
            state: PolicyState::Idle,
            has_fallback,
        }
    }

    #[must_use]
    pub fn state(&self) -> PolicyState {
        self.state
    }

    #[must_use]
    pub fn outcome(&self) -> Option<PlaybackOutcome> {
        match self.state {
            PolicyState::Done(outcome) => Some(outcome),
            PolicyState::Idle | PolicyState::AttemptAsset | PolicyState::AttemptSynth => None,
        }
    }

    pub fn advance(&mut self, event: PolicyEvent) -> PolicyState {
        self.state = match (self.state, event) {
            (PolicyState::Idle, PolicyEvent::Begin { asset_installed }) => {
                if asset_installed {
                    PolicyState::AttemptAsset
                } else {
                    self.fallback()
                }
            }
            (PolicyState::AttemptAsset, PolicyEvent::AssetPlayed) => {
                PolicyState::Done(PlaybackOutcome::PlayedAsset)
            }
            (PolicyState::AttemptAsset, PolicyEvent::AssetFailed(error)) => {
                if error.is_recoverable() {
                    self.fallback()
                } else {
                    PolicyState::Done(PlaybackOutcome::Silent)
                }
            }
            (PolicyState::AttemptSynth, PolicyEvent::SynthScheduled) => {
                PolicyState::Done(PlaybackOutcome::PlayedSynth)
            }
            (PolicyState::AttemptSynth, PolicyEvent::OutputUnavailable) => {
                PolicyState::Done(PlaybackOutcome::Silent)
            }
            (state, _) => state,
        };
        self.state
    }

    fn fallback(&self) -> PolicyState {
        if self.has_fallback {
            PolicyState::AttemptSynth
        } else {
            PolicyState::Done(PlaybackOutcome::Silent)
        }
    }
}
