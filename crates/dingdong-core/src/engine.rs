use std::future::Future;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    config::PlaybackConfig,
    graph::{AttemptGraph, Note},
    noise::NoiseTransientCache,
    policy::{PlaybackError, PlaybackFallbackPolicy, PlaybackOutcome, PolicyEvent, PolicyState},
    profile::{ChimeProfile, ScheduleContext},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceState {
    Running,
    Suspended,
    Closed,
}

pub trait OutputDevice {
    fn state(&self) -> DeviceState;

    fn resume(&mut self) -> impl Future<Output = Result<(), PlaybackError>>;

    /// Monotonic device time in seconds.
    fn current_time(&self) -> f64;

    fn sample_rate(&self) -> u32;

    fn supports_panning(&self) -> bool {
        true
    }

    fn submit(&mut self, graph: AttemptGraph);
}

pub trait AudioHost {
    type Device: OutputDevice;

    fn open(&mut self) -> Result<Self::Device, PlaybackError>;
}

pub trait AssetPlayer {
    fn reset_position(&mut self);

    fn play(&mut self) -> impl Future<Output = Result<(), PlaybackError>>;

    fn pause(&mut self);

    fn set_volume(&mut self, volume: f32);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoAsset;

impl AssetPlayer for NoAsset {
    fn reset_position(&mut self) {}

    async fn play(&mut self) -> Result<(), PlaybackError> {
        Err(PlaybackError::AssetUnavailable(
            "no asset configured".to_string(),
        ))
    }

    fn pause(&mut self) {}

    fn set_volume(&mut self, _volume: f32) {}
}

#[derive(Debug)]
pub struct AudioClock<D> {
    device: D,
}

impl<D: OutputDevice> AudioClock<D> {
    #[must_use]
    pub fn new(device: D) -> Self {
        Self { device }
    }

    #[must_use]
    pub fn now(&self) -> f64 {
        self.device.current_time()
    }

    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.device.sample_rate()
    }

    #[must_use]
    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    async fn ensure_running(&mut self) -> Result<(), PlaybackError> {
        match self.device.state() {
            DeviceState::Running => Ok(()),
            DeviceState::Suspended => {
                debug!("resuming suspended output device");
                self.device.resume().await
            }
            DeviceState::Closed => Err(PlaybackError::OutputUnavailable(
                "output device closed".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlaybackAttempt {
    AssetPlayback,
    SynthesizedChime {
        profile: ChimeProfile,
        origin: f64,
        notes: Vec<Note>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Activation {
    pub attempt_id: Uuid,
    pub outcome: PlaybackOutcome,
    pub attempt: Option<PlaybackAttempt>,
}

pub struct AudioEngine<H: AudioHost, A = NoAsset> {
    host: H,
    clock: Option<AudioClock<H::Device>>,
    noise: NoiseTransientCache,
    asset: Option<A>,
    settings: PlaybackConfig,
}

impl<H: AudioHost> AudioEngine<H, NoAsset> {
    #[must_use]
    pub fn new(host: H, settings: PlaybackConfig) -> Self {
        Self {
            host,
            clock: None,
            noise: NoiseTransientCache::new(),
            asset: None,
            settings,
        }
    }
}

impl<H: AudioHost, A: AssetPlayer> AudioEngine<H, A> {
    pub fn with_asset<B: AssetPlayer>(self, mut asset: B) -> AudioEngine<H, B> {
        asset.set_volume(self.settings.asset_volume);
        AudioEngine {
            host: self.host,
            clock: self.clock,
            noise: self.noise,
            asset: Some(asset),
            settings: self.settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &PlaybackConfig {
        &self.settings
    }

    pub fn set_profile(&mut self, profile: ChimeProfile) {
        self.settings.profile = profile;
    }

    #[must_use]
    pub fn clock(&self) -> Option<&AudioClock<H::Device>> {
        self.clock.as_ref()
    }

    pub fn clock_mut(&mut self) -> Option<&mut AudioClock<H::Device>> {
        self.clock.as_mut()
    }

    #[must_use]
    pub fn noise_cache(&self) -> &NoiseTransientCache {
        &self.noise
    }

    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    pub async fn activate(&mut self) -> PlaybackOutcome {
        self.trigger().await.outcome
    }

    #[instrument(skip(self), fields(profile = %self.settings.profile, has_fallback = self.settings.has_fallback))]
    pub async fn trigger(&mut self) -> Activation {
        let attempt_id = Uuid::new_v4();
        let mut policy = PlaybackFallbackPolicy::new(self.settings.has_fallback);
        let mut attempt = None;
        let mut state = policy.advance(PolicyEvent::Begin {
            asset_installed: self.asset.is_some(),
        });

        loop {
            match state {
                PolicyState::AttemptAsset => {
                    let event = match self.play_asset().await {
                        Ok(()) => {
                            attempt = Some(PlaybackAttempt::AssetPlayback);
                            PolicyEvent::AssetPlayed
                        }
                        Err(error) => {
                            warn!(%attempt_id, %error, "asset playback failed");
                            PolicyEvent::AssetFailed(error)
                        }
                    };
                    state = policy.advance(event);
                }
                PolicyState::AttemptSynth => {
                    let event = match self.synthesize().await {
                        Ok(synthesized) => {
                            attempt = Some(synthesized);
                            PolicyEvent::SynthScheduled
                        }
                        Err(error) => {
                            warn!(%attempt_id, %error, "synthesized chime unavailable");
                            PolicyEvent::OutputUnavailable
                        }
                    };
                    state = policy.advance(event);
                }
                PolicyState::Idle | PolicyState::Done(_) => break,
            }
        }

        let outcome = policy.outcome().unwrap_or(PlaybackOutcome::Silent);
        info!(%attempt_id, ?outcome, "activation finished");
        Activation {
            attempt_id,
            outcome,
            attempt,
        }
    }

    pub fn release(&mut self) {
        if let Some(mut asset) = self.asset.take() {
            asset.pause();
            debug!("asset released");
        }
    }

    async fn play_asset(&mut self) -> Result<(), PlaybackError> {
        let Some(asset) = self.asset.as_mut() else {
            return Err(PlaybackError::AssetUnavailable(
                "no asset installed".to_string(),
            ));
        };
        asset.reset_position();
        asset.play().await
    }

    async fn synthesize(&mut self) -> Result<PlaybackAttempt, PlaybackError> {
        if self.clock.is_none() {
            let device = self.host.open()?;
            info!(sample_rate = device.sample_rate(), "audio clock opened");
            self.clock = Some(AudioClock::new(device));
        }
        let Some(clock) = self.clock.as_mut() else {
            return Err(PlaybackError::OutputUnavailable(
                "audio clock missing".to_string(),
            ));
        };
        clock.ensure_running().await?;

        let now = clock.now();
        let sample_rate = clock.sample_rate();
        let context = ScheduleContext {
            now,
            sample_rate,
            noise: self.noise.get(sample_rate),
            panning: clock.device().supports_panning(),
        };
        let profile = self.settings.profile;
        let mut graph = AttemptGraph::new(now);
        profile.schedule(&mut graph, &context);

        let notes = graph.notes().to_vec();
        debug!(
            nodes = graph.nodes().len(),
            sources = graph.source_count(),
            end_time = graph.end_time(),
            "submitting attempt graph"
        );
        clock.device_mut().submit(graph);

        Ok(PlaybackAttempt::SynthesizedChime {
            profile,
            origin: now,
            notes,
        })
    }
}
