pub mod config;
pub mod diagnostics;
pub mod effects;
pub mod engine;
pub mod envelope;
pub mod fingerprint;
pub mod graph;
pub mod noise;
pub mod policy;
pub mod profile;
pub mod render;
pub mod voice;

pub use config::{AppConfig, DiagnosticsConfig, PlaybackConfig, RenderConfig};
pub use diagnostics::{TelemetryGuard, init_tracing_from_config};
pub use effects::{
    EchoConfig, EffectChain, EffectChainConfig, EffectChainError, LimiterConfig, ReflectionConfig,
};
pub use engine::{
    Activation, AssetPlayer, AudioClock, AudioEngine, AudioHost, DeviceState, NoAsset,
    OutputDevice, PlaybackAttempt,
};
pub use envelope::{EnvelopeBuilder, GAIN_FLOOR};
pub use fingerprint::{ScheduleReport, generate_all_reports, generate_schedule_report};
pub use graph::{AttemptGraph, AudioParam, NodeId, NodeKind, Note, VoiceKind, Waveform};
pub use noise::{NoiseBuffer, NoiseTransientCache};
pub use policy::{
    PlaybackError, PlaybackFallbackPolicy, PlaybackOutcome, PolicyEvent, PolicyState,
};
pub use profile::{ChimeProfile, ScheduleContext};
pub use render::{OfflineDevice, OfflineHost, RenderError, RenderedAudio, render_graph};
pub use voice::{BellVoice, StereoNote, Tone};
