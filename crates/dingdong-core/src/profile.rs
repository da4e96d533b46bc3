use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
    effects::{EchoConfig, EffectChain, EffectChainConfig, LimiterConfig, ReflectionConfig},
    graph::{AttemptGraph, NodeId, VoiceKind, Waveform},
    noise::NoiseBuffer,
    voice::{BellVoice, StereoNote, Tone},
};

#[derive(Debug, Clone)]
pub struct ScheduleContext {
    pub now: f64,
    pub sample_rate: u32,
    pub noise: Arc<NoiseBuffer>,
    pub panning: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChimeProfile {
    #[default]
    TwoToneDing,
    DeepStereoPad,
    BellPairChime,
    MagicWandArpeggio,
}

const DING_TONES: [(f64, f64, f64, f64); 2] = [
    // (frequency, offset, duration, peak)
    (659.25, 0.0, 0.35, 0.24),
    (523.25, 0.38, 0.65, 0.26),
];
const DING_ATTACK_SECONDS: f64 = 0.01;

const PAD_SUB_START_HZ: f64 = 98.0;
const PAD_SUB_END_HZ: f64 = 69.0;
const PAD_SUB_SWEEP_SECONDS: f64 = 1.1;
const PAD_NOTES: [(f64, f64); 3] = [(196.0, 0.0), (293.66, 0.12), (392.0, 0.24)];

const BELL_NOTES: [(f64, f64, f64, f64); 2] = [
    // (frequency, offset, pan, duration)
    (987.77, 0.0, -0.18, 1.25),
    (739.99, 0.37, 0.18, 1.7),
];
const BELL_LEVEL: f64 = 0.9;

const WAND_NOTES: [f64; 4] = [1_046.5, 1_318.51, 1_567.98, 2_093.0];
const WAND_STEP_SECONDS: f64 = 0.07;

impl ChimeProfile {
    pub const ALL: [Self; 4] = [
        Self::TwoToneDing,
        Self::DeepStereoPad,
        Self::BellPairChime,
        Self::MagicWandArpeggio,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::TwoToneDing => "two-tone-ding",
            Self::DeepStereoPad => "deep-stereo-pad",
            Self::BellPairChime => "bell-pair-chime",
            Self::MagicWandArpeggio => "magic-wand-arpeggio",
        }
    }

    #[must_use]
    pub fn effect_chain(self) -> Option<EffectChainConfig> {
        match self {
            Self::TwoToneDing => None,
            Self::DeepStereoPad => Some(EffectChainConfig {
                limiter: Some(LimiterConfig {
                    threshold_db: -14.0,
                    knee_db: 8.0,
                    ratio: 8.0,
                    attack: 0.005,
                    release: 0.3,
                }),
                output_level: 0.78,
                echo: Some(EchoConfig {
                    delay_time: 0.28,
                    feedback_gain: 0.38,
                    wet_gain: 0.26,
                }),
                early_reflections: None,
            }),
            Self::BellPairChime => Some(EffectChainConfig {
                limiter: Some(LimiterConfig::default()),
                output_level: 0.82,
                echo: None,
                early_reflections: Some(ReflectionConfig {
                    left_delay: 0.017,
                    right_delay: 0.029,
                    stereo_spread: 0.7,
                    gain: 0.22,
                }),
            }),
            Self::MagicWandArpeggio => Some(EffectChainConfig {
                limiter: None,
                output_level: 0.8,
                echo: Some(EchoConfig {
                    delay_time: 0.16,
                    feedback_gain: 0.32,
                    wet_gain: 0.22,
                }),
                early_reflections: None,
            }),
        }
    }

    #[instrument(skip(graph, ctx), fields(profile = self.name(), now = ctx.now))]
    pub fn schedule(self, graph: &mut AttemptGraph, ctx: &ScheduleContext) {
        let output = match self.effect_chain() {
            Some(config) => EffectChain::build(graph, &config, ctx.panning).master_bus,
            None => graph.destination(),
        };

        match self {
            Self::TwoToneDing => two_tone_ding(graph, ctx, output),
            Self::DeepStereoPad => deep_stereo_pad(graph, ctx, output),
            Self::BellPairChime => bell_pair_chime(graph, ctx, output),
            Self::MagicWandArpeggio => magic_wand_arpeggio(graph, ctx, output),
        }

        debug!(
            nodes = graph.nodes().len(),
            notes = graph.notes().len(),
            "profile scheduled"
        );
    }
}

fn two_tone_ding(graph: &mut AttemptGraph, ctx: &ScheduleContext, output: NodeId) {
    for (frequency, offset, duration, peak) in DING_TONES {
        Tone {
            kind: VoiceKind::Tone,
            waveform: Waveform::Sine,
            frequency,
            start: ctx.now + offset,
            duration,
            attack: DING_ATTACK_SECONDS,
            peak,
        }
        .schedule(graph, output);
    }
}

fn deep_stereo_pad(graph: &mut AttemptGraph, ctx: &ScheduleContext, output: NodeId) {
    let (sub, _) = Tone {
        kind: VoiceKind::SubSweep,
        waveform: Waveform::Sine,
        frequency: PAD_SUB_START_HZ,
        start: ctx.now,
        duration: 1.3,
        attack: 0.03,
        peak: 0.18,
    }
    .schedule(graph, output);
    if let Some(frequency) = graph.param_mut(sub) {
        frequency
            .set_value_at_time(PAD_SUB_START_HZ, ctx.now)
            .exponential_ramp_to_value_at_time(PAD_SUB_END_HZ, ctx.now + PAD_SUB_SWEEP_SECONDS);
    }

    for (frequency, offset) in PAD_NOTES {
        let start = ctx.now + offset;
        StereoNote {
            waveform: Waveform::Triangle,
            frequency,
            detune_cents: 7.0,
            width: 0.45,
            start,
            duration: 1.6,
            attack: 0.06,
            peak: 0.085,
        }
        .schedule(graph, output, ctx.panning);

        Tone {
            kind: VoiceKind::Shimmer,
            waveform: Waveform::Sine,
            frequency: frequency * 2.0,
            start: start + 0.05,
            duration: 1.1,
            attack: 0.08,
            peak: 0.022,
        }
        .schedule(graph, output);
    }
}

fn bell_pair_chime(graph: &mut AttemptGraph, ctx: &ScheduleContext, output: NodeId) {
    let voice = BellVoice {
        strike: Arc::clone(&ctx.noise),
        panning: ctx.panning,
        level: BELL_LEVEL,
    };
    for (frequency, offset, pan, duration) in BELL_NOTES {
        voice.synthesize(graph, output, ctx.now + offset, frequency, pan, duration);
    }
}

fn magic_wand_arpeggio(graph: &mut AttemptGraph, ctx: &ScheduleContext, output: NodeId) {
    for (step, frequency) in WAND_NOTES.into_iter().enumerate() {
        let start = ctx.now + step as f64 * WAND_STEP_SECONDS;
        Tone {
            kind: VoiceKind::WandBody,
            waveform: Waveform::Triangle,
            frequency,
            start,
            duration: 0.32,
            attack: 0.006,
            peak: 0.14,
        }
        .schedule(graph, output);
        Tone {
            kind: VoiceKind::Sparkle,
            waveform: Waveform::Square,
            frequency: frequency * 2.0,
            start,
            duration: 0.12,
            attack: 0.003,
            peak: 0.025,
        }
        .schedule(graph, output);
    }
}

impl fmt::Display for ChimeProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChimeProfile {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|profile| profile.name() == value)
            .ok_or_else(|| format!("unknown chime profile: {value}"))
    }
}
