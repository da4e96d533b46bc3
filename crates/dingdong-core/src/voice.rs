use std::sync::Arc;

use crate::{
    envelope::EnvelopeBuilder,
    graph::{AttemptGraph, FilterKind, Note, NodeId, VoiceKind, Waveform},
    noise::NoiseBuffer,
};

/// Sources keep running this long past their nominal duration so the
/// release ramp always completes before the node stops.
pub const STOP_TAIL_SECONDS: f64 = 0.02;

pub const BELL_ATTACK_SECONDS: f64 = 0.004;
pub const STRIKE_CENTER_HZ: f64 = 3_200.0;
pub const STRIKE_Q: f64 = 1.45;
pub const STRIKE_ATTACK_SECONDS: f64 = 0.004;
pub const STRIKE_RELEASE_SECONDS: f64 = 0.055;
pub const STRIKE_PEAK: f64 = 0.16;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Partial {
    pub ratio: f64,
    pub gain: f64,
    pub decay_fraction: f64,
}

pub const BELL_PARTIALS: [Partial; 4] = [
    Partial {
        ratio: 1.0,
        gain: 0.50,
        decay_fraction: 1.0,
    },
    Partial {
        ratio: 2.31,
        gain: 0.19,
        decay_fraction: 0.72,
    },
    Partial {
        ratio: 2.92,
        gain: 0.13,
        decay_fraction: 0.55,
    },
    Partial {
        ratio: 3.99,
        gain: 0.08,
        decay_fraction: 0.38,
    },
];

#[derive(Debug, Clone)]
pub struct BellVoice {
    pub strike: Arc<NoiseBuffer>,
    pub panning: bool,
    pub level: f64,
}

impl BellVoice {
    pub fn synthesize(
        &self,
        graph: &mut AttemptGraph,
        master_bus: NodeId,
        start: f64,
        frequency: f64,
        pan: f64,
        duration: f64,
    ) -> NodeId {
        let stop = start + duration + STOP_TAIL_SECONDS;
        let note_gain = graph.gain(self.level);

        for partial in BELL_PARTIALS {
            let osc = graph.oscillator(Waveform::Sine, frequency * partial.ratio, start, stop);
            let envelope = graph.gain(0.0);
            if let Some(param) = graph.param_mut(envelope) {
                EnvelopeBuilder::build(
                    param,
                    start,
                    BELL_ATTACK_SECONDS,
                    partial.gain,
                    start + duration * partial.decay_fraction,
                );
            }
            graph.connect(osc, envelope);
            graph.connect(envelope, note_gain);
        }

        let strike = graph.buffer_source(Arc::clone(&self.strike), start, stop);
        let bandpass = graph.biquad(FilterKind::Bandpass, STRIKE_CENTER_HZ, STRIKE_Q);
        let strike_gain = graph.gain(0.0);
        if let Some(param) = graph.param_mut(strike_gain) {
            EnvelopeBuilder::build(
                param,
                start,
                STRIKE_ATTACK_SECONDS,
                STRIKE_PEAK,
                start + STRIKE_RELEASE_SECONDS,
            );
        }
        graph.connect(strike, bandpass);
        graph.connect(bandpass, strike_gain);
        graph.connect(strike_gain, note_gain);

        route_panned(graph, note_gain, pan, self.panning, master_bus);
        graph.record_note(Note {
            kind: VoiceKind::Bell,
            frequency,
            start_offset: start - graph.origin(),
            end_offset: start + duration - graph.origin(),
            gain_node: note_gain,
        });
        note_gain
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub kind: VoiceKind,
    pub waveform: Waveform,
    pub frequency: f64,
    pub start: f64,
    pub duration: f64,
    pub attack: f64,
    pub peak: f64,
}

impl Tone {
    pub fn schedule(&self, graph: &mut AttemptGraph, output: NodeId) -> (NodeId, NodeId) {
        let stop = self.start + self.duration + STOP_TAIL_SECONDS;
        let osc = graph.oscillator(self.waveform, self.frequency, self.start, stop);
        let gain = graph.gain(0.0);
        if let Some(param) = graph.param_mut(gain) {
            EnvelopeBuilder::build(
                param,
                self.start,
                self.attack,
                self.peak,
                self.start + self.duration,
            );
        }
        graph.connect(osc, gain);
        graph.connect(gain, output);
        graph.record_note(Note {
            kind: self.kind,
            frequency: self.frequency,
            start_offset: self.start - graph.origin(),
            end_offset: self.start + self.duration - graph.origin(),
            gain_node: gain,
        });
        (osc, gain)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoNote {
    pub waveform: Waveform,
    pub frequency: f64,
    pub detune_cents: f64,
    pub width: f64,
    pub start: f64,
    pub duration: f64,
    pub attack: f64,
    pub peak: f64,
}

impl StereoNote {
    pub fn schedule(&self, graph: &mut AttemptGraph, output: NodeId, panning: bool) -> NodeId {
        let stop = self.start + self.duration + STOP_TAIL_SECONDS;
        let gain = graph.gain(0.0);
        if let Some(param) = graph.param_mut(gain) {
            EnvelopeBuilder::build(
                param,
                self.start,
                self.attack,
                self.peak,
                self.start + self.duration,
            );
        }

        for side in [-1.0, 1.0] {
            let frequency = self.frequency * cents_to_ratio(side * self.detune_cents);
            let osc = graph.oscillator(self.waveform, frequency, self.start, stop);
            route_panned(graph, osc, side * self.width, panning, gain);
        }

        graph.connect(gain, output);
        graph.record_note(Note {
            kind: VoiceKind::StereoNote,
            frequency: self.frequency,
            start_offset: self.start - graph.origin(),
            end_offset: self.start + self.duration - graph.origin(),
            gain_node: gain,
        });
        gain
    }
}

#[must_use]
pub fn cents_to_ratio(cents: f64) -> f64 {
    2_f64.powf(cents / 1_200.0)
}

pub fn route_panned(
    graph: &mut AttemptGraph,
    node: NodeId,
    pan: f64,
    panning: bool,
    output: NodeId,
) {
    if panning {
        let panner = graph.stereo_panner(pan);
        graph.connect(node, panner);
        graph.connect(panner, output);
    } else {
        graph.connect(node, output);
    }
}
