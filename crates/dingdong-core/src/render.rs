use std::{f64::consts::PI, fs, path::Path};

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::{
    effects::{LimiterConfig, db_to_linear, linear_to_db},
    engine::{AudioHost, DeviceState, OutputDevice},
    graph::{AttemptGraph, FilterKind, NodeId, NodeKind, Waveform},
    noise::NoiseTransientCache,
    policy::PlaybackError,
    profile::{ChimeProfile, ScheduleContext},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("sample rate must be positive")]
    InvalidSampleRate,
    #[error("graph contains a cycle that does not pass through a delay node")]
    UnbrokenCycle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedAudio {
    pub sample_rate: u32,
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

impl RenderedAudio {
    #[must_use]
    pub fn frames(&self) -> usize {
        self.left.len()
    }

    #[must_use]
    pub fn interleaved(&self) -> Vec<f32> {
        self.left
            .iter()
            .zip(&self.right)
            .flat_map(|(left, right)| [*left, *right])
            .collect()
    }

    #[must_use]
    pub fn peak(&self) -> f32 {
        self.left
            .iter()
            .chain(self.right.iter())
            .map(|sample| sample.abs())
            .fold(0.0_f32, f32::max)
    }

    #[must_use]
    pub fn energy_between(&self, start: f64, end: f64) -> f64 {
        let rate = f64::from(self.sample_rate);
        let first = ((start.max(0.0) * rate) as usize).min(self.frames());
        let last = ((end.max(0.0) * rate) as usize).clamp(first, self.frames());
        self.left[first..last]
            .iter()
            .zip(&self.right[first..last])
            .map(|(left, right)| f64::from(*left).powi(2) + f64::from(*right).powi(2))
            .sum()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadState {
    fn process(&mut self, input: f64, [b0, b1, b2, a1, a2]: [f64; 5]) -> f64 {
        let output = b0 * input + b1 * self.x1 + b2 * self.x2 - a1 * self.y1 - a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;
        output
    }
}

#[derive(Debug, Clone)]
enum NodeState {
    Stateless,
    Oscillator { phase: f64 },
    Delay { line: Vec<(f64, f64)>, position: usize },
    Biquad { channels: [BiquadState; 2] },
    Compressor { envelope: f64 },
}

/// Renders `graph` from its origin until every source has stopped plus `tail_seconds`.
#[instrument(skip(graph), fields(nodes = graph.nodes().len()))]
pub fn render_graph(
    graph: &AttemptGraph,
    sample_rate: u32,
    tail_seconds: f64,
) -> Result<RenderedAudio, RenderError> {
    if sample_rate == 0 {
        return Err(RenderError::InvalidSampleRate);
    }
    let rate = f64::from(sample_rate);
    let order = evaluation_order(graph)?;
    let inputs: Vec<Vec<NodeId>> = (0..graph.nodes().len())
        .map(|index| graph.inputs_of(NodeId(index)))
        .collect();
    let mut states: Vec<NodeState> = graph
        .nodes()
        .iter()
        .map(|node| initial_state(&node.kind, rate))
        .collect();

    let duration = graph.end_time() - graph.origin() + tail_seconds.max(0.0);
    let frame_count = (duration.max(0.0) * rate).ceil() as usize;
    let mut outputs = vec![(0.0_f64, 0.0_f64); graph.nodes().len()];
    let mut left = Vec::with_capacity(frame_count);
    let mut right = Vec::with_capacity(frame_count);

    for frame in 0..frame_count {
        let time = graph.origin() + frame as f64 / rate;
        for &id in &order {
            let input = sum_inputs(&inputs[id.0], &outputs);
            let node = graph.node(id);
            outputs[id.0] = match (&node.kind, &mut states[id.0]) {
                (NodeKind::Destination, _) => input,
                (NodeKind::Oscillator { waveform, frequency }, NodeState::Oscillator { phase }) => {
                    match node.window {
                        Some(window) if time >= window.start && time < window.stop => {
                            let sample = oscillator_sample(*waveform, *phase);
                            *phase = (*phase + frequency.value_at(time) / rate).fract();
                            (sample, sample)
                        }
                        _ => (0.0, 0.0),
                    }
                }
                (NodeKind::BufferSource { buffer }, _) => match node.window {
                    Some(window) if time >= window.start && time < window.stop => {
                        let index = ((time - window.start) * f64::from(buffer.sample_rate)) as usize;
                        let sample = buffer.samples().get(index).copied().map_or(0.0, f64::from);
                        (sample, sample)
                    }
                    _ => (0.0, 0.0),
                },
                (NodeKind::Gain { gain }, _) => {
                    let gain = gain.value_at(time);
                    (input.0 * gain, input.1 * gain)
                }
                (NodeKind::Delay { .. }, NodeState::Delay { line, position }) => line[*position],
                (
                    NodeKind::BiquadFilter { kind, frequency, q },
                    NodeState::Biquad { channels },
                ) => {
                    let coefficients =
                        biquad_coefficients(*kind, frequency.value_at(time), q.value_at(time), rate);
                    (
                        channels[0].process(input.0, coefficients),
                        channels[1].process(input.1, coefficients),
                    )
                }
                (NodeKind::StereoPanner { pan }, _) => pan_stereo(input, pan.value_at(time)),
                (
                    NodeKind::Compressor {
                        threshold_db,
                        knee_db,
                        ratio,
                        attack,
                        release,
                    },
                    NodeState::Compressor { envelope },
                ) => {
                    let limiter = LimiterConfig {
                        threshold_db: *threshold_db,
                        knee_db: *knee_db,
                        ratio: *ratio,
                        attack: *attack,
                        release: *release,
                    };
                    compress(&limiter, envelope, input, rate)
                }
                _ => (0.0, 0.0),
            };
        }

        for (index, state) in states.iter_mut().enumerate() {
            if let NodeState::Delay { line, position } = state {
                line[*position] = sum_inputs(&inputs[index], &outputs);
                *position = (*position + 1) % line.len();
            }
        }

        let (out_left, out_right) = outputs[graph.destination().0];
        left.push(out_left as f32);
        right.push(out_right as f32);
    }

    debug!(frames = left.len(), "graph render completed");
    Ok(RenderedAudio {
        sample_rate,
        left,
        right,
    })
}

pub fn render_profile(
    profile: ChimeProfile,
    sample_rate: u32,
    tail_seconds: f64,
) -> Result<RenderedAudio, RenderError> {
    let mut graph = AttemptGraph::new(0.0);
    let context = ScheduleContext {
        now: 0.0,
        sample_rate,
        noise: NoiseTransientCache::new().get(sample_rate),
        panning: true,
    };
    profile.schedule(&mut graph, &context);
    render_graph(&graph, sample_rate, tail_seconds)
}

#[instrument(skip(audio), fields(path = %path.display(), frames = audio.frames()))]
pub fn export_wav(audio: &RenderedAudio, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!(
                "failed to create wav output directory: {}",
                parent.display()
            )
        })?;
    }

    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("failed to create wav file: {}", path.display()))?;

    for sample in audio.interleaved() {
        writer
            .write_sample(quantize(sample))
            .context("failed to write wav sample")?;
    }

    writer.finalize().context("failed to finalize wav file")?;
    info!("wav export completed");
    Ok(())
}

#[derive(Debug, Clone)]
pub struct OfflineDevice {
    sample_rate: u32,
    time: f64,
    state: DeviceState,
    submitted: Vec<AttemptGraph>,
}

impl OfflineDevice {
    #[must_use]
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            time: 0.0,
            state: DeviceState::Suspended,
            submitted: Vec::new(),
        }
    }

    pub fn advance(&mut self, seconds: f64) {
        self.time += seconds.max(0.0);
    }

    #[must_use]
    pub fn submitted(&self) -> &[AttemptGraph] {
        &self.submitted
    }

    pub fn take_submitted(&mut self) -> Vec<AttemptGraph> {
        std::mem::take(&mut self.submitted)
    }
}

impl OutputDevice for OfflineDevice {
    fn state(&self) -> DeviceState {
        self.state
    }

    async fn resume(&mut self) -> Result<(), PlaybackError> {
        self.state = DeviceState::Running;
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.time
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn submit(&mut self, graph: AttemptGraph) {
        self.submitted.push(graph);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OfflineHost {
    pub sample_rate: u32,
}

impl AudioHost for OfflineHost {
    type Device = OfflineDevice;

    fn open(&mut self) -> Result<Self::Device, PlaybackError> {
        if self.sample_rate == 0 {
            return Err(PlaybackError::OutputUnavailable(
                "offline sample rate is zero".to_string(),
            ));
        }
        Ok(OfflineDevice::new(self.sample_rate))
    }
}

/// Kahn ordering that ignores edges into delay nodes, which read only past frames.
fn evaluation_order(graph: &AttemptGraph) -> Result<Vec<NodeId>, RenderError> {
    let nodes = graph.nodes();
    let mut pending = vec![0_usize; nodes.len()];
    for node in nodes {
        for target in &node.outputs {
            if !matches!(nodes[target.0].kind, NodeKind::Delay { .. }) {
                pending[target.0] += 1;
            }
        }
    }

    let mut ready: Vec<usize> = (0..nodes.len()).filter(|&index| pending[index] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(index) = ready.pop() {
        order.push(NodeId(index));
        for target in &nodes[index].outputs {
            if matches!(nodes[target.0].kind, NodeKind::Delay { .. }) {
                continue;
            }
            pending[target.0] -= 1;
            if pending[target.0] == 0 {
                ready.push(target.0);
            }
        }
    }

    if order.len() == nodes.len() {
        Ok(order)
    } else {
        Err(RenderError::UnbrokenCycle)
    }
}

fn initial_state(kind: &NodeKind, rate: f64) -> NodeState {
    match kind {
        NodeKind::Oscillator { .. } => NodeState::Oscillator { phase: 0.0 },
        NodeKind::Delay { delay_time } => {
            let frames = ((delay_time * rate).round() as usize).max(1);
            NodeState::Delay {
                line: vec![(0.0, 0.0); frames],
                position: 0,
            }
        }
        NodeKind::BiquadFilter { .. } => NodeState::Biquad {
            channels: [BiquadState::default(); 2],
        },
        NodeKind::Compressor { .. } => NodeState::Compressor { envelope: 0.0 },
        NodeKind::Destination
        | NodeKind::BufferSource { .. }
        | NodeKind::Gain { .. }
        | NodeKind::StereoPanner { .. } => NodeState::Stateless,
    }
}

fn sum_inputs(inputs: &[NodeId], outputs: &[(f64, f64)]) -> (f64, f64) {
    inputs.iter().fold((0.0, 0.0), |(left, right), id| {
        let (input_left, input_right) = outputs[id.0];
        (left + input_left, right + input_right)
    })
}

fn oscillator_sample(waveform: Waveform, phase: f64) -> f64 {
    match waveform {
        Waveform::Sine => (2.0 * PI * phase).sin(),
        Waveform::Triangle => {
            if phase < 0.5 {
                phase * 4.0 - 1.0
            } else {
                3.0 - phase * 4.0
            }
        }
        Waveform::Square => {
            if phase < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
    }
}

fn biquad_coefficients(kind: FilterKind, frequency: f64, q: f64, rate: f64) -> [f64; 5] {
    let frequency = frequency.clamp(1.0, rate * 0.49);
    let omega = 2.0 * PI * frequency / rate;
    let (sin, cos) = omega.sin_cos();
    let alpha = sin / (2.0 * q.max(0.0001));
    let (b0, b1, b2) = match kind {
        FilterKind::Bandpass => (alpha, 0.0, -alpha),
        FilterKind::Lowpass => ((1.0 - cos) / 2.0, 1.0 - cos, (1.0 - cos) / 2.0),
        FilterKind::Highpass => ((1.0 + cos) / 2.0, -(1.0 + cos), (1.0 + cos) / 2.0),
    };
    let a0 = 1.0 + alpha;
    [b0 / a0, b1 / a0, b2 / a0, -2.0 * cos / a0, (1.0 - alpha) / a0]
}

fn pan_stereo((left, right): (f64, f64), pan: f64) -> (f64, f64) {
    let pan = pan.clamp(-1.0, 1.0);
    if pan <= 0.0 {
        let angle = (pan + 1.0) * PI / 2.0;
        (left + right * angle.cos(), right * angle.sin())
    } else {
        let angle = pan * PI / 2.0;
        (left * angle.cos(), right + left * angle.sin())
    }
}

fn compress(limiter: &LimiterConfig, envelope: &mut f64, (left, right): (f64, f64), rate: f64) -> (f64, f64) {
    let level = left.abs().max(right.abs());
    let coefficient = if level > *envelope {
        (-1.0 / (limiter.attack * rate)).exp()
    } else {
        (-1.0 / (limiter.release * rate)).exp()
    };
    *envelope = coefficient * *envelope + (1.0 - coefficient) * level;

    let reduction = limiter.gain_reduction_db(linear_to_db(*envelope));
    let gain = db_to_linear(reduction) * limiter.makeup_gain();
    (left * gain, right * gain)
}

fn quantize(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16
}
