use std::sync::Arc;

use serde::Serialize;

use crate::noise::NoiseBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Waveform {
    Sine,
    Triangle,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Bandpass,
    Lowpass,
    Highpass,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamEvent {
    SetValue { value: f64, time: f64 },
    ExponentialRamp { value: f64, time: f64 },
}

impl ParamEvent {
    #[must_use]
    pub fn time(&self) -> f64 {
        match *self {
            Self::SetValue { time, .. } | Self::ExponentialRamp { time, .. } => time,
        }
    }

    #[must_use]
    pub fn value(&self) -> f64 {
        match *self {
            Self::SetValue { value, .. } | Self::ExponentialRamp { value, .. } => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioParam {
    pub default_value: f64,
    events: Vec<ParamEvent>,
}

impl AudioParam {
    #[must_use]
    pub fn new(default_value: f64) -> Self {
        Self {
            default_value,
            events: Vec::new(),
        }
    }

    pub fn set_value_at_time(&mut self, value: f64, time: f64) -> &mut Self {
        self.insert(ParamEvent::SetValue { value, time });
        self
    }

    pub fn exponential_ramp_to_value_at_time(&mut self, value: f64, time: f64) -> &mut Self {
        self.insert(ParamEvent::ExponentialRamp { value, time });
        self
    }

    #[must_use]
    pub fn events(&self) -> &[ParamEvent] {
        &self.events
    }

    #[must_use]
    pub fn is_automated(&self) -> bool {
        !self.events.is_empty()
    }

    /// A ramp interpolates from the previous event (or the default value) to
    /// its own target. Exponential ramps between values of different sign or
    /// from zero hold the previous value until the ramp end.
    #[must_use]
    pub fn value_at(&self, time: f64) -> f64 {
        let mut previous_time = f64::NEG_INFINITY;
        let mut previous_value = self.default_value;

        for event in &self.events {
            if event.time() <= time {
                previous_time = event.time();
                previous_value = event.value();
                continue;
            }

            if let ParamEvent::ExponentialRamp { value, time: end } = *event {
                let valid_ramp = previous_time.is_finite()
                    && previous_value != 0.0
                    && previous_value.signum() == value.signum()
                    && end > previous_time;
                if valid_ramp {
                    let progress = (time - previous_time) / (end - previous_time);
                    return previous_value * (value / previous_value).powf(progress);
                }
            }
            break;
        }

        previous_value
    }

    fn insert(&mut self, event: ParamEvent) {
        let index = self
            .events
            .partition_point(|existing| existing.time() <= event.time());
        self.events.insert(index, event);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Destination,
    Oscillator {
        waveform: Waveform,
        frequency: AudioParam,
    },
    BufferSource {
        buffer: Arc<NoiseBuffer>,
    },
    Gain {
        gain: AudioParam,
    },
    Delay {
        delay_time: f64,
    },
    BiquadFilter {
        kind: FilterKind,
        frequency: AudioParam,
        q: AudioParam,
    },
    StereoPanner {
        pan: AudioParam,
    },
    Compressor {
        threshold_db: f64,
        knee_db: f64,
        ratio: f64,
        attack: f64,
        release: f64,
    },
}

impl NodeKind {
    #[must_use]
    pub fn is_source(&self) -> bool {
        matches!(self, Self::Oscillator { .. } | Self::BufferSource { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SourceWindow {
    pub start: f64,
    pub stop: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub kind: NodeKind,
    pub window: Option<SourceWindow>,
    pub outputs: Vec<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceKind {
    Tone,
    Bell,
    SubSweep,
    StereoNote,
    Shimmer,
    WandBody,
    Sparkle,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Note {
    pub kind: VoiceKind,
    pub frequency: f64,
    pub start_offset: f64,
    pub end_offset: f64,
    pub gain_node: NodeId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptGraph {
    origin: f64,
    nodes: Vec<Node>,
    notes: Vec<Note>,
}

impl AttemptGraph {
    #[must_use]
    pub fn new(origin: f64) -> Self {
        Self {
            origin,
            nodes: vec![Node {
                kind: NodeKind::Destination,
                window: None,
                outputs: Vec::new(),
            }],
            notes: Vec::new(),
        }
    }

    #[must_use]
    pub fn origin(&self) -> f64 {
        self.origin
    }

    #[must_use]
    pub fn destination(&self) -> NodeId {
        NodeId(0)
    }

    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    #[must_use]
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    #[must_use]
    pub fn source_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.kind.is_source()).count()
    }

    #[must_use]
    pub fn end_time(&self) -> f64 {
        self.nodes
            .iter()
            .filter_map(|node| node.window.map(|window| window.stop))
            .fold(self.origin, f64::max)
    }

    pub fn oscillator(
        &mut self,
        waveform: Waveform,
        frequency: f64,
        start: f64,
        stop: f64,
    ) -> NodeId {
        self.push_source(
            NodeKind::Oscillator {
                waveform,
                frequency: AudioParam::new(frequency),
            },
            start,
            stop,
        )
    }

    pub fn buffer_source(&mut self, buffer: Arc<NoiseBuffer>, start: f64, stop: f64) -> NodeId {
        self.push_source(NodeKind::BufferSource { buffer }, start, stop)
    }

    pub fn gain(&mut self, value: f64) -> NodeId {
        self.push(NodeKind::Gain {
            gain: AudioParam::new(value),
        })
    }

    pub fn delay(&mut self, delay_time: f64) -> NodeId {
        self.push(NodeKind::Delay {
            delay_time: delay_time.max(0.0),
        })
    }

    pub fn biquad(&mut self, kind: FilterKind, frequency: f64, q: f64) -> NodeId {
        self.push(NodeKind::BiquadFilter {
            kind,
            frequency: AudioParam::new(frequency),
            q: AudioParam::new(q),
        })
    }

    pub fn stereo_panner(&mut self, pan: f64) -> NodeId {
        self.push(NodeKind::StereoPanner {
            pan: AudioParam::new(pan.clamp(-1.0, 1.0)),
        })
    }

    pub fn compressor(
        &mut self,
        threshold_db: f64,
        knee_db: f64,
        ratio: f64,
        attack: f64,
        release: f64,
    ) -> NodeId {
        self.push(NodeKind::Compressor {
            threshold_db,
            knee_db,
            ratio,
            attack,
            release,
        })
    }

    pub fn connect(&mut self, from: NodeId, to: NodeId) {
        let outputs = &mut self.nodes[from.0].outputs;
        if !outputs.contains(&to) {
            outputs.push(to);
        }
    }

    pub fn param_mut(&mut self, id: NodeId) -> Option<&mut AudioParam> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Gain { gain } => Some(gain),
            NodeKind::Oscillator { frequency, .. } | NodeKind::BiquadFilter { frequency, .. } => {
                Some(frequency)
            }
            NodeKind::StereoPanner { pan } => Some(pan),
            NodeKind::Destination
            | NodeKind::BufferSource { .. }
            | NodeKind::Delay { .. }
            | NodeKind::Compressor { .. } => None,
        }
    }

    #[must_use]
    pub fn param(&self, id: NodeId) -> Option<&AudioParam> {
        match &self.nodes[id.0].kind {
            NodeKind::Gain { gain } => Some(gain),
            NodeKind::Oscillator { frequency, .. } | NodeKind::BiquadFilter { frequency, .. } => {
                Some(frequency)
            }
            NodeKind::StereoPanner { pan } => Some(pan),
            NodeKind::Destination
            | NodeKind::BufferSource { .. }
            | NodeKind::Delay { .. }
            | NodeKind::Compressor { .. } => None,
        }
    }

    pub fn record_note(&mut self, note: Note) {
        self.notes.push(note);
    }

    #[must_use]
    pub fn inputs_of(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.outputs.contains(&id))
            .map(|(index, _)| NodeId(index))
            .collect()
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Node {
            kind,
            window: None,
            outputs: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    fn push_source(&mut self, kind: NodeKind, start: f64, stop: f64) -> NodeId {
        let id = self.push(kind);
        self.nodes[id.0].window = Some(SourceWindow {
            start,
            stop: stop.max(start),
        });
        id
    }
}
