use std::sync::Arc;

use dingdong_core::{
    AttemptGraph, ChimeProfile, GAIN_FLOOR, NoiseTransientCache, ScheduleContext, VoiceKind,
    graph::{NodeKind, ParamEvent, Waveform},
};
use proptest::prelude::*;

fn context(now: f64, panning: bool) -> ScheduleContext {
    ScheduleContext {
        now,
        sample_rate: 48_000,
        noise: NoiseTransientCache::new().get(48_000),
        panning,
    }
}

fn schedule(profile: ChimeProfile, ctx: &ScheduleContext) -> AttemptGraph {
    let mut graph = AttemptGraph::new(ctx.now);
    profile.schedule(&mut graph, ctx);
    graph
}

fn approx(left: f64, right: f64) -> bool {
    (left - right).abs() < 1e-9
}

#[test]
fn two_tone_ding_matches_its_recipe() {
    let graph = schedule(ChimeProfile::TwoToneDing, &context(2.0, true));
    assert_eq!(graph.nodes().len(), 5);
    assert_eq!(graph.source_count(), 2);

    let expected = [(659.25, 0.0, 0.35, 0.24), (523.25, 0.38, 0.65, 0.26)];
    assert_eq!(graph.notes().len(), expected.len());
    for (note, (frequency, offset, duration, peak)) in graph.notes().iter().zip(expected) {
        assert_eq!(note.kind, VoiceKind::Tone);
        assert!(approx(note.frequency, frequency));
        assert!(approx(note.start_offset, offset));
        assert!(approx(note.end_offset, offset + duration));

        let start = 2.0 + offset;
        let gain = graph.param(note.gain_node).expect("tone gain should be automated");
        assert!(approx(gain.value_at(start), GAIN_FLOOR));
        assert!(approx(gain.value_at(start + 0.01), peak));
        assert!(approx(gain.value_at(start + duration), GAIN_FLOOR));

        let oscillator = graph.inputs_of(note.gain_node)[0];
        let node = graph.node(oscillator);
        assert!(matches!(
            node.kind,
            NodeKind::Oscillator {
                waveform: Waveform::Sine,
                ..
            }
        ));
        let window = node.window.expect("oscillator should carry a window");
        assert!(approx(window.start, start));
        assert!(approx(window.stop, start + duration + 0.02));
        assert_eq!(graph.node(note.gain_node).outputs, vec![graph.destination()]);
    }
}

#[test]
fn bell_pair_strikes_two_bells_with_shared_noise() {
    let ctx = context(0.5, true);
    let graph = schedule(ChimeProfile::BellPairChime, &ctx);

    let offsets: Vec<f64> = graph.notes().iter().map(|note| note.start_offset).collect();
    assert_eq!(graph.notes().len(), 2);
    assert!(approx(offsets[0], 0.0));
    assert!(approx(offsets[1], 0.37));
    assert!(graph.notes().iter().all(|note| note.kind == VoiceKind::Bell));
    assert_eq!(graph.source_count(), 10);

    let strikes: Vec<_> = graph
        .nodes()
        .iter()
        .filter_map(|node| match &node.kind {
            NodeKind::BufferSource { buffer } => Some(buffer),
            _ => None,
        })
        .collect();
    assert_eq!(strikes.len(), 2);
    assert!(strikes.iter().all(|buffer| Arc::ptr_eq(buffer, &ctx.noise)));
}

#[test]
fn deep_pad_sweeps_its_sub_oscillator() {
    let graph = schedule(ChimeProfile::DeepStereoPad, &context(1.0, true));
    let sub = graph
        .notes()
        .iter()
        .find(|note| note.kind == VoiceKind::SubSweep)
        .expect("pad should schedule a sub sweep");
    let oscillator = graph.inputs_of(sub.gain_node)[0];
    let frequency = graph
        .param(oscillator)
        .expect("sub oscillator frequency should be automated");

    assert!(approx(frequency.value_at(1.0), 98.0));
    assert!(approx(frequency.value_at(2.1), 69.0));
    assert!(frequency.value_at(1.5) < 98.0 && frequency.value_at(1.5) > 69.0);

    let stereo_notes = graph
        .notes()
        .iter()
        .filter(|note| note.kind == VoiceKind::StereoNote)
        .count();
    let shimmers = graph
        .notes()
        .iter()
        .filter(|note| note.kind == VoiceKind::Shimmer)
        .count();
    assert_eq!((stereo_notes, shimmers), (3, 3));
}

#[test]
fn wand_arpeggio_steps_through_four_notes() {
    let graph = schedule(ChimeProfile::MagicWandArpeggio, &context(0.0, true));
    let bodies: Vec<f64> = graph
        .notes()
        .iter()
        .filter(|note| note.kind == VoiceKind::WandBody)
        .map(|note| note.start_offset)
        .collect();
    assert_eq!(bodies.len(), 4);
    for (step, offset) in bodies.iter().enumerate() {
        assert!(approx(*offset, step as f64 * 0.07));
    }

    for sparkle in graph.notes().iter().filter(|note| note.kind == VoiceKind::Sparkle) {
        let body = graph
            .notes()
            .iter()
            .find(|note| note.kind == VoiceKind::WandBody && approx(note.start_offset, sparkle.start_offset))
            .expect("every sparkle should sit on a body note");
        assert!(approx(sparkle.frequency, body.frequency * 2.0));
    }
}

#[test]
fn devices_without_panning_get_no_panners() {
    for profile in ChimeProfile::ALL {
        let graph = schedule(profile, &context(0.0, false));
        assert!(
            !graph
                .nodes()
                .iter()
                .any(|node| matches!(node.kind, NodeKind::StereoPanner { .. })),
            "{profile} should not pan"
        );
    }
}

fn any_profile() -> impl Strategy<Value = ChimeProfile> {
    prop::sample::select(ChimeProfile::ALL.to_vec())
}

proptest! {
    #[test]
    fn envelopes_start_and_end_at_the_floor(profile in any_profile(), now in 0.0_f64..1_000.0) {
        let graph = schedule(profile, &context(now, true));

        for note in graph.notes() {
            prop_assert!(note.start_offset >= -1e-9);
            prop_assert!(note.end_offset > note.start_offset);
        }

        for node in graph.nodes() {
            if let Some(window) = node.window {
                prop_assert!(window.start >= now - 1e-9);
                prop_assert!(window.stop > window.start);
            }
            let NodeKind::Gain { gain } = &node.kind else {
                continue;
            };
            if !gain.is_automated() {
                continue;
            }
            let events = gain.events();
            prop_assert_eq!(events.len(), 3);
            prop_assert!(events[1].value() > GAIN_FLOOR);
            let starts_at_floor = matches!(
                events[0],
                ParamEvent::SetValue { value, .. } if (value - GAIN_FLOOR).abs() < 1e-12
            );
            prop_assert!(starts_at_floor);
            prop_assert!((events[events.len() - 1].value() - GAIN_FLOOR).abs() < 1e-12);
            prop_assert!(events.iter().all(|event| event.value() >= GAIN_FLOOR));
            prop_assert!(events.windows(2).all(|pair| pair[0].time() <= pair[1].time()));
        }
    }

    #[test]
    fn note_offsets_do_not_depend_on_the_clock(profile in any_profile(), now in 0.0_f64..500.0) {
        let anchored = schedule(profile, &context(0.0, true));
        let shifted = schedule(profile, &context(now, true));

        prop_assert_eq!(anchored.nodes().len(), shifted.nodes().len());
        for (left, right) in anchored.notes().iter().zip(shifted.notes()) {
            prop_assert_eq!(left.kind, right.kind);
            prop_assert!((left.start_offset - right.start_offset).abs() < 1e-6);
            prop_assert!((left.end_offset - right.end_offset).abs() < 1e-6);
        }
    }
}
