use std::{cell::RefCell, rc::Rc, sync::Arc};

use dingdong_core::{
    Activation, AssetPlayer, AttemptGraph, AudioEngine, AudioHost, ChimeProfile, DeviceState,
    NoAsset, NoiseTransientCache, OfflineDevice, OfflineHost, OutputDevice, PlaybackAttempt,
    PlaybackConfig, PlaybackError, PlaybackOutcome, ScheduleContext, graph::NodeKind,
};

#[derive(Debug, Default)]
struct AssetLog {
    resets: usize,
    plays: usize,
    paused: bool,
    volume: Option<f32>,
}

#[derive(Debug, Clone)]
struct ScriptedAsset {
    result: Result<(), PlaybackError>,
    log: Rc<RefCell<AssetLog>>,
}

impl ScriptedAsset {
    fn new(result: Result<(), PlaybackError>) -> (Self, Rc<RefCell<AssetLog>>) {
        let log = Rc::new(RefCell::new(AssetLog::default()));
        (
            Self {
                result,
                log: Rc::clone(&log),
            },
            log,
        )
    }
}

impl AssetPlayer for ScriptedAsset {
    fn reset_position(&mut self) {
        self.log.borrow_mut().resets += 1;
    }

    async fn play(&mut self) -> Result<(), PlaybackError> {
        self.log.borrow_mut().plays += 1;
        self.result.clone()
    }

    fn pause(&mut self) {
        self.log.borrow_mut().paused = true;
    }

    fn set_volume(&mut self, volume: f32) {
        self.log.borrow_mut().volume = Some(volume);
    }
}

#[derive(Debug, Default)]
struct UnavailableHost {
    opens: usize,
}

impl AudioHost for UnavailableHost {
    type Device = OfflineDevice;

    fn open(&mut self) -> Result<Self::Device, PlaybackError> {
        self.opens += 1;
        Err(PlaybackError::OutputUnavailable(
            "no audio capability".to_string(),
        ))
    }
}

#[derive(Debug)]
struct ClosedDevice;

impl OutputDevice for ClosedDevice {
    fn state(&self) -> DeviceState {
        DeviceState::Closed
    }

    async fn resume(&mut self) -> Result<(), PlaybackError> {
        Err(PlaybackError::OutputUnavailable("closed".to_string()))
    }

    fn current_time(&self) -> f64 {
        0.0
    }

    fn sample_rate(&self) -> u32 {
        48_000
    }

    fn submit(&mut self, _graph: AttemptGraph) {
        panic!("closed device must never receive a graph");
    }
}

struct ClosedHost;

impl AudioHost for ClosedHost {
    type Device = ClosedDevice;

    fn open(&mut self) -> Result<Self::Device, PlaybackError> {
        Ok(ClosedDevice)
    }
}

fn settings(profile: ChimeProfile) -> PlaybackConfig {
    PlaybackConfig {
        profile,
        ..PlaybackConfig::default()
    }
}

fn offline_engine(profile: ChimeProfile) -> AudioEngine<OfflineHost, NoAsset> {
    AudioEngine::new(
        OfflineHost {
            sample_rate: 48_000,
        },
        settings(profile),
    )
}

fn submitted<A: AssetPlayer>(engine: &AudioEngine<OfflineHost, A>) -> &[AttemptGraph] {
    engine
        .clock()
        .map(|clock| clock.device().submitted())
        .unwrap_or_default()
}

#[tokio::test]
async fn failing_asset_falls_back_to_profile_notes() {
    let (asset, log) = ScriptedAsset::new(Err(PlaybackError::PlaybackBlocked(
        "autoplay policy".to_string(),
    )));
    let mut engine = offline_engine(ChimeProfile::TwoToneDing).with_asset(asset);

    let activation = engine.trigger().await;
    assert_eq!(activation.outcome, PlaybackOutcome::PlayedSynth);
    assert_eq!(log.borrow().plays, 1);
    assert_eq!(log.borrow().resets, 1);

    let mut expected = AttemptGraph::new(0.0);
    ChimeProfile::TwoToneDing.schedule(
        &mut expected,
        &ScheduleContext {
            now: 0.0,
            sample_rate: 48_000,
            noise: NoiseTransientCache::new().get(48_000),
            panning: true,
        },
    );
    assert_eq!(
        activation.attempt,
        Some(PlaybackAttempt::SynthesizedChime {
            profile: ChimeProfile::TwoToneDing,
            origin: 0.0,
            notes: expected.notes().to_vec(),
        })
    );
    assert_eq!(submitted(&engine), [expected].as_slice());
}

#[tokio::test]
async fn playing_asset_never_opens_the_output() {
    let (asset, log) = ScriptedAsset::new(Ok(()));
    let mut engine = offline_engine(ChimeProfile::BellPairChime).with_asset(asset);

    let activation = engine.trigger().await;
    assert_eq!(activation.outcome, PlaybackOutcome::PlayedAsset);
    assert_eq!(activation.attempt, Some(PlaybackAttempt::AssetPlayback));
    assert!(engine.clock().is_none());
    assert!(submitted(&engine).is_empty());
    assert_eq!(log.borrow().plays, 1);
}

#[test]
fn asset_volume_is_applied_when_installed() {
    let (asset, log) = ScriptedAsset::new(Ok(()));
    let _engine = offline_engine(ChimeProfile::TwoToneDing).with_asset(asset);

    let volume = log.borrow().volume.expect("volume should be set on install");
    assert!((volume - 0.72).abs() < f32::EPSILON);
}

fn origin_of(activation: &Activation) -> f64 {
    match &activation.attempt {
        Some(PlaybackAttempt::SynthesizedChime { origin, .. }) => *origin,
        other => panic!("expected synthesized chime, got {other:?}"),
    }
}

#[tokio::test]
async fn rapid_triggers_build_independent_graphs() {
    let mut engine = offline_engine(ChimeProfile::BellPairChime);

    let first = engine.trigger().await;
    let first_graph = submitted(&engine)[0].clone();
    engine
        .clock_mut()
        .expect("clock should be open after the first trigger")
        .device_mut()
        .advance(0.03);
    let second = engine.trigger().await;

    assert_ne!(first.attempt_id, second.attempt_id);
    assert!((origin_of(&second) - origin_of(&first) - 0.03).abs() < 1e-12);

    let graphs = submitted(&engine);
    assert_eq!(graphs.len(), 2);
    assert_eq!(graphs[0], first_graph);
    assert!((graphs[1].origin() - 0.03).abs() < 1e-12);
    assert_eq!(graphs[0].nodes().len(), graphs[1].nodes().len());
    for (early, late) in graphs[0].notes().iter().zip(graphs[1].notes()) {
        assert!((early.start_offset - late.start_offset).abs() < 1e-9);
        assert!((early.end_offset - late.end_offset).abs() < 1e-9);
    }
}

#[tokio::test]
async fn repeated_bell_triggers_share_one_noise_buffer() {
    let mut engine = offline_engine(ChimeProfile::BellPairChime);
    engine.trigger().await;
    engine.trigger().await;

    let strikes: Vec<_> = submitted(&engine)
        .iter()
        .flat_map(|graph| graph.nodes().iter())
        .filter_map(|node| match &node.kind {
            NodeKind::BufferSource { buffer } => Some(Arc::clone(buffer)),
            _ => None,
        })
        .collect();
    assert_eq!(strikes.len(), 4);
    assert!(strikes.iter().all(|buffer| Arc::ptr_eq(buffer, &strikes[0])));
    assert_eq!(engine.noise_cache().cached_sample_rate(), Some(48_000));
}

#[tokio::test]
async fn suspended_device_is_resumed_before_scheduling() {
    let mut engine = offline_engine(ChimeProfile::DeepStereoPad);
    assert_eq!(engine.activate().await, PlaybackOutcome::PlayedSynth);

    let clock = engine.clock().expect("clock should be open after synthesis");
    assert_eq!(clock.device().state(), DeviceState::Running);
    assert_eq!(clock.sample_rate(), 48_000);
}

#[tokio::test]
async fn missing_audio_capability_is_silent_and_retried() {
    let mut engine = AudioEngine::new(
        UnavailableHost::default(),
        settings(ChimeProfile::TwoToneDing),
    );

    let activation = engine.trigger().await;
    assert_eq!(activation.outcome, PlaybackOutcome::Silent);
    assert_eq!(activation.attempt, None);
    assert_eq!(engine.activate().await, PlaybackOutcome::Silent);
    assert_eq!(engine.host().opens, 2);
    assert!(engine.clock().is_none());
}

#[tokio::test]
async fn closed_device_is_silent() {
    let mut engine = AudioEngine::new(ClosedHost, settings(ChimeProfile::BellPairChime));
    assert_eq!(engine.activate().await, PlaybackOutcome::Silent);
}

#[tokio::test]
async fn fallback_disabled_stays_silent() {
    let (asset, log) = ScriptedAsset::new(Err(PlaybackError::AssetUnavailable(
        "404".to_string(),
    )));
    let mut engine = AudioEngine::new(
        OfflineHost {
            sample_rate: 48_000,
        },
        PlaybackConfig {
            has_fallback: false,
            ..PlaybackConfig::default()
        },
    )
    .with_asset(asset);

    assert_eq!(engine.activate().await, PlaybackOutcome::Silent);
    assert_eq!(log.borrow().plays, 1);
    assert!(engine.clock().is_none());
}

#[tokio::test]
async fn unrecoverable_asset_error_skips_synthesis() {
    let (asset, _log) = ScriptedAsset::new(Err(PlaybackError::OutputUnavailable(
        "device lost".to_string(),
    )));
    let mut engine = offline_engine(ChimeProfile::TwoToneDing).with_asset(asset);

    assert_eq!(engine.activate().await, PlaybackOutcome::Silent);
    assert!(submitted(&engine).is_empty());
}

#[tokio::test]
async fn no_asset_goes_straight_to_synthesis() {
    let mut engine = offline_engine(ChimeProfile::BellPairChime);
    let activation = engine.trigger().await;

    assert_eq!(activation.outcome, PlaybackOutcome::PlayedSynth);
    match activation.attempt {
        Some(PlaybackAttempt::SynthesizedChime { profile, notes, .. }) => {
            assert_eq!(profile, ChimeProfile::BellPairChime);
            assert_eq!(notes.len(), 2);
        }
        other => panic!("expected synthesized chime, got {other:?}"),
    }
}

#[tokio::test]
async fn release_pauses_and_drops_the_asset() {
    let (asset, log) = ScriptedAsset::new(Err(PlaybackError::PlaybackBlocked(
        "autoplay".to_string(),
    )));
    let mut engine = offline_engine(ChimeProfile::TwoToneDing).with_asset(asset);
    engine.release();
    assert!(log.borrow().paused);

    // Without an asset the next trigger synthesizes directly.
    assert_eq!(engine.activate().await, PlaybackOutcome::PlayedSynth);
    assert_eq!(log.borrow().plays, 0);
}
