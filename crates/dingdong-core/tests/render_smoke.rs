use dingdong_core::{
    AudioEngine, ChimeProfile, OfflineHost, PlaybackConfig, PlaybackOutcome,
    render::{export_wav, render_graph},
};
use tempfile::tempdir;

#[tokio::test]
async fn engine_graph_renders_to_wav() {
    let mut engine = AudioEngine::new(
        OfflineHost {
            sample_rate: 22_050,
        },
        PlaybackConfig {
            profile: ChimeProfile::BellPairChime,
            ..PlaybackConfig::default()
        },
    );
    assert_eq!(engine.activate().await, PlaybackOutcome::PlayedSynth);

    let graph = engine
        .clock()
        .and_then(|clock| clock.device().submitted().first())
        .expect("offline device should hold the attempt graph");
    let audio = render_graph(graph, 22_050, 0.3).expect("render should succeed");
    assert!(audio.peak() > 0.01);

    let temp = tempdir().expect("tempdir should be creatable");
    let wav_path = temp.path().join("renders").join("bell.wav");
    export_wav(&audio, &wav_path).expect("wav export should succeed");

    let reader = hound::WavReader::open(&wav_path).expect("wav should be readable");
    let spec = reader.spec();
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.sample_rate, 22_050);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(reader.len() as usize, audio.frames() * 2);
}

#[test]
fn zero_sample_rate_is_rejected() {
    let graph = dingdong_core::AttemptGraph::new(0.0);
    assert!(render_graph(&graph, 0, 1.0).is_err());
}
