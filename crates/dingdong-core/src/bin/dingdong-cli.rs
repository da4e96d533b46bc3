use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use dingdong_core::{
    AppConfig, AudioEngine, ChimeProfile, OfflineHost, PlaybackOutcome,
    diagnostics::init_tracing_from_config,
    fingerprint::{generate_all_reports, write_schedule_reports},
    render::{export_wav, render_graph},
};

#[derive(Debug, Parser)]
#[command(name = "dingdong-cli")]
#[command(about = "Headless tools for previewing and fingerprinting chime profiles")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Overrides the configured log directory.
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Render {
        #[arg(long, value_enum)]
        profile: Option<ProfileArg>,

        #[arg(long, default_value = "data/renders/chime.wav")]
        output: PathBuf,

        #[arg(long)]
        sample_rate: Option<u32>,
    },
    Fingerprint {
        #[arg(long, default_value = "data/fingerprints/schedules.json")]
        output: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProfileArg {
    TwoToneDing,
    DeepStereoPad,
    BellPairChime,
    MagicWandArpeggio,
}

impl From<ProfileArg> for ChimeProfile {
    fn from(value: ProfileArg) -> Self {
        match value {
            ProfileArg::TwoToneDing => Self::TwoToneDing,
            ProfileArg::DeepStereoPad => Self::DeepStereoPad,
            ProfileArg::BellPairChime => Self::BellPairChime,
            ProfileArg::MagicWandArpeggio => Self::MagicWandArpeggio,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load_or_default()?;
    if let Some(log_dir) = cli.log_dir {
        config.diagnostics.log_dir = log_dir;
    }
    let _telemetry = init_tracing_from_config(&config.diagnostics)?;

    match cli.command {
        Commands::Render {
            profile,
            output,
            sample_rate,
        } => {
            let sample_rate = sample_rate.unwrap_or(config.render.sample_rate);
            let mut playback = config.playback.clone();
            if let Some(profile) = profile {
                playback.profile = profile.into();
            }

            let mut engine = AudioEngine::new(OfflineHost { sample_rate }, playback);
            let activation = engine.trigger().await;
            if activation.outcome != PlaybackOutcome::PlayedSynth {
                bail!("offline synthesis finished as {:?}", activation.outcome);
            }
            let graph = engine
                .clock()
                .and_then(|clock| clock.device().submitted().last())
                .context("offline device received no graph")?;

            let audio = render_graph(graph, sample_rate, config.render.tail_seconds)?;
            export_wav(&audio, &output)?;
            tracing::info!(
                path = %output.display(),
                peak = audio.peak(),
                profile = %engine.settings().profile,
                "chime rendered"
            );
        }
        Commands::Fingerprint { output } => {
            let reports = generate_all_reports(config.render.sample_rate)?;
            write_schedule_reports(&output, &reports)?;
            tracing::info!(path = %output.display(), profiles = reports.len(), "schedule fingerprints generated");
        }
    }

    Ok(())
}
