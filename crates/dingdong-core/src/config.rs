use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::profile::ChimeProfile;

pub const CONFIG_FILE_NAME: &str = "dingdong.config.toml";
pub const CONFIG_PATH_ENV: &str = "DINGDONG_CONFIG_PATH";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub playback: PlaybackConfig,
    pub render: RenderConfig,
    pub diagnostics: DiagnosticsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybackConfig {
    pub profile: ChimeProfile,
    /// Synthesize a chime when the asset cannot be played.
    pub has_fallback: bool,
    pub asset_volume: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    pub sample_rate: u32,
    pub tail_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub rust_log_filter: String,
    pub trace_file_prefix: String,
    pub log_dir: PathBuf,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            profile: ChimeProfile::default(),
            has_fallback: true,
            asset_volume: 0.72,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            tail_seconds: 1.5,
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            rust_log_filter: "info,dingdong_core=debug".to_string(),
            trace_file_prefix: "dingdong".to_string(),
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let config_path = discover_config_path().with_context(|| {
            format!("failed to locate {CONFIG_FILE_NAME}; looked in cwd and parent directory")
        })?;
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse config TOML from {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config in {}", path.display()))?;

        Ok(config)
    }

    pub fn load_or_default() -> Result<Self> {
        match discover_config_path() {
            Ok(path) => Self::load_from(&path),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let volume = self.playback.asset_volume;
        if !(0.0..=1.0).contains(&volume) {
            anyhow::bail!("playback.asset_volume {volume} must be within 0.0..=1.0");
        }
        if self.render.sample_rate < 8_000 {
            anyhow::bail!(
                "render.sample_rate {} must be at least 8000",
                self.render.sample_rate
            );
        }
        if !(self.render.tail_seconds.is_finite() && self.render.tail_seconds >= 0.0) {
            anyhow::bail!(
                "render.tail_seconds {} must be non-negative",
                self.render.tail_seconds
            );
        }
        if let Some(chain) = self.playback.profile.effect_chain() {
            chain
                .validate()
                .with_context(|| format!("profile {} has an invalid chain", self.playback.profile))?;
        }
        Ok(())
    }
}

fn discover_config_path() -> Result<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.is_file() {
            return Ok(path);
        }
    }

    let cwd = env::current_dir().context("failed to resolve current directory")?;
    let candidates = [
        cwd.join(CONFIG_FILE_NAME),
        cwd.join("..").join(CONFIG_FILE_NAME),
    ];

    candidates
        .into_iter()
        .find(|path| path.is_file())
        .ok_or_else(|| anyhow::anyhow!("{CONFIG_FILE_NAME} not found"))
}
