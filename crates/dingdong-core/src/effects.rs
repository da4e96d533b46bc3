use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    graph::{AttemptGraph, NodeId},
    voice::route_panned,
};

pub const MAX_FEEDBACK_GAIN: f64 = 0.95;

/// Share of the full-range gain reduction the limiter gives back as makeup gain.
const MAKEUP_EXPONENT: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EffectChainError {
    #[error("echo feedback gain {0} must be below 1.0")]
    UnstableFeedback(f64),
    #[error("delay time {0}s must be positive and finite")]
    InvalidDelay(f64),
    #[error("invalid limiter setting: {0}")]
    InvalidLimiter(String),
    #[error("output level {0} must be positive and finite")]
    InvalidOutputLevel(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimiterConfig {
    pub threshold_db: f64,
    pub knee_db: f64,
    pub ratio: f64,
    pub attack: f64,
    pub release: f64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            threshold_db: -10.0,
            knee_db: 6.0,
            ratio: 12.0,
            attack: 0.003,
            release: 0.25,
        }
    }
}

impl LimiterConfig {
    /// Static gain reduction (dB, `<= 0`) applied to a signal at `input_db`.
    #[must_use]
    pub fn gain_reduction_db(&self, input_db: f64) -> f64 {
        let slope = 1.0 - 1.0 / self.ratio.max(1.0);
        if self.knee_db <= 0.0 {
            if input_db <= self.threshold_db {
                return 0.0;
            }
            return (self.threshold_db - input_db) * slope;
        }

        let half_knee = self.knee_db / 2.0;
        let knee_start = self.threshold_db - half_knee;
        let knee_end = self.threshold_db + half_knee;
        if input_db <= knee_start {
            0.0
        } else if input_db >= knee_end {
            (self.threshold_db - input_db) * slope
        } else {
            let position = (input_db - knee_start) / self.knee_db;
            -position * position * slope * half_knee
        }
    }

    #[must_use]
    pub fn static_curve_db(&self, input_db: f64) -> f64 {
        input_db + self.gain_reduction_db(input_db)
    }

    #[must_use]
    pub fn makeup_gain(&self) -> f64 {
        db_to_linear(-MAKEUP_EXPONENT * self.gain_reduction_db(0.0))
    }

    fn validate(&self) -> Result<(), EffectChainError> {
        if !(self.ratio.is_finite() && self.ratio >= 1.0) {
            return Err(EffectChainError::InvalidLimiter(format!(
                "ratio {} must be >= 1",
                self.ratio
            )));
        }
        if !(self.threshold_db.is_finite() && self.threshold_db <= 0.0) {
            return Err(EffectChainError::InvalidLimiter(format!(
                "threshold {}dB must be <= 0",
                self.threshold_db
            )));
        }
        if !(self.knee_db.is_finite() && self.knee_db >= 0.0) {
            return Err(EffectChainError::InvalidLimiter(format!(
                "knee {}dB must be >= 0",
                self.knee_db
            )));
        }
        if !(self.attack > 0.0 && self.release > 0.0) {
            return Err(EffectChainError::InvalidLimiter(
                "attack and release must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EchoConfig {
    pub delay_time: f64,
    pub feedback_gain: f64,
    pub wet_gain: f64,
}

impl EchoConfig {
    fn validate(&self) -> Result<(), EffectChainError> {
        if !(self.feedback_gain.is_finite() && self.feedback_gain < 1.0) {
            return Err(EffectChainError::UnstableFeedback(self.feedback_gain));
        }
        validate_delay(self.delay_time)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReflectionConfig {
    pub left_delay: f64,
    pub right_delay: f64,
    pub stereo_spread: f64,
    pub gain: f64,
}

impl ReflectionConfig {
    fn validate(&self) -> Result<(), EffectChainError> {
        validate_delay(self.left_delay)?;
        validate_delay(self.right_delay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectChainConfig {
    pub limiter: Option<LimiterConfig>,
    pub output_level: f64,
    pub echo: Option<EchoConfig>,
    pub early_reflections: Option<ReflectionConfig>,
}

impl Default for EffectChainConfig {
    fn default() -> Self {
        Self {
            limiter: Some(LimiterConfig::default()),
            output_level: 0.8,
            echo: None,
            early_reflections: None,
        }
    }
}

impl EffectChainConfig {
    pub fn validate(&self) -> Result<(), EffectChainError> {
        if let Some(limiter) = &self.limiter {
            limiter.validate()?;
        }
        if !(self.output_level.is_finite() && self.output_level > 0.0) {
            return Err(EffectChainError::InvalidOutputLevel(self.output_level));
        }
        if let Some(echo) = &self.echo {
            echo.validate()?;
        }
        if let Some(reflections) = &self.early_reflections {
            reflections.validate()?;
        }
        Ok(())
    }

    #[must_use]
    pub fn output_gain(&self) -> f64 {
        match &self.limiter {
            Some(limiter) => self.output_level / limiter.makeup_gain(),
            None => self.output_level,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoNodes {
    pub delay: NodeId,
    pub feedback: NodeId,
    pub wet: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReflectionNodes {
    pub left_delay: NodeId,
    pub right_delay: NodeId,
    pub gain: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectChain {
    pub master_bus: NodeId,
    pub limiter: Option<NodeId>,
    pub output_gain: NodeId,
    pub echo: Option<EchoNodes>,
    pub reflections: Option<ReflectionNodes>,
}

impl EffectChain {
    pub fn build(graph: &mut AttemptGraph, config: &EffectChainConfig, panning: bool) -> Self {
        if let Err(error) = config.validate() {
            warn!(%error, "effect chain config invalid, clamping to safe values");
        }

        let destination = graph.destination();
        let master_bus = graph.gain(1.0);
        let limiter_node = config.limiter.map(|limiter| {
            graph.compressor(
                limiter.threshold_db.min(0.0),
                limiter.knee_db.max(0.0),
                limiter.ratio.max(1.0),
                limiter.attack.max(0.0001),
                limiter.release.max(0.001),
            )
        });
        let output_gain = graph.gain(config.output_gain());
        let dry_input = match limiter_node {
            Some(limiter) => {
                graph.connect(limiter, output_gain);
                limiter
            }
            None => output_gain,
        };
        graph.connect(master_bus, dry_input);
        graph.connect(output_gain, destination);

        let echo = config.echo.map(|echo| {
            let delay = graph.delay(echo.delay_time);
            let feedback = graph.gain(echo.feedback_gain.clamp(0.0, MAX_FEEDBACK_GAIN));
            let wet = graph.gain(echo.wet_gain);
            graph.connect(master_bus, delay);
            graph.connect(delay, feedback);
            graph.connect(feedback, delay);
            graph.connect(delay, wet);
            graph.connect(wet, destination);
            EchoNodes {
                delay,
                feedback,
                wet,
            }
        });

        let reflections = match config.early_reflections {
            Some(reflections) => {
                let gain = graph.gain(reflections.gain);
                let left_delay = graph.delay(reflections.left_delay);
                let right_delay = graph.delay(reflections.right_delay);
                for (delay, pan) in [
                    (left_delay, -reflections.stereo_spread),
                    (right_delay, reflections.stereo_spread),
                ] {
                    graph.connect(master_bus, delay);
                    route_panned(graph, delay, pan, panning, gain);
                }
                graph.connect(gain, dry_input);
                Some(ReflectionNodes {
                    left_delay,
                    right_delay,
                    gain,
                })
            }
            None => None,
        };

        debug!(
            output_gain = config.output_gain(),
            limiter = limiter_node.is_some(),
            echo = echo.is_some(),
            reflections = reflections.is_some(),
            "effect chain assembled"
        );

        Self {
            master_bus,
            limiter: limiter_node,
            output_gain,
            echo,
            reflections,
        }
    }
}

#[must_use]
pub fn db_to_linear(db: f64) -> f64 {
    10_f64.powf(db / 20.0)
}

#[must_use]
pub fn linear_to_db(linear: f64) -> f64 {
    if linear <= 0.0 {
        -120.0
    } else {
        20.0 * linear.log10()
    }
}

fn validate_delay(delay_time: f64) -> Result<(), EffectChainError> {
    if delay_time.is_finite() && delay_time > 0.0 {
        Ok(())
    } else {
        Err(EffectChainError::InvalidDelay(delay_time))
    }
}
