use std::{fs, path::Path};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::instrument;

use crate::{
    effects::EffectChainConfig,
    graph::AttemptGraph,
    noise::NoiseTransientCache,
    profile::{ChimeProfile, ScheduleContext},
};

const SCHEDULE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoteTiming {
    pub voice: String,
    pub frequency: f64,
    pub start_offset: f64,
    pub end_offset: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleReport {
    pub schema_version: u32,
    pub profile: ChimeProfile,
    pub sample_rate: u32,
    pub node_count: usize,
    pub source_count: usize,
    pub note_count: usize,
    pub schedule_hash: String,
    pub notes: Vec<NoteTiming>,
    pub effect_chain: Option<EffectChainConfig>,
    pub generated_at: DateTime<Utc>,
}

/// The hash covers node kinds, automation and wiring. Noise contents are
/// random per buffer and only contribute their frame count.
#[instrument]
pub fn generate_schedule_report(profile: ChimeProfile, sample_rate: u32) -> Result<ScheduleReport> {
    let mut graph = AttemptGraph::new(0.0);
    let context = ScheduleContext {
        now: 0.0,
        sample_rate,
        noise: NoiseTransientCache::new().get(sample_rate),
        panning: true,
    };
    profile.schedule(&mut graph, &context);

    let graph_bytes = serde_json::to_vec(&graph)
        .with_context(|| format!("failed to serialize {profile} graph"))?;
    let notes = graph
        .notes()
        .iter()
        .map(|note| NoteTiming {
            voice: format!("{:?}", note.kind),
            frequency: note.frequency,
            start_offset: note.start_offset,
            end_offset: note.end_offset,
        })
        .collect();

    Ok(ScheduleReport {
        schema_version: SCHEDULE_SCHEMA_VERSION,
        profile,
        sample_rate,
        node_count: graph.nodes().len(),
        source_count: graph.source_count(),
        note_count: graph.notes().len(),
        schedule_hash: hash_hex(&graph_bytes),
        notes,
        effect_chain: profile.effect_chain(),
        generated_at: Utc::now(),
    })
}

pub fn generate_all_reports(sample_rate: u32) -> Result<Vec<ScheduleReport>> {
    ChimeProfile::ALL
        .into_iter()
        .map(|profile| generate_schedule_report(profile, sample_rate))
        .collect()
}

pub fn read_schedule_reports(path: &Path) -> Result<Vec<ScheduleReport>> {
    let bytes = fs::read(path)
        .with_context(|| format!("failed to read schedule report: {}", path.display()))?;
    let reports: Vec<ScheduleReport> =
        serde_json::from_slice(&bytes).context("failed to parse schedule report json")?;
    Ok(reports)
}

pub fn write_schedule_reports(path: &Path, reports: &[ScheduleReport]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!("failed to create report directory: {}", parent.display())
        })?;
    }

    let json =
        serde_json::to_vec_pretty(reports).context("failed to encode schedule report json")?;
    fs::write(path, json)
        .with_context(|| format!("failed to write schedule report: {}", path.display()))?;
    Ok(())
}

fn hash_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("{digest:x}")
}
