//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;

use log::{info, warn};

use crate::dsp::MasteringPipeline;
use crate::engine::{export_audio, import_audio, AudioAnalysis, WavCodec};
use crate::error::Result;
use crate::presets::PresetStore;

fn load_presets(presets: Option<&Path>) -> Result<PresetStore> {
    match presets {
        Some(path) => PresetStore::load(path),
        None => Ok(PresetStore::with_defaults()),
    }
}

/// Master `input` into `output` with the named preset.
pub fn master(
    input: &Path,
    output: &Path,
    preset: &str,
    presets: Option<&Path>,
    target_lufs: Option<f32>,
) -> Result<()> {
    let store = load_presets(presets)?;
    if !store.contains(preset) {
        warn!("Unknown preset '{}', using stage defaults", preset);
    }

    let mut config = store.resolve(preset);
    if let Some(lufs) = target_lufs {
        config = config.with_target_loudness(lufs);
    }

    info!("Reading {}", input.display());
    let buffer = import_audio(input, &WavCodec)?;

    let pipeline = MasteringPipeline::new().with_presets(store);
    let (mastered, report) = pipeline.process_with_report(&buffer, &config)?;

    export_audio(&mastered, output, &WavCodec)?;

    print!("{}", report);
    println!("Written: {}", output.display());
    Ok(())
}

/// List presets with their resolved settings.
pub fn list_presets(presets: Option<&Path>) -> Result<()> {
    let store = load_presets(presets)?;

    println!(
        "{:<16} {:<8} {:>8} {:>8} {:>6} {:>8} {:>8} {:>8}",
        "NAME", "DENOISE", "LUFS", "THRESH", "RATIO", "ATTACK", "RELEASE", "CEILING"
    );
    for name in store.list() {
        let c = store.resolve(name);
        println!(
            "{:<16} {:<8} {:>8.1} {:>8.1} {:>6.1} {:>8.1} {:>8.1} {:>8.1}",
            c.name,
            c.denoise_strength.as_str(),
            c.target_loudness,
            c.threshold_db,
            c.ratio,
            c.attack_ms,
            c.release_ms,
            c.ceiling_db
        );
    }
    Ok(())
}

/// Print measurements for an audio file.
pub fn analyze(input: &Path) -> Result<()> {
    info!("Analyzing {}", input.display());

    let buffer = import_audio(input, &WavCodec)?;
    let analysis = AudioAnalysis::analyze(&buffer);

    println!("{}", input.display());
    println!("{}", analysis.summary());
    Ok(())
}
