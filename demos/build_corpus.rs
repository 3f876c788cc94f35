//! # REDE corpus build walkthrough
//!
//! Generates a sweep of synthetic ring-resonator designs, turns each mode family
//! into a residual-dispersion image, and serves the result through a seeded
//! train/test split. Set `RUST_LOG=rede_core=debug` to see per-sample logging.

use std::sync::Arc;

use rede_core::{
    BuildPolicy, DatasetOptions, GrayImage, GrayImageExt, Pipeline, PipelineConfig, RawSample, RedeDataset,
    PARAMETER_NAMES,
};
use tracing_subscriber::EnvFilter;

// ── Synthetic designs ────────────────────────────────────────────────────────

/// Mode family whose dispersion bends with `width2`: a wider outer ring pulls
/// the quadratic term up and the cubic term down.
fn design(id: u64, gap: f64, width2: f64) -> RawSample {
    let modes: Vec<f64> = (95..=125).map(f64::from).collect();
    let d2 = 1.5e9 + (width2 - 6e-7) * 2e16;
    let d3 = -4e6 * (width2 / 1e-6);
    let freqs = modes
        .iter()
        .map(|m| {
            let mu = m - 110.0;
            282e12 + 1.02e12 * mu + d2 * mu * mu + d3 * mu.powi(3)
        })
        .collect();
    RawSample::new(id, modes, freqs, vec![gap, 1.0e-6, 7.0e-7, 1.8e-5, width2])
}

/// One broken design: every frequency sits far below the 282 THz reference.
fn off_band(id: u64) -> RawSample {
    let modes: Vec<f64> = (100..=120).map(f64::from).collect();
    let freqs = modes.iter().map(|m| 150e12 + 1e12 * (m - 110.0)).collect();
    RawSample::new(id, modes, freqs, vec![0.0; PARAMETER_NAMES.len()])
}

// ── Display helpers ──────────────────────────────────────────────────────────

fn sketch(image: &GrayImage) {
    for row in image.pixel_rows().step_by(4) {
        let line: String = row
            .iter()
            .step_by(2)
            .map(|&v| if v == 255 { '█' } else { '·' })
            .collect();
        println!("    {line}");
    }
}

// ── Main ─────────────────────────────────────────────────────────────────────

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("REDE corpus build: 24 synthetic designs + 1 off-band family\n");

    let mut samples: Vec<RawSample> = (0..24)
        .map(|i| {
            let gap = 2.0e-7 + (i % 4) as f64 * 2.5e-8;
            let width2 = 6.0e-7 + (i / 4) as f64 * 5.0e-8;
            design(i, gap, width2)
        })
        .collect();
    samples.push(off_band(999));

    let pipeline = Pipeline::new(PipelineConfig::default())?;

    // ── A single design ──────────────────────────────────────────────────────
    let first = pipeline.process(&samples[0])?;
    println!("▶  Design {} ({} dense points after trim)", first.id, first.curve.len());
    println!(
        "  Anchor: mode {:.4}, ω = {:.4} THz, D1 = {:.4} THz",
        first.curve.anchor.mode,
        first.curve.anchor.frequency / 1e12,
        first.curve.anchor.slope / 1e12
    );
    println!("  Image {:?}, {} lit pixels:", first.image.shape(), first.image.lit_count());
    sketch(&first.image);
    println!();

    // ── Whole corpus ─────────────────────────────────────────────────────────
    let build = pipeline.build_corpus(&samples, BuildPolicy::Quarantine)?;
    println!("▶  Corpus: {} kept, {} quarantined", build.corpus.len(), build.quarantined.len());
    for err in &build.quarantined {
        println!("  quarantined: {err}");
    }
    println!();

    // ── Train / test ─────────────────────────────────────────────────────────
    let (train, test) = RedeDataset::split(Arc::new(build.corpus), DatasetOptions::train().with_seed(7))?;
    println!("{train}");
    println!("{test}");
    let sample = test.get(0)?;
    println!("▶  test[0] parameters:");
    for (name, value) in PARAMETER_NAMES.iter().zip(&sample.parameters) {
        println!("    {name:>8} = {value:.3e}");
    }

    Ok(())
}
