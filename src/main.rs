//! Headless runner: steps a simulation and logs grid statistics.
//!
//! ```text
//! nca [--3d] [--gpu] [--preset NAME] [--size N] [--steps N] [--seed S] [--delay N] [--skip]
//! ```

use std::env;
use std::time::Instant;

use nca::backend::{ComputeBackend, CpuBackend, WgpuBackend};
use nca::config::{Sim2DConfig, Sim3DConfig, DEFAULT_SIZE};
use nca::error::EngineResult;
use nca::kernel::Dimension;
use nca::library;
use nca::sim::{Controller, Sim2D, Sim3D};
use tracing::Level;

/// Side length used for 2-D runs when `--size` is not given.
const DEFAULT_SURFACE: u32 = 256;

struct Args {
    dimension: Dimension,
    gpu: bool,
    preset: Option<String>,
    size: Option<u32>,
    steps: u32,
    seed: Option<String>,
    delay: u32,
    skip: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            dimension: Dimension::Two,
            gpu: false,
            preset: None,
            size: None,
            steps: 100,
            seed: None,
            delay: 0,
            skip: false,
        }
    }
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut iter = env::args().skip(1);
    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--3d" => args.dimension = Dimension::Three,
            "--gpu" => args.gpu = true,
            "--skip" => args.skip = true,
            "--preset" => args.preset = iter.next(),
            "--seed" => args.seed = iter.next(),
            "--size" => args.size = parse_number(&flag, iter.next()),
            "--steps" => args.steps = parse_number(&flag, iter.next()).unwrap_or(args.steps),
            "--delay" => args.delay = parse_number(&flag, iter.next()).unwrap_or(args.delay),
            other => tracing::warn!("Ignoring unknown argument {}", other),
        }
    }
    args
}

fn parse_number(flag: &str, value: Option<String>) -> Option<u32> {
    let value = value?;
    match value.parse() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!("Ignoring {} {}: not a number", flag, value);
            None
        }
    }
}

fn preset(dimension: Dimension, name: Option<&str>) -> library::LibraryPreset {
    let Some(name) = name else {
        return library::default_preset(dimension);
    };
    library::find(dimension, name).unwrap_or_else(|| {
        let known: Vec<_> = library::presets(dimension).iter().map(|p| p.name).collect();
        tracing::warn!("Unknown preset {}, available: {}", name, known.join(", "));
        library::default_preset(dimension)
    })
}

fn run<B: ComputeBackend>(backend: B, args: &Args) -> EngineResult<()> {
    let preset = preset(args.dimension, args.preset.as_deref());
    tracing::info!("Running {} on {} backend", preset.name, backend.name());

    match args.dimension {
        Dimension::Three => {
            let mut config = Sim3DConfig::new(args.size.unwrap_or(DEFAULT_SIZE))
                .with_preset(&preset)
                .with_compute_delay(args.delay)
                .with_skip_every_other(args.skip);
            if let Some(seed) = &args.seed {
                config = config.with_seed(seed.clone());
            }
            let mut sim = Sim3D::new(backend, config)?;
            drive(&mut sim, args.steps)
        }
        Dimension::Two => {
            let side = args.size.unwrap_or(DEFAULT_SURFACE);
            let mut config = Sim2DConfig::new(side, side)
                .with_preset(&preset)
                .with_compute_delay(args.delay)
                .with_skip_every_other(args.skip);
            if let Some(seed) = &args.seed {
                config = config.with_seed(seed.clone());
            }
            let mut sim = Sim2D::new(backend, config)?;
            drive(&mut sim, args.steps)
        }
    }
}

fn drive<B: ComputeBackend>(sim: &mut Controller<B>, ticks: u32) -> EngineResult<()> {
    let seed = sim.seed().to_string();
    sim.reset(Some(&seed))?;
    let shape = sim.shape();
    tracing::info!(
        "Seed {} on {}x{}x{} grid ({} channels, {} chunks)",
        sim.seed(),
        shape.width,
        shape.height,
        shape.depth,
        shape.channels,
        sim.chunks().len()
    );
    log_stats(sim)?;

    let report_every = (ticks / 10).max(1);
    let start = Instant::now();
    for tick in 1..=ticks {
        sim.render()?;
        if tick % report_every == 0 {
            log_stats(sim)?;
        }
    }

    let elapsed = start.elapsed();
    tracing::info!(
        "{} generations in {:.2?} ({:.1} gen/s)",
        sim.generation(),
        elapsed,
        sim.generation() as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );
    Ok(())
}

fn log_stats<B: ComputeBackend>(sim: &mut Controller<B>) -> EngineResult<()> {
    let values = sim.read_visible()?;
    let count = values.len().max(1) as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / count;
    let max = values.iter().copied().fold(0.0f32, f32::max);
    let live = values.iter().filter(|&&v| v > 0.5).count() as f64 / count;
    tracing::info!(
        "gen {:>6}  mean {:.4}  max {:.4}  live {:.2}%",
        sim.generation(),
        mean,
        max,
        live * 100.0
    );
    Ok(())
}

fn main() {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let args = parse_args();
    let result = if args.gpu {
        match WgpuBackend::new() {
            Ok(backend) => run(backend, &args),
            Err(e) => Err(e.into()),
        }
    } else {
        run(CpuBackend::new(), &args)
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}
