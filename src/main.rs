//! Trailhead harness - run a scene headless from scripted input

use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trailhead::config::SceneConfig;
use trailhead::game::character::StepEvent;
use trailhead::game::input::{EventHub, InputEvent};
use trailhead::game::Scene;

/// Frames between random key changes in wander mode
const WANDER_PERIOD: u64 = 30;

#[derive(Parser)]
#[command(name = "trailhead")]
#[command(about = "Headless character scene runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a scene and print JSON observations to stdout
    Run {
        /// Scene file (defaults are used when omitted)
        #[arg(short, long, env = "TRAILHEAD_CONFIG")]
        config: Option<PathBuf>,
        /// Number of frames to simulate
        #[arg(long, default_value = "600")]
        frames: u64,
        /// Fixed frame rate
        #[arg(long, default_value = "60")]
        fps: f32,
        /// Keys held for the whole run, comma separated
        #[arg(long, value_delimiter = ',')]
        hold: Vec<String>,
        /// Tap jump every N frames
        #[arg(long)]
        jump_every: Option<u64>,
        /// Seed for random movement and camera input
        #[arg(long)]
        wander: Option<u64>,
        /// Print an observation every N frames (0 disables)
        #[arg(long, default_value = "60")]
        report_every: u64,
    },
    /// Validate a scene file and print the resolved configuration
    Check {
        /// Scene file to validate
        path: PathBuf,
    },
}

#[derive(Debug, Default, Serialize)]
struct RunSummary {
    frames: u64,
    final_position: [f32; 3],
    grounded: bool,
    jumps: u32,
    refused_jumps: u32,
    landings: u32,
    tiles_spawned: usize,
    tiles_retired: usize,
    live_tiles: usize,
    obstacles: usize,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<SceneConfig> {
    match path {
        Some(path) => SceneConfig::from_file(path)
            .with_context(|| format!("loading scene config {}", path.display())),
        None => Ok(SceneConfig::default()),
    }
}

struct RunOptions {
    frames: u64,
    fps: f32,
    hold: Vec<String>,
    jump_every: Option<u64>,
    wander: Option<u64>,
    report_every: u64,
}

fn run(config: SceneConfig, opts: RunOptions) -> Result<RunSummary> {
    ensure!(opts.fps.is_finite() && opts.fps > 0.0, "--fps must be positive");

    let hub = EventHub::new();
    let mut scene = Scene::attached(config, &hub).context("building scene")?;
    let jump_key = scene.config().input.jump.clone();
    let wander_keys: Vec<String> = {
        let input = &scene.config().input;
        [&input.move_forward, &input.move_back, &input.move_left, &input.move_right]
            .iter()
            .filter_map(|keys| keys.first().cloned())
            .collect()
    };
    let viewport = scene.config().input.viewport;

    for key in &opts.hold {
        hub.dispatch(InputEvent::key_down(key.trim()));
    }

    let mut rng = opts.wander.map(StdRng::seed_from_u64);
    if rng.is_some() {
        hub.dispatch(InputEvent::Click {
            x: (viewport[0] + viewport[2]) * 0.5,
            y: (viewport[1] + viewport[3]) * 0.5,
        });
    }

    let delta = 1.0 / opts.fps;
    let mut summary = RunSummary::default();
    for frame in 0..opts.frames {
        if let Some(n) = opts.jump_every.filter(|&n| n > 0) {
            if frame % n == 0 {
                hub.dispatch(InputEvent::key_down(jump_key.as_str()));
                hub.dispatch(InputEvent::key_up(jump_key.as_str()));
            }
        }
        if let Some(rng) = rng.as_mut() {
            if frame % WANDER_PERIOD == 0 {
                for key in &wander_keys {
                    let event = if rng.gen_bool(0.35) {
                        InputEvent::key_down(key.as_str())
                    } else {
                        InputEvent::key_up(key.as_str())
                    };
                    hub.dispatch(event);
                }
            }
            hub.dispatch(InputEvent::PointerMove {
                dx: rng.gen_range(-20.0..20.0),
                dy: rng.gen_range(-5.0..5.0),
            });
        }

        let report = scene.frame(delta);
        if let Some(stream) = &report.stream {
            summary.tiles_spawned += stream.spawned.len();
            summary.tiles_retired += stream.retired.len();
        }
        for event in &report.step.events {
            match event {
                StepEvent::Jumped { .. } => summary.jumps += 1,
                StepEvent::JumpRefused => summary.refused_jumps += 1,
                StepEvent::Landed { .. } => summary.landings += 1,
                StepEvent::MovingChanged { .. } => {}
            }
        }

        if opts.report_every > 0 && frame % opts.report_every == 0 {
            println!("{}", serde_json::to_string(&scene.observe())?);
        }
    }

    let observation = scene.observe();
    summary.frames = opts.frames;
    summary.final_position = observation.character.position;
    summary.grounded = observation.character.grounded;
    summary.live_tiles = observation.live_tiles;
    summary.obstacles = observation.obstacles;

    scene.teardown();
    Ok(summary)
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            frames,
            fps,
            hold,
            jump_every,
            wander,
            report_every,
        } => {
            let scene_config = load_config(config.as_ref())?;
            let summary = run(
                scene_config,
                RunOptions {
                    frames,
                    fps,
                    hold,
                    jump_every,
                    wander,
                    report_every,
                },
            )?;
            info!(frames = summary.frames, jumps = summary.jumps, "run finished");
            println!("{}", serde_json::to_string(&summary)?);
        }
        Commands::Check { path } => {
            let scene_config = load_config(Some(&path))?;
            let rendered =
                toml::to_string_pretty(&scene_config).context("rendering resolved config")?;
            println!("{}", rendered);
        }
    }

    Ok(())
}
