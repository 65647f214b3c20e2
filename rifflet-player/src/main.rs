//! # Rifflet Player
//!
//! Headless driver for rifflet-core: probes AVI headers as JSON and paces
//! frame delivery without a display.

use anyhow::Result;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

use rifflet_core::{avi_probe, AviInput, InputConfig};

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("rifflet=info,rifflet_core=info"));
    // stdout carries the probe JSON
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    match parse_args(&args)? {
        Command::Probe(path) => {
            let value = avi_probe(&path)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Command::Play(options) => {
            tracing::info!("Rifflet v{}", rifflet_core::VERSION);
            let stats = run_play(&options)?;
            tracing::info!(
                "Playback finished: frames={}, bytes={}, elapsed_ms={}, completed={}",
                stats.frames,
                stats.bytes,
                stats.elapsed.as_millis(),
                stats.completed
            );
        }
        Command::Help => print_usage(),
    }

    Ok(())
}

// ============================================================================
// Arguments
// ============================================================================

#[derive(Debug, PartialEq)]
enum Command {
    Probe(PathBuf),
    Play(PlayOptions),
    Help,
}

#[derive(Debug, PartialEq)]
struct PlayOptions {
    input: PathBuf,
    frames: Option<u64>,
    realtime: bool,
    config: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Command> {
    let Some(command) = args.get(1) else {
        return Ok(Command::Help);
    };

    match command.as_str() {
        "probe" => {
            let path = args.get(2).ok_or_else(|| anyhow::anyhow!("Missing file for probe"))?;
            Ok(Command::Probe(PathBuf::from(path)))
        }
        "play" => parse_play_args(&args[2..]).map(Command::Play),
        "--help" | "-h" | "help" => Ok(Command::Help),
        other => Err(anyhow::anyhow!("Unknown command {:?}", other)),
    }
}

fn parse_play_args(args: &[String]) -> Result<PlayOptions> {
    let mut input: Option<PathBuf> = None;
    let mut frames: Option<u64> = None;
    let mut realtime = false;
    let mut config: Option<PathBuf> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--frames" | "-n" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| anyhow::anyhow!("Missing value for --frames"))?;
                frames = Some(value.parse::<u64>().map_err(|e| {
                    anyhow::anyhow!("Invalid frame count {}: {}", value, e)
                })?);
                i += 2;
            }
            "--config" | "-c" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| anyhow::anyhow!("Missing value for --config"))?;
                config = Some(PathBuf::from(value));
                i += 2;
            }
            "--realtime" => {
                realtime = true;
                i += 1;
            }
            value if input.is_none() && !value.starts_with('-') => {
                input = Some(PathBuf::from(value));
                i += 1;
            }
            other => {
                tracing::warn!("Ignoring argument {:?}", other);
                i += 1;
            }
        }
    }

    let input = input.ok_or_else(|| {
        print_usage();
        anyhow::anyhow!("Missing input file for play")
    })?;

    Ok(PlayOptions {
        input,
        frames,
        realtime,
        config,
    })
}

fn print_usage() {
    eprintln!(
        "\nUsage:\n  rifflet probe <file.avi>\n  rifflet play <file.avi> [--frames <n>] [--realtime] [--config <cfg.json>]\n"
    );
}

// ============================================================================
// Playback
// ============================================================================

#[derive(Debug, Default)]
struct PlayStats {
    frames: u64,
    bytes: u64,
    elapsed: Duration,
    completed: bool,
}

fn run_play(options: &PlayOptions) -> Result<PlayStats> {
    let config = match &options.config {
        Some(path) => InputConfig::from_json_file(path)?,
        None => InputConfig::default(),
    };

    tracing::info!(
        "Headless playback starting: input={:?}, frames={:?}, realtime={}",
        options.input,
        options.frames,
        options.realtime
    );

    let mut input = AviInput::open_file(&options.input, &config)?;
    let period = 1.0 / input.current_info().frame_rate;
    let limit = options.frames.unwrap_or(u64::MAX);

    let start = Instant::now();
    let mut last_tick = start;
    let mut stats = PlayStats::default();

    while stats.frames < limit {
        let info = input.current_info();
        if info.completed || info.invalid_file {
            break;
        }

        let step = if options.realtime {
            let now = Instant::now();
            let dt = now.duration_since(last_tick).as_secs_f64();
            last_tick = now;
            dt
        } else {
            period
        };

        if !input.is_frame_available(step) {
            thread::sleep(Duration::from_millis(1));
            continue;
        }

        match input.next_frame()? {
            Some(frame) => {
                stats.frames += 1;
                stats.bytes += frame.size as u64;
                tracing::debug!("Frame {} ({} bytes)", stats.frames, frame.size);
            }
            None => break,
        }
    }

    stats.elapsed = start.elapsed();
    stats.completed = input.current_info().completed;
    Ok(stats)
}
