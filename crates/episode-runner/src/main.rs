//! episode-runner: play one synthetic exam episode end to end and print the result.
//!
//! The runner scripts a user: it marks the accumulation range, flags the
//! sweep, enters on the reclaim bar with a stop beyond the purge, and lets
//! playback run to completion.
//!
//! Usage:
//!   cargo run -p episode-runner -- --seed 12345 --timeframe 1D
//!   cargo run -p episode-runner -- --seed 12345 --rate 5 --no-stop
//!   cargo run -p episode-runner -- --pattern turtle-soup --timeframe 4H

use std::sync::Arc;

use anyhow::Context;
use episode_engine::{
    EngineConfig, Episode, MarkerKind, PatternLibrary, PlaybackDriver, ProgressSink, ReplayEvent,
    SeededStream, Timeframe, TracingProgressSink,
};
use tokio::sync::Mutex;
use tracing_subscriber::prelude::*;

const DEFAULT_SEED: i64 = 12345;

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  episode-runner [--seed N] [--timeframe TF] [--rate BARS_PER_SEC] [--no-stop]");
    eprintln!("  episode-runner --pattern ID [--seed N] [--timeframe TF]");
    eprintln!("");
    eprintln!("Options:");
    eprintln!("  --seed N        Scenario seed (default: fresh seed, recorded in the output)");
    eprintln!("  --timeframe TF  1m 3m 5m 15m 30m 1H 2H 4H 1D 1W 1M (default 1D)");
    eprintln!("  --rate R        Playback rate, 0.5 to 5 bars per second");
    eprintln!("  --no-stop       Enter without a stop loss");
    eprintln!("  --pattern ID    Print a curriculum clip as JSON instead of running an exam");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "episode_runner=info,episode_engine=info".into());

    if json_logging {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let seed: Option<i64> = arg_value(&args, "--seed")
        .map(|v| v.parse().with_context(|| format!("Invalid seed: {}", v)))
        .transpose()?;
    let timeframe: Timeframe = arg_value(&args, "--timeframe")
        .unwrap_or("1D")
        .parse()?;
    let with_stop = !args.iter().any(|a| a == "--no-stop");

    if let Some(pattern_id) = arg_value(&args, "--pattern") {
        let pattern = PatternLibrary::resolve(pattern_id);
        let mut rng = SeededStream::new(seed.unwrap_or(DEFAULT_SEED));
        let candles = pattern.generate_seeded(timeframe, &mut rng);
        tracing::info!(pattern = %pattern.id, bars = candles.len(), "Curriculum clip generated");
        println!("{}", serde_json::to_string_pretty(&candles)?);
        return Ok(());
    }

    let mut config = EngineConfig::from_env().context("Failed to load engine configuration")?;
    if let Some(rate) = arg_value(&args, "--rate") {
        config.replay_rate = rate
            .parse()
            .with_context(|| format!("Invalid rate: {}", rate))?;
    }
    config.validate()?;

    let episode = Episode::generate(seed, timeframe, &config)?;
    let truth = episode.scenario().ground_truth.clone();
    tracing::info!(
        episode = %episode.id(),
        seed = episode.scenario().seed,
        timeframe = %timeframe,
        rate = config.replay_rate,
        "Running scripted exam"
    );

    let shared = Arc::new(Mutex::new(episode));
    {
        let mut episode = shared.lock().await;
        episode.place_marker(MarkerKind::RangeHigh, truth.range_high)?;
        episode.place_marker(MarkerKind::RangeLow, truth.range_low)?;
    }

    let mut driver = PlaybackDriver::new(shared.clone());
    let mut events = driver.start().await?;

    while let Some(event) = events.recv().await {
        let ReplayEvent::Advanced { index } = event else {
            continue;
        };
        let mut episode = shared.lock().await;
        let cursor = episode.replay().cursor();
        if cursor != index {
            tracing::warn!(event_index = index, cursor, "Playback ran ahead of the script, bar skipped");
            continue;
        }
        if index == truth.sweep_index {
            episode.place_marker(MarkerKind::PurgeFlag, truth.purge_price)?;
        } else if index == truth.reclaim_index {
            let stop = with_stop.then_some(truth.purge_price);
            if let Err(e) = episode.open_trade(truth.direction, stop) {
                tracing::warn!("Entry rejected: {}", e);
            }
        }
    }
    driver.dispose();

    let episode = shared.lock().await;
    let result = episode
        .result()
        .context("Playback ended without a graded result")?;
    println!("{}", serde_json::to_string_pretty(result)?);

    if let Some(summary) = episode.summary() {
        TracingProgressSink.record(&summary).await?;
    }

    Ok(())
}
