//! Subcommand implementations

use anyhow::Context;
use moa_core::domain::asset::discover_assets;
use moa_core::domain::audio::AudioEnumerator;
use moa_core::domain::config::{AudioConfig, MoaConfig};
use moa_core::domain::simulation::Simulator;
use moa_core::domain::spatial::{Position, Quadrant};
use moa_core::domain::tones::{
    quadrant_tone, quadrant_tone_frequency, test_tone_schedule, TEST_TONE_DISTANCES,
};
use moa_infra::assets::generate_test_calls;
use moa_infra::{CpalEnumerator, SoundEngine};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const TICK_INTERVAL: Duration = Duration::from_millis(100);
const STATUS_INTERVAL: Duration = Duration::from_secs(10);
const TABLE_RULE_WIDTH: usize = 60;

fn engine(config: &AudioConfig, no_audio: bool) -> SoundEngine {
    if no_audio {
        info!("Audio output disabled");
        SoundEngine::silent(config)
    } else {
        SoundEngine::cpal(config)
    }
}

/// One line per agent: where it is and how loud its next call would be
fn agent_rows(simulator: &Simulator) -> Vec<String> {
    let bounds = simulator.config().audio.volume;
    simulator
        .agents()
        .iter()
        .map(|agent| {
            let position = agent.position();
            let (x, y) = position.to_cartesian();
            format!(
                "Agent {:>2}: {:<11} {:>5.1} m  ({:>6.1}, {:>6.1})  volume {:.2}",
                agent.id(),
                position.quadrant().label(),
                position.distance,
                x,
                y,
                agent.volume(&bounds)
            )
        })
        .collect()
}

fn print_agent_table(simulator: &Simulator) {
    let rule = "-".repeat(TABLE_RULE_WIDTH);
    println!("Agent positions:");
    println!("{rule}");
    for row in agent_rows(simulator) {
        println!("{row}");
    }
    println!("{rule}");
}

fn print_stream_banner(engine: &SoundEngine) {
    let state = engine.stream_state();
    if state.opened {
        println!(
            "Audio: {} ({} of {} channels, {} Hz, {} frames/block)",
            state.mode_label(),
            state.active_channels,
            state.requested_channels,
            state.sample_rate,
            state.block_size
        );
    } else {
        println!("Audio: no output stream, running silently");
    }
}

pub async fn run(config: MoaConfig, no_audio: bool, seed: Option<u64>) -> anyhow::Result<()> {
    let names = discover_assets(&config.audio.assets_dir).with_context(|| {
        format!("Failed to scan assets directory {}", config.audio.assets_dir.display())
    })?;

    let mut engine = engine(&config.audio, no_audio);
    engine.start();
    print_stream_banner(&engine);

    let failures = engine.cache().preload(names.iter().map(String::as_str));
    for (name, error) in &failures {
        warn!(asset = %name, error = %error, "Skipping unreadable call");
    }
    let calls: Vec<String> = names
        .into_iter()
        .filter(|name| failures.iter().all(|(failed, _)| failed != name))
        .collect();
    if calls.is_empty() {
        println!("No calls loaded; try `moa generate-calls`");
    } else {
        println!("Loaded {} calls: {}", calls.len(), calls.join(", "));
    }

    let mut simulator = Simulator::new(config, calls, seed)?;
    let player = engine.player();

    println!(
        "Simulating {} agents from {} (Ctrl+C to stop)",
        simulator.agents().len(),
        simulator.time_of_day()
    );
    print_agent_table(&simulator);

    let started = Instant::now();
    let mut last_status = started;
    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl+C");
                }
                break;
            }
            _ = ticker.tick() => {
                let now = started.elapsed().as_secs_f64();
                for event in simulator.step(now, &player) {
                    println!(
                        "[{}] agent {} calls {} from the {} at {:.1} m (volume {:.2}){}",
                        simulator.time_of_day(),
                        event.agent,
                        event.call,
                        event.position.quadrant().label(),
                        event.position.distance,
                        event.volume,
                        if event.is_response { ", responding" } else { "" }
                    );
                }
                engine.poll_diagnostics();

                if last_status.elapsed() >= STATUS_INTERVAL {
                    print_status(&simulator, &engine);
                    last_status = Instant::now();
                }
            }
        }
    }

    println!();
    let stats = simulator.stats();
    println!("Stopped after {:.1} s", started.elapsed().as_secs_f64());
    println!("  Calls:               {}", stats.total_calls);
    println!("  Proximity responses: {}", stats.proximity_responses);
    println!("  Moves:               {}", stats.total_moves);
    engine.stop();
    Ok(())
}

fn print_status(simulator: &Simulator, engine: &SoundEngine) {
    let census = simulator.quadrant_census();
    let spread: Vec<String> = Quadrant::ALL
        .iter()
        .map(|q| format!("{} {}", q.label(), census[q.index()]))
        .collect();
    let stats = simulator.stats();
    println!(
        "[{}] activity x{:.1} | {} | calls {} | voices {}",
        simulator.time_of_day(),
        simulator.time_of_day_multiplier(),
        spread.join(", "),
        stats.total_calls,
        engine.active_voice_count()
    );
}

pub async fn test_tones(config: &MoaConfig, no_audio: bool) -> anyhow::Result<()> {
    let mut engine = engine(&config.audio, no_audio);
    engine.start();
    print_stream_banner(&engine);

    for quadrant in Quadrant::ALL {
        engine.cache().insert(quadrant_tone(quadrant, config.audio.sample_rate));
    }

    let bounds = config.audio.volume;
    for step in test_tone_schedule() {
        let quadrant = step.quadrant;
        if step.distance == TEST_TONE_DISTANCES[0] {
            println!("Playing: {}", quadrant.label());
        }
        let position = Position::new(quadrant.center_angle(), step.distance);
        let name = format!("test-tone-{}", quadrant.label());
        println!(
            "  {:>4.0} m: {:.0} Hz, volume {:.2}",
            step.distance,
            quadrant_tone_frequency(quadrant),
            bounds.base_volume(step.distance)
        );
        engine.play_sound(&name, bounds.speaker_gains(&position));
        tokio::time::sleep(Duration::from_secs_f64(step.wait_secs)).await;
    }

    engine.stop();
    println!("Test tones complete");
    Ok(())
}

pub fn list_devices() -> anyhow::Result<()> {
    let enumerator = CpalEnumerator::new();
    let devices = enumerator.output_devices()?;
    if devices.is_empty() {
        println!("No output devices found");
        return Ok(());
    }

    for device in devices {
        let marker = if device.is_default { " (default)" } else { "" };
        let channels: Vec<String> = device
            .channel_counts
            .iter()
            .map(|c| c.count().to_string())
            .collect();
        let rates: Vec<String> = device.sample_rates.iter().map(u32::to_string).collect();
        println!("{}{}", device.name, marker);
        println!("  channels:     {}", channels.join(", "));
        println!("  sample rates: {}", rates.join(", "));
    }
    Ok(())
}

pub fn generate_calls(dir: &Path, sample_rate: u32) -> anyhow::Result<()> {
    let written = generate_test_calls(dir, sample_rate)
        .with_context(|| format!("Failed to write calls to {}", dir.display()))?;
    for path in &written {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

pub async fn init_config(path: &Path) -> anyhow::Result<()> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        anyhow::bail!("{} already exists", path.display());
    }
    MoaConfig::default().save_to_file(path).await?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
