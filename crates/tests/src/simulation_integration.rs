//! Simulated agents driving the engine

use crate::common::{started_engine, BLOCK, SAMPLE_RATE};
use moa_core::domain::asset::discover_assets;
use moa_core::domain::config::MoaConfig;
use moa_core::domain::simulation::{SilentSink, Simulator};
use moa_infra::assets::generate_test_calls;
use moa_infra::ManualBackend;
use std::path::Path;
use tempfile::TempDir;

fn chatty_config(assets_dir: &Path, agents: usize) -> MoaConfig {
    let mut config = MoaConfig::default();
    config.num_agents = agents;
    config.audio.assets_dir = assets_dir.to_path_buf();
    config.calling.frequency = 1.0;
    config.calling.time_of_day.enabled = false;
    config
}

#[test]
fn test_agents_call_through_the_player() {
    let dir = TempDir::new().unwrap();
    generate_test_calls(dir.path(), SAMPLE_RATE).unwrap();
    let calls = discover_assets(dir.path()).unwrap();
    assert_eq!(calls.len(), 5);

    let backend = ManualBackend::new();
    let engine = started_engine(dir.path(), backend.clone());
    let player = engine.player();
    let mut simulator = Simulator::new(chatty_config(dir.path(), 6), calls.clone(), Some(11)).unwrap();

    let events = simulator.step(5.0, &player);
    assert_eq!(events.len(), 6);
    assert!(events.iter().all(|e| e.voice.is_some()));
    assert!(events.iter().all(|e| calls.contains(&e.call)));
    assert_eq!(engine.active_voice_count(), 6);

    let first = backend.tick(BLOCK).unwrap();
    assert!(first.iter().any(|&s| s != 0.0));

    // Two-second calls need ceil(88200 / 1024) = 87 blocks
    for _ in 1..87 {
        backend.tick(BLOCK).unwrap();
    }
    assert_eq!(engine.active_voice_count(), 0);
}

#[test]
fn test_missing_calls_still_count() {
    let dir = TempDir::new().unwrap();
    let engine = started_engine(dir.path(), ManualBackend::new());
    let player = engine.player();
    let mut simulator = Simulator::new(chatty_config(dir.path(), 3), Vec::new(), Some(5)).unwrap();

    let events = simulator.step(5.0, &player);
    assert_eq!(events.len(), 3);
    for event in &events {
        assert_eq!(event.call, "rooster_call_1.wav");
        assert!(event.voice.is_none());
    }
    assert_eq!(simulator.stats().total_calls, 3);
    assert_eq!(engine.active_voice_count(), 0);
}

#[test]
fn test_agents_stay_inside_the_area() {
    let dir = TempDir::new().unwrap();
    let mut config = chatty_config(dir.path(), 8);
    config.movement.chance_to_move = 1.0;
    config.movement.frequency = 1.0;
    let radius = config.area.max_radius;
    let mut simulator = Simulator::new(config, Vec::new(), Some(23)).unwrap();

    for tick in 1..=600 {
        simulator.step(tick as f64 * 0.1, &SilentSink);
        for agent in simulator.agents() {
            assert!(agent.position().distance <= radius + 1e-9);
        }
    }
    assert!(simulator.stats().total_moves > 0);
    assert_eq!(simulator.quadrant_census().iter().sum::<usize>(), 8);
}
