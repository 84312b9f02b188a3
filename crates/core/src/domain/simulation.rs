//! Simulation loop over a population of agents
//!
//! Each [`Simulator::step`] runs four passes in order:
//! 1. Expire finished calls
//! 2. Movement decisions
//! 3. Call decisions, so agents can reply to calls of this step
//! 4. Call execution through a [`SoundSink`]

use crate::domain::agent::Agent;
use crate::domain::audio::ChannelGains;
use crate::domain::config::{MoaConfig, Result};
use crate::domain::daylight::{DaylightSchedule, SimClock, TimeOfDay};
use crate::domain::player::SoundPlayer;
use crate::domain::spatial::Position;
use crate::domain::voice::VoiceId;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

/// Destination for the calls the simulation decides to play
pub trait SoundSink {
    fn play(&self, call: &str, gains: ChannelGains) -> Option<VoiceId>;
}

impl SoundSink for SoundPlayer {
    fn play(&self, call: &str, gains: ChannelGains) -> Option<VoiceId> {
        self.play_sound(call, gains)
    }
}

/// Sink that plays nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSink;

impl SoundSink for SilentSink {
    fn play(&self, _call: &str, _gains: ChannelGains) -> Option<VoiceId> {
        None
    }
}

/// One call started during a step
#[derive(Debug, Clone)]
pub struct CallEvent {
    pub agent: usize,
    pub call: String,
    pub position: Position,
    pub volume: f64,
    pub is_response: bool,
    pub voice: Option<VoiceId>,
}

/// Running totals since the simulation started
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulationStats {
    pub total_calls: u64,
    pub proximity_responses: u64,
    pub total_moves: u64,
}

pub struct Simulator {
    config: MoaConfig,
    calls: Vec<String>,
    agents: Vec<Agent>,
    rng: StdRng,
    clock: SimClock,
    schedule: DaylightSchedule,
    stats: SimulationStats,
    now: f64,
}

impl Simulator {
    /// Validate `config` and spawn its agents
    ///
    /// `calls` are the asset names agents may choose from. A seed makes the
    /// run reproducible.
    pub fn new(config: MoaConfig, calls: Vec<String>, seed: Option<u64>) -> Result<Self> {
        config.validate()?;
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let clock = SimClock::from_config(&config.simulation_time)?;
        let schedule = DaylightSchedule::from_config(&config.calling.time_of_day)?;

        let agents: Vec<Agent> = (0..config.num_agents)
            .map(|id| Agent::spawn(id, &config, &calls, &mut rng))
            .collect();
        for agent in &agents {
            debug!(
                agent = agent.id(),
                angle = agent.position().angle,
                distance = agent.position().distance,
                quadrant = agent.position().quadrant().label(),
                curiosity = agent.curiosity(),
                sticky = agent.is_sticky(),
                "Agent spawned"
            );
        }
        info!(agents = agents.len(), calls = calls.len(), "Simulation initialised");

        Ok(Self {
            config,
            calls,
            agents,
            rng,
            clock,
            schedule,
            stats: SimulationStats::default(),
            now: 0.0,
        })
    }

    /// Advance to `now` seconds since the start and play any calls
    pub fn step<S: SoundSink + ?Sized>(&mut self, now: f64, sink: &S) -> Vec<CallEvent> {
        self.now = now;
        let multiplier = self.time_of_day_multiplier();

        for agent in &mut self.agents {
            agent.update_calling_state(now);
        }

        for agent in &mut self.agents {
            if !agent.should_move(now, &self.config, &mut self.rng) {
                continue;
            }
            let from = *agent.position();
            agent.walk(&self.config, &mut self.rng);
            self.stats.total_moves += 1;
            debug!(
                agent = agent.id(),
                from = from.quadrant().label(),
                to = agent.position().quadrant().label(),
                distance = agent.position().distance,
                "Agent moved"
            );
        }

        let trigger = self.config.calling.proximity_response.trigger_distance;
        let mut callers = Vec::new();
        for index in 0..self.agents.len() {
            let position = *self.agents[index].position();
            let nearby = self
                .agents
                .iter()
                .enumerate()
                .filter(|(other, agent)| {
                    *other != index
                        && agent.is_calling()
                        && position.distance_to(agent.position()) <= trigger
                })
                .count();
            let agent = &mut self.agents[index];
            if agent.should_call(now, nearby, multiplier, &self.config, &mut self.rng) {
                callers.push((index, nearby > 0));
            }
        }

        let bounds = self.config.audio.volume;
        let mut events = Vec::with_capacity(callers.len());
        for (index, is_response) in callers {
            let agent = &mut self.agents[index];
            let call = agent.start_call(now, &self.config, &self.calls, &mut self.rng);
            let voice = sink.play(&call, agent.gains(&bounds));

            self.stats.total_calls += 1;
            if is_response {
                self.stats.proximity_responses += 1;
            }

            let event = CallEvent {
                agent: agent.id(),
                call,
                position: *agent.position(),
                volume: agent.volume(&bounds),
                is_response,
                voice,
            };
            info!(
                agent = event.agent,
                call = %event.call,
                quadrant = event.position.quadrant().label(),
                distance = format_args!("{:.1}", event.position.distance),
                volume = format_args!("{:.2}", event.volume),
                response = event.is_response,
                "Agent calling"
            );
            events.push(event);
        }
        events
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn calls(&self) -> &[String] {
        &self.calls
    }

    pub fn config(&self) -> &MoaConfig {
        &self.config
    }

    pub fn stats(&self) -> SimulationStats {
        self.stats
    }

    /// Seconds since the start as of the last step
    pub fn elapsed(&self) -> f64 {
        self.now
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn time_of_day(&self) -> TimeOfDay {
        self.clock.at(self.now)
    }

    pub fn time_of_day_multiplier(&self) -> f64 {
        self.schedule.multiplier(self.time_of_day())
    }

    /// Number of agents in each quadrant, indexed like [`crate::domain::spatial::Quadrant::ALL`]
    pub fn quadrant_census(&self) -> [usize; 4] {
        let mut census = [0; 4];
        for agent in &self.agents {
            census[agent.position().quadrant().index()] += 1;
        }
        census
    }
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("agents", &self.agents.len())
            .field("calls", &self.calls)
            .field("stats", &self.stats)
            .field("now", &self.now)
            .finish()
    }
}
