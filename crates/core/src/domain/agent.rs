//! Roaming agents: movement, calling decisions and call choice
//!
//! Agents are driven by [`crate::domain::simulation::Simulator`]; every random
//! draw goes through the caller's RNG so a seeded run is reproducible.

use crate::domain::audio::ChannelGains;
use crate::domain::config::MoaConfig;
use crate::domain::spatial::{Position, VolumeBounds};
use rand::seq::SliceRandom;
use rand::Rng;
use std::f64::consts::TAU;

/// Simulated seconds a call counts as ongoing for proximity replies
pub const CALL_DURATION_SECS: f64 = 2.0;

/// Uniform draw that tolerates an empty range
pub(crate) fn uniform<R: Rng + ?Sized>(rng: &mut R, low: f64, high: f64) -> f64 {
    if high > low {
        rng.gen_range(low..high)
    } else {
        low
    }
}

/// Delay until the next decision check
fn next_check_delay<R: Rng + ?Sized>(config: &MoaConfig, rng: &mut R) -> f64 {
    let jitter = config.time_randomization;
    config.time_unit * (1.0 + uniform(rng, -jitter, jitter))
}

#[derive(Debug, Clone)]
pub struct Agent {
    id: usize,
    position: Position,
    curiosity: f64,
    sticky: bool,
    preferred_call: Option<String>,
    next_move_check: f64,
    next_call_check: f64,
    calling: bool,
    call_started: f64,
}

impl Agent {
    /// Place a new agent uniformly inside the area
    pub fn spawn<R: Rng + ?Sized>(
        id: usize,
        config: &MoaConfig,
        calls: &[String],
        rng: &mut R,
    ) -> Self {
        let position = Position::new(
            uniform(rng, 0.0, TAU),
            uniform(rng, 0.0, config.area.max_radius),
        );
        let curiosity = uniform(
            rng,
            config.movement.curiosity.min,
            config.movement.curiosity.max,
        );
        let next_move_check = next_check_delay(config, rng);
        let next_call_check = next_check_delay(config, rng);

        let stickiness = &config.calls.stickiness;
        let sticky = rng.gen_bool(stickiness.percentage_sticky);
        let preferred_call = sticky.then(|| {
            if rng.gen_bool(stickiness.alternate_call_chance) {
                calls
                    .choose(rng)
                    .cloned()
                    .unwrap_or_else(|| config.calls.default_call.clone())
            } else {
                config.calls.default_call.clone()
            }
        });

        Self {
            id,
            position,
            curiosity,
            sticky,
            preferred_call,
            next_move_check,
            next_call_check,
            calling: false,
            call_started: 0.0,
        }
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn curiosity(&self) -> f64 {
        self.curiosity
    }

    pub fn is_sticky(&self) -> bool {
        self.sticky
    }

    pub fn preferred_call(&self) -> Option<&str> {
        self.preferred_call.as_deref()
    }

    pub fn is_calling(&self) -> bool {
        self.calling
    }

    /// Decide whether to walk at `now`; reschedules the next check when due
    pub fn should_move<R: Rng + ?Sized>(&mut self, now: f64, config: &MoaConfig, rng: &mut R) -> bool {
        if now < self.next_move_check {
            return false;
        }
        self.next_move_check = now + next_check_delay(config, rng);

        let chance = (config.movement.chance_to_move * self.curiosity).min(1.0);
        if rng.gen::<f64>() > chance {
            return false;
        }
        rng.gen::<f64>() < config.movement.frequency
    }

    /// Walk a random distance in a random direction, staying inside the area
    pub fn walk<R: Rng + ?Sized>(&mut self, config: &MoaConfig, rng: &mut R) {
        let step = uniform(rng, config.movement.distance_min, config.movement.distance_max);
        let heading = uniform(rng, 0.0, TAU);
        let (x, y) = self.position.to_cartesian();
        let mut next = Position::from_cartesian(x + step * heading.cos(), y + step * heading.sin());
        if next.distance > config.area.max_radius {
            next.distance = config.area.max_radius;
        }
        self.position = next;
    }

    /// Decide whether to call at `now`
    ///
    /// `nearby_calling` is the number of other agents currently calling
    /// within the trigger distance.
    pub fn should_call<R: Rng + ?Sized>(
        &mut self,
        now: f64,
        nearby_calling: usize,
        time_of_day_multiplier: f64,
        config: &MoaConfig,
        rng: &mut R,
    ) -> bool {
        if now < self.next_call_check {
            return false;
        }
        self.next_call_check = now + next_check_delay(config, rng);

        if nearby_calling > 0 {
            let response = &config.calling.proximity_response;
            let jitter = uniform(rng, -response.randomization, response.randomization);
            let likelihood = (response.reply_likelihood * (1.0 + jitter)).clamp(0.0, 1.0);
            if rng.gen::<f64>() < likelihood {
                return true;
            }
        }

        let frequency = (config.calling.frequency * time_of_day_multiplier).min(1.0);
        rng.gen::<f64>() < frequency
    }

    /// Mark the agent as calling and pick the call asset
    pub fn start_call<R: Rng + ?Sized>(
        &mut self,
        now: f64,
        config: &MoaConfig,
        calls: &[String],
        rng: &mut R,
    ) -> String {
        self.calling = true;
        self.call_started = now;
        self.choose_call(config, calls, rng)
    }

    /// Clear the calling flag once the call has run its course
    pub fn update_calling_state(&mut self, now: f64) {
        if self.calling && now - self.call_started > CALL_DURATION_SECS {
            self.calling = false;
        }
    }

    pub fn volume(&self, bounds: &VolumeBounds) -> f64 {
        bounds.base_volume(self.position.distance)
    }

    pub fn gains(&self, bounds: &VolumeBounds) -> ChannelGains {
        bounds.speaker_gains(&self.position)
    }

    fn choose_call<R: Rng + ?Sized>(&self, config: &MoaConfig, calls: &[String], rng: &mut R) -> String {
        let default = &config.calls.default_call;
        if calls.is_empty() {
            return default.clone();
        }

        if let Some(preferred) = self.preferred_call.as_ref().filter(|_| self.sticky) {
            let revert = config.calls.stickiness.revert_to_default_chance;
            return if rng.gen_bool(revert) {
                default.clone()
            } else {
                preferred.clone()
            };
        }

        if rng.gen_bool(config.calls.variation_probability) {
            calls.choose(rng).cloned().unwrap_or_else(|| default.clone())
        } else {
            default.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn calls() -> Vec<String> {
        vec!["a.wav".to_string(), "b.wav".to_string()]
    }

    #[test]
    fn test_spawn_inside_area() {
        let config = MoaConfig::default();
        let mut rng = StdRng::seed_from_u64(7);
        for id in 0..100 {
            let agent = Agent::spawn(id, &config, &calls(), &mut rng);
            assert!(agent.position().distance <= config.area.max_radius);
            assert!((0.0..TAU).contains(&agent.position().angle));
            assert!(agent.curiosity() >= config.movement.curiosity.min);
            assert!(agent.curiosity() <= config.movement.curiosity.max);
            assert_eq!(agent.is_sticky(), agent.preferred_call().is_some());
        }
    }

    #[test]
    fn test_checks_wait_until_due() {
        let mut config = MoaConfig::default();
        config.movement.chance_to_move = 1.0;
        config.movement.frequency = 1.0;
        config.movement.curiosity.min = 1.0;
        config.movement.curiosity.max = 1.0;
        let mut rng = StdRng::seed_from_u64(1);
        let mut agent = Agent::spawn(0, &config, &calls(), &mut rng);

        assert!(!agent.should_move(0.0, &config, &mut rng));
        assert!(agent.should_move(10.0, &config, &mut rng));
        assert!(!agent.should_move(10.0, &config, &mut rng));
    }

    #[test]
    fn test_certain_call_and_duration() {
        let mut config = MoaConfig::default();
        config.calling.frequency = 1.0;
        let mut rng = StdRng::seed_from_u64(2);
        let mut agent = Agent::spawn(0, &config, &[], &mut rng);

        assert!(agent.should_call(10.0, 0, 1.0, &config, &mut rng));
        let call = agent.start_call(10.0, &config, &[], &mut rng);
        assert_eq!(call, config.calls.default_call);
        assert!(agent.is_calling());

        agent.update_calling_state(11.9);
        assert!(agent.is_calling());
        agent.update_calling_state(12.1);
        assert!(!agent.is_calling());
    }

    #[test]
    fn test_proximity_reply() {
        let mut config = MoaConfig::default();
        config.calling.frequency = 0.0;
        config.calling.proximity_response.reply_likelihood = 1.0;
        config.calling.proximity_response.randomization = 0.0;
        let mut rng = StdRng::seed_from_u64(3);
        let mut agent = Agent::spawn(0, &config, &calls(), &mut rng);

        assert!(agent.should_call(10.0, 1, 1.0, &config, &mut rng));
        assert!(!agent.should_call(20.0, 0, 1.0, &config, &mut rng));
    }

    #[test]
    fn test_time_of_day_multiplier_caps_at_one() {
        let mut config = MoaConfig::default();
        config.calling.frequency = 0.5;
        let mut rng = StdRng::seed_from_u64(4);
        let mut agent = Agent::spawn(0, &config, &calls(), &mut rng);
        let mut now = 10.0;
        for _ in 0..50 {
            assert!(agent.should_call(now, 0, 10.0, &config, &mut rng));
            now += 10.0;
        }
    }

    #[test]
    fn test_call_choice() {
        let mut config = MoaConfig::default();
        config.calls.stickiness.percentage_sticky = 0.0;
        config.calls.variation_probability = 0.0;
        let mut rng = StdRng::seed_from_u64(5);
        let mut agent = Agent::spawn(0, &config, &calls(), &mut rng);
        assert_eq!(agent.start_call(0.0, &config, &calls(), &mut rng), "rooster_call_1.wav");

        config.calls.variation_probability = 1.0;
        let call = agent.start_call(0.0, &config, &calls(), &mut rng);
        assert!(calls().contains(&call));

        config.calls.stickiness.percentage_sticky = 1.0;
        config.calls.stickiness.alternate_call_chance = 1.0;
        config.calls.stickiness.revert_to_default_chance = 0.0;
        let mut sticky = Agent::spawn(1, &config, &calls(), &mut rng);
        let preferred = sticky.preferred_call().unwrap().to_string();
        for _ in 0..10 {
            assert_eq!(sticky.start_call(0.0, &config, &calls(), &mut rng), preferred);
        }
    }

    #[test]
    fn test_seeded_runs_match() {
        let config = MoaConfig::default();
        let a = Agent::spawn(0, &config, &calls(), &mut StdRng::seed_from_u64(9));
        let b = Agent::spawn(0, &config, &calls(), &mut StdRng::seed_from_u64(9));
        assert_eq!(a.position(), b.position());
        assert_eq!(a.preferred_call(), b.preferred_call());
    }

    proptest! {
        #[test]
        fn prop_walk_stays_inside_radius(seed in any::<u64>(), steps in 1usize..50) {
            let mut config = MoaConfig::default();
            config.area.max_radius = 20.0;
            config.movement.distance_min = 5.0;
            config.movement.distance_max = 40.0;
            let mut rng = StdRng::seed_from_u64(seed);
            let mut agent = Agent::spawn(0, &config, &[], &mut rng);
            for _ in 0..steps {
                agent.walk(&config, &mut rng);
                prop_assert!(agent.position().distance <= config.area.max_radius);
                prop_assert!(agent.position().angle >= 0.0 && agent.position().angle < TAU);
            }
        }
    }
}
