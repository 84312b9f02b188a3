//! Polar positions around the listener and their 5.1 gain vectors

use crate::domain::audio::{ChannelGains, Speaker};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, TAU};

/// Share of the base volume sent to the quadrant's primary speaker
pub const PRIMARY_SHARE: f64 = 0.8;

/// Share of the base volume bled into the neighbouring speaker
pub const BLEED_SHARE: f64 = 0.2;

/// Share of the base volume always sent to the subwoofer
pub const LFE_SHARE: f64 = 0.15;

/// Point in the listening area, in polar coordinates around the listener
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Radians, counter-clockwise from front-right
    pub angle: f64,
    /// Metres from the listener
    pub distance: f64,
}

impl Position {
    pub fn new(angle: f64, distance: f64) -> Self {
        Self { angle, distance }
    }

    /// Build a position from cartesian coordinates, angle in `[0, 2π)`
    pub fn from_cartesian(x: f64, y: f64) -> Self {
        let angle = y.atan2(x).rem_euclid(TAU);
        let angle = if angle >= TAU { 0.0 } else { angle };
        Self {
            angle,
            distance: x.hypot(y),
        }
    }

    pub fn to_cartesian(&self) -> (f64, f64) {
        (
            self.distance * self.angle.cos(),
            self.distance * self.angle.sin(),
        )
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        let (x1, y1) = self.to_cartesian();
        let (x2, y2) = other.to_cartesian();
        (x2 - x1).hypot(y2 - y1)
    }

    pub fn quadrant(&self) -> Quadrant {
        Quadrant::from_angle(self.angle)
    }
}

/// One of four 90° sectors around the listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quadrant {
    FrontRight,
    RearRight,
    RearLeft,
    FrontLeft,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::FrontRight,
        Quadrant::RearRight,
        Quadrant::RearLeft,
        Quadrant::FrontLeft,
    ];

    /// Sector of an angle in radians, wrapped into `[0, 2π)`
    pub fn from_angle(angle: f64) -> Self {
        let normalized = angle.rem_euclid(TAU);
        // rem_euclid can round up to exactly TAU for tiny negative inputs
        match (normalized / FRAC_PI_2).floor() as usize % 4 {
            0 => Quadrant::FrontRight,
            1 => Quadrant::RearRight,
            2 => Quadrant::RearLeft,
            _ => Quadrant::FrontLeft,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Angle at the middle of the sector
    pub fn center_angle(self) -> f64 {
        (self.index() as f64 + 0.5) * FRAC_PI_2
    }

    /// Primary speaker and the speaker receiving the bleed
    pub fn speakers(self) -> (Speaker, Speaker) {
        match self {
            Quadrant::FrontRight => (Speaker::FrontRight, Speaker::Center),
            Quadrant::RearRight => (Speaker::RearRight, Speaker::FrontRight),
            Quadrant::RearLeft => (Speaker::RearLeft, Speaker::FrontLeft),
            Quadrant::FrontLeft => (Speaker::FrontLeft, Speaker::Center),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Quadrant::FrontRight => "front-right",
            Quadrant::RearRight => "rear-right",
            Quadrant::RearLeft => "rear-left",
            Quadrant::FrontLeft => "front-left",
        }
    }
}

/// Distance attenuation range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeBounds {
    pub min_distance: f64,
    pub max_distance: f64,
    pub min_volume: f64,
    pub max_volume: f64,
}

impl Default for VolumeBounds {
    fn default() -> Self {
        Self {
            min_distance: 5.0,
            max_distance: 100.0,
            min_volume: 0.05,
            max_volume: 1.0,
        }
    }
}

impl VolumeBounds {
    /// Linear falloff between the two distances
    pub fn base_volume(&self, distance: f64) -> f64 {
        if distance <= self.min_distance {
            self.max_volume
        } else if distance >= self.max_distance {
            self.min_volume
        } else {
            let ratio = (distance - self.min_distance) / (self.max_distance - self.min_distance);
            self.max_volume - ratio * (self.max_volume - self.min_volume)
        }
    }

    /// Per-speaker gains for a source at `position`
    pub fn speaker_gains(&self, position: &Position) -> ChannelGains {
        let base = self.base_volume(position.distance);
        let (primary, bleed) = position.quadrant().speakers();
        ChannelGains::silent()
            .with(primary, (base * PRIMARY_SHARE) as f32)
            .with(bleed, (base * BLEED_SHARE) as f32)
            .with(Speaker::Lfe, (base * LFE_SHARE) as f32)
    }
}
