//! Platform-free core of moa: speaker layout, asset cache, voice mixing,
//! stream negotiation and the roaming-agent simulation.

pub mod domain;
