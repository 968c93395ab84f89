// handlers/mod.rs - Public (no auth) and protected (access token) tiers

pub mod public;
pub mod protected;
