//! swarmbot - consensus-driven market-making engine
//!
//! A cycle scheduler drives one decision loop per symbol: snapshot
//! the market, collect weighted opinions from the swarm, aggregate
//! them into a consensus, pass it through the risk gate and rebuild
//! the order ladder via cancel-then-replace. Outcomes feed an
//! experience store that periodically retrains the reward model and
//! nudges source weights.

pub mod apis;
pub mod arguments;
pub mod config;
pub mod consensus;
pub mod engine;
pub mod errors;
pub mod events;
pub mod exchange;
pub mod learning;
pub mod logger;
pub mod market;
pub mod orders;
pub mod paths;
pub mod portfolio;
pub mod risk;
pub mod swarm;
#[cfg(feature = "web")]
pub mod webserver;
