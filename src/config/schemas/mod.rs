// Config schemas - all config structures defined once with defaults

use crate::config_struct;

mod engine;
mod exchange;
mod learner;
mod risk;
mod sentiment;
mod swarm;
mod webserver;

pub use engine::*;
pub use exchange::*;
pub use learner::*;
pub use risk::*;
pub use sentiment::*;
pub use swarm::*;
pub use webserver::*;

// ============================================================================
// ROOT CONFIGURATION
// ============================================================================

config_struct! {
    /// Root configuration structure containing all sub-configurations
    pub struct Config {
        /// Exchange connectivity and credentials
        exchange: ExchangeConfig = ExchangeConfig::default(),

        /// Trading engine (cycle loop, ladder, capital)
        engine: EngineConfig = EngineConfig::default(),

        /// Opinion swarm (sources, weights, consensus threshold)
        swarm: SwarmConfig = SwarmConfig::default(),

        /// Risk gate limits
        risk: RiskConfig = RiskConfig::default(),

        /// Sentiment / LLM opinion source
        sentiment: SentimentConfig = SentimentConfig::default(),

        /// Experience store and learner
        learner: LearnerConfig = LearnerConfig::default(),

        /// Web control surface
        webserver: WebserverConfig = WebserverConfig::default(),
    }
}
