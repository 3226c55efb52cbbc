use crate::config_struct;

config_struct! {
    /// Opinion swarm configuration
    ///
    /// Source weights are starting values; the learner nudges them at
    /// runtime based on recorded outcomes.
    pub struct SwarmConfig {
        /// Consensus strength required for a directional action
        consensus_threshold: f64 = 0.65,

        /// Technical-analysis source voting weight
        technical_weight: f64 = 0.30,

        /// Sentiment source voting weight
        sentiment_weight: f64 = 0.20,

        /// Optimizer (learned model) source voting weight
        optimizer_weight: f64 = 0.25,

        /// Execution-timing source voting weight
        timing_weight: f64 = 0.25,

        /// SMA windows for the technical source
        sma_fast_window: usize = 10,
        sma_slow_window: usize = 20,

        /// Trend threshold for the technical source, fraction of price
        trend_threshold: f64 = 0.002,

        /// Volatility multiple above which the timing source
        /// emits EmergencyStop
        volatility_circuit_multiple: f64 = 5.0,
    }
}
