use crate::config_struct;

config_struct! {
    /// Trading engine configuration
    pub struct EngineConfig {
        /// Engine control
        enabled: bool = true,

        /// Symbols to trade (one scheduler instance per symbol)
        symbols: Vec<String> = vec!["BTCUSDT".to_string()],

        /// Fixed cycle interval. Overrunning cycles restart immediately
        /// after completion instead of stacking.
        cycle_interval_secs: u64 = 30,

        /// Minimum wait between cycles when the previous one overran
        cycle_min_wait_ms: u64 = 100,

        /// Capital allocated per symbol (quote currency)
        capital_per_symbol: f64 = 1000.0,

        /// Quote ladder: number of levels per side
        order_levels: usize = 3,

        /// Base spread per ladder level, percent of mid price
        base_spread_pct: f64 = 0.15,

        /// Minimum order notional; resize below this rejects instead
        min_order_notional: f64 = 10.0,
    }
}
