use crate::config_struct;

config_struct! {
    /// Risk gate limits
    ///
    /// Rule ordering lives in the risk module; these are only the
    /// numeric limits the rules compare against.
    pub struct RiskConfig {
        /// Session drawdown that triggers an emergency stop, percent
        max_drawdown_pct: f64 = 10.0,

        /// Minimum consensus strength the gate accepts
        min_confidence: f64 = 0.5,

        /// Maximum open exposure per symbol, quote currency
        max_position_size: f64 = 300.0,
    }
}
