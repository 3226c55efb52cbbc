use crate::config_struct;

config_struct! {
    /// Exchange REST connectivity
    ///
    /// Empty credentials switch the client into paper-trading mode
    /// against the in-process simulated book.
    pub struct ExchangeConfig {
        /// REST base URL (Binance-style spot API)
        base_url: String = "https://api.binance.com".to_string(),

        /// API key (X-MBX-APIKEY header). Empty = paper mode.
        api_key: String = String::new(),

        /// API secret for HMAC-SHA256 request signing. Empty = paper mode.
        api_secret: String = String::new(),

        /// recvWindow sent with signed requests
        recv_window_ms: u64 = 5000,

        /// Per-request timeout. Must stay below the cycle interval.
        request_timeout_secs: u64 = 10,

        /// Number of klines fetched for the volatility estimate
        volatility_window: usize = 20,
    }
}
