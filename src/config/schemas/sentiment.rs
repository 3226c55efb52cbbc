use crate::config_struct;

config_struct! {
    /// Sentiment / LLM opinion source
    ///
    /// Missing credentials degrade the source to always-Hold with
    /// confidence 0 instead of disabling the system.
    pub struct SentimentConfig {
        /// Chat-completions style endpoint URL
        api_url: String = "https://api.openai.com/v1/chat/completions".to_string(),

        /// API key. Empty = source degraded to Hold/0.
        api_key: String = String::new(),

        /// Model identifier sent with each request
        model: String = "gpt-4o-mini".to_string(),

        /// Request timeout
        request_timeout_secs: u64 = 8,
    }
}
