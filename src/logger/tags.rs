/// Log tags identifying the subsystem a message originates from
///
/// Each tag maps to a --debug-<key> command-line flag for selective
/// debug output.

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Engine,
    Market,
    Swarm,
    Consensus,
    Risk,
    Orders,
    Exchange,
    Portfolio,
    Learner,
    Sentiment,
    Webserver,
    Test,
    Other(String),
}

impl LogTag {
    /// Key used for --debug-<key> flag matching
    pub fn to_debug_key(&self) -> String {
        match self {
            LogTag::System => "system".to_string(),
            LogTag::Config => "config".to_string(),
            LogTag::Engine => "engine".to_string(),
            LogTag::Market => "market".to_string(),
            LogTag::Swarm => "swarm".to_string(),
            LogTag::Consensus => "consensus".to_string(),
            LogTag::Risk => "risk".to_string(),
            LogTag::Orders => "orders".to_string(),
            LogTag::Exchange => "exchange".to_string(),
            LogTag::Portfolio => "portfolio".to_string(),
            LogTag::Learner => "learner".to_string(),
            LogTag::Sentiment => "sentiment".to_string(),
            LogTag::Webserver => "webserver".to_string(),
            LogTag::Test => "test".to_string(),
            LogTag::Other(s) => s.to_lowercase(),
        }
    }

    /// Plain uppercase name for file output (no ANSI colors)
    pub fn to_plain_string(&self) -> String {
        match self {
            LogTag::Other(s) => s.to_uppercase(),
            _ => self.to_debug_key().to_uppercase(),
        }
    }
}
