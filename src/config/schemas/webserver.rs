use crate::config_struct;

config_struct! {
    /// Web control surface configuration
    pub struct WebserverConfig {
        enabled: bool = true,
        bind_address: String = "127.0.0.1".to_string(),
        port: u16 = 8080,
    }
}
