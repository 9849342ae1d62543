use std::collections::HashMap;
use std::env;
use std::fmt;

use swipe_core::config::{
    optional_trimmed, required_trimmed, value_or_default, ConfigError, Settings,
};

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const MIN_TRIGGER_TOKEN_LEN: usize = 16;

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub trigger_token: String,
    pub settings: Settings,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("trigger_token", &"[REDACTED]")
            .field("settings", &self.settings)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "SWIPE_API_BIND_ADDR", DEFAULT_BIND_ADDR);
        if optional_trimmed(&lookup, "SWIPE_API_BIND_ADDR").is_some()
            && bind_addr.parse::<std::net::SocketAddr>().is_err()
        {
            return Err(ConfigError::Invalid(
                "SWIPE_API_BIND_ADDR must be a socket address like 0.0.0.0:8080".to_string(),
            ));
        }

        let trigger_token = required_trimmed(&lookup, "SWIPE_TRIGGER_TOKEN")?;
        if trigger_token.len() < MIN_TRIGGER_TOKEN_LEN {
            return Err(ConfigError::Invalid(format!(
                "SWIPE_TRIGGER_TOKEN must be at least {MIN_TRIGGER_TOKEN_LEN} characters"
            )));
        }

        let settings = Settings::from_lookup(&lookup)?;

        Ok(Self {
            bind_addr,
            trigger_token,
            settings,
        })
    }
}
