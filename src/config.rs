use anyhow::Result;

/// Relay server configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            server_address: std::env::var("SERVER_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
        })
    }
}
