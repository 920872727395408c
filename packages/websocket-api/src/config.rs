use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use shared::config::{parse_var, ConfigError, MatchmakingConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Memory,
    DynamoDb,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "dynamodb" => Ok(StoreBackend::DynamoDb),
            other => Err(format!("'{}' is not one of memory, dynamodb", other)),
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Memory => write!(f, "memory"),
            StoreBackend::DynamoDb => write!(f, "dynamodb"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_address: SocketAddr,
    pub store: StoreBackend,
    pub queue_table: String,
    pub conversations_table: String,
    pub matchmaking: MatchmakingConfig,
}

impl ServerConfig {
    /// Reads the process environment, after loading a `.env` file if one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        #[cfg(not(test))]
        dotenvy::dotenv().ok();

        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default_address = SocketAddr::from(([0, 0, 0, 0], 3000));

        Ok(ServerConfig {
            bind_address: parse_var(&lookup, "BIND_ADDRESS", default_address)?,
            store: parse_var(&lookup, "STORE_BACKEND", StoreBackend::default())?,
            queue_table: lookup("QUEUE_TABLE").unwrap_or_else(|| "stranger-queue".to_string()),
            conversations_table: lookup("CONVERSATIONS_TABLE")
                .unwrap_or_else(|| "stranger-conversations".to_string()),
            matchmaking: MatchmakingConfig::from_lookup(&lookup)?,
        })
    }
}
