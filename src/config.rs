use crate::domain::Address;
use crate::routing::aggregator::DEFAULT_ROUTE_API_URL;
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub chain_id: u64,
    pub factory_address: Address,
    pub route_api_url: String,
    pub slippage_bps: u32,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let chain_id = env_map
            .get("CHAIN_ID")
            .map(|s| s.as_str())
            .unwrap_or("1")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue("CHAIN_ID".to_string(), "must be a valid u64".to_string())
            })?;

        let factory_address = env_map
            .get("FACTORY_ADDRESS")
            .ok_or_else(|| ConfigError::MissingEnv("FACTORY_ADDRESS".to_string()))
            .and_then(|s| {
                Address::from_str(s).map_err(|e| {
                    ConfigError::InvalidValue("FACTORY_ADDRESS".to_string(), e.to_string())
                })
            })?;

        let route_api_url = env_map
            .get("ROUTE_API_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_ROUTE_API_URL.to_string());

        let slippage_bps = env_map
            .get("SLIPPAGE_BPS")
            .map(|s| s.as_str())
            .unwrap_or("50")
            .parse::<u32>()
            .ok()
            .filter(|bps| *bps <= 10_000)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "SLIPPAGE_BPS".to_string(),
                    "must be an integer between 0 and 10000".to_string(),
                )
            })?;

        Ok(Config {
            port,
            database_path,
            chain_id,
            factory_address,
            route_api_url,
            slippage_bps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map.insert(
            "FACTORY_ADDRESS".to_string(),
            "0x648ce75895873becbc4c9a291a28ca1ef121953b".to_string(),
        );
        map
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.chain_id, 1);
        assert_eq!(config.slippage_bps, 50);
        assert_eq!(config.route_api_url, DEFAULT_ROUTE_API_URL);
        assert_eq!(
            config.factory_address.to_hex(),
            "0x648ce75895873becbc4c9a291a28ca1ef121953b"
        );
    }

    #[test]
    fn test_missing_database_path() {
        let mut env_map = setup_required_env();
        env_map.remove("DATABASE_PATH");
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_missing_factory_address() {
        let mut env_map = setup_required_env();
        env_map.remove("FACTORY_ADDRESS");
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "FACTORY_ADDRESS"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_invalid_factory_address() {
        let mut env_map = setup_required_env();
        env_map.insert("FACTORY_ADDRESS".to_string(), "0x123".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "FACTORY_ADDRESS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_chain_id() {
        let mut env_map = setup_required_env();
        env_map.insert("CHAIN_ID".to_string(), "-1".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "CHAIN_ID"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_slippage_out_of_range() {
        let mut env_map = setup_required_env();
        env_map.insert("SLIPPAGE_BPS".to_string(), "10001".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "SLIPPAGE_BPS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }
}
