use crate::domain::{CurrencyKind, Ilk, ListOrder};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    /// GraphQL endpoint serving position history. History queries are
    /// unavailable when unset.
    pub query_api_url: Option<String>,
    pub currencies: CurrencyConfig,
    pub list_order: ListOrder,
}

/// Currency and precision settings threaded into the unit converter, the
/// custody adapter and the event translator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyConfig {
    /// The chain's native asset; locked by value-bearing calls.
    pub native: CurrencyKind,
    pub native_decimals: u32,
    /// The debt currency drawn against collateral.
    pub debt: CurrencyKind,
    pub debt_decimals: u32,
    /// Join adapter tag for the debt token.
    pub debt_ilk: Ilk,
    /// Collateral whose token cannot be pulled by transferFrom.
    pub custody: CurrencyKind,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            native: CurrencyKind::new("ETH"),
            native_decimals: 18,
            debt: CurrencyKind::new("MDAI"),
            debt_decimals: 18,
            debt_ilk: Ilk::new("DAI"),
            custody: CurrencyKind::new("GNT"),
        }
    }
}

impl CurrencyConfig {
    pub fn is_native(&self, kind: &CurrencyKind) -> bool {
        &self.native == kind
    }

    pub fn is_debt(&self, kind: &CurrencyKind) -> bool {
        &self.debt == kind
    }

    pub fn requires_custody(&self, kind: &CurrencyKind) -> bool {
        &self.custody == kind
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let defaults = CurrencyConfig::default();

        let query_api_url = env_map
            .get("CDP_QUERY_API_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let native = symbol_or(&env_map, "CDP_NATIVE_SYMBOL", &defaults.native)?;
        let native_decimals =
            decimals_or(&env_map, "CDP_NATIVE_DECIMALS", defaults.native_decimals)?;
        let debt = symbol_or(&env_map, "CDP_DEBT_SYMBOL", &defaults.debt)?;
        let debt_decimals = decimals_or(&env_map, "CDP_DEBT_DECIMALS", defaults.debt_decimals)?;
        let custody = symbol_or(&env_map, "CDP_CUSTODY_SYMBOL", &defaults.custody)?;

        let debt_ilk = env_map
            .get("CDP_DEBT_ILK")
            .map(|s| Ilk::new(s.trim()))
            .unwrap_or(defaults.debt_ilk);

        if native == custody {
            return Err(ConfigError::InvalidValue(
                "CDP_CUSTODY_SYMBOL".to_string(),
                "must differ from CDP_NATIVE_SYMBOL".to_string(),
            ));
        }

        let list_order = match env_map.get("CDP_LIST_ORDER") {
            Some(raw) => raw.parse::<ListOrder>().map_err(|_| {
                ConfigError::InvalidValue(
                    "CDP_LIST_ORDER".to_string(),
                    format!("must be asc or desc, got {}", raw),
                )
            })?,
            None => ListOrder::Descending,
        };

        Ok(Config {
            query_api_url,
            currencies: CurrencyConfig {
                native,
                native_decimals,
                debt,
                debt_decimals,
                debt_ilk,
                custody,
            },
            list_order,
        })
    }
}

fn symbol_or(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &CurrencyKind,
) -> Result<CurrencyKind, ConfigError> {
    match env_map.get(key) {
        Some(raw) if raw.trim().is_empty() => Err(ConfigError::InvalidValue(
            key.to_string(),
            "must not be empty".to_string(),
        )),
        Some(raw) => Ok(CurrencyKind::new(raw)),
        None => Ok(default.clone()),
    }
}

fn decimals_or(
    env_map: &HashMap<String, String>,
    key: &str,
    default: u32,
) -> Result<u32, ConfigError> {
    let Some(raw) = env_map.get(key) else {
        return Ok(default);
    };
    let decimals = raw.trim().parse::<u32>().map_err(|_| {
        ConfigError::InvalidValue(key.to_string(), "must be a valid u32".to_string())
    })?;
    if decimals > crate::domain::decimal::MAX_SCALE {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("must be at most {}", crate::domain::decimal::MAX_SCALE),
        ));
    }
    Ok(decimals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(HashMap::new()).unwrap();
        assert!(config.query_api_url.is_none());
        assert_eq!(config.currencies, CurrencyConfig::default());
        assert_eq!(config.list_order, ListOrder::Descending);
    }

    #[test]
    fn test_overrides() {
        let mut env_map = HashMap::new();
        env_map.insert("CDP_NATIVE_SYMBOL".to_string(), "bnb".to_string());
        env_map.insert("CDP_DEBT_DECIMALS".to_string(), "6".to_string());
        env_map.insert("CDP_LIST_ORDER".to_string(), "asc".to_string());
        env_map.insert(
            "CDP_QUERY_API_URL".to_string(),
            "https://indexer.example/graphql".to_string(),
        );

        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.currencies.native, CurrencyKind::new("BNB"));
        assert_eq!(config.currencies.debt_decimals, 6);
        assert_eq!(config.list_order, ListOrder::Ascending);
        assert_eq!(
            config.query_api_url.as_deref(),
            Some("https://indexer.example/graphql")
        );
    }

    #[test]
    fn test_invalid_decimals() {
        let mut env_map = HashMap::new();
        env_map.insert("CDP_NATIVE_DECIMALS".to_string(), "eighteen".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "CDP_NATIVE_DECIMALS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_decimals_above_limit() {
        let mut env_map = HashMap::new();
        env_map.insert("CDP_DEBT_DECIMALS".to_string(), "30".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "CDP_DEBT_DECIMALS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_list_order() {
        let mut env_map = HashMap::new();
        env_map.insert("CDP_LIST_ORDER".to_string(), "random".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "CDP_LIST_ORDER"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_custody_cannot_be_native() {
        let mut env_map = HashMap::new();
        env_map.insert("CDP_CUSTODY_SYMBOL".to_string(), "ETH".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "CDP_CUSTODY_SYMBOL"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_empty_symbol_rejected() {
        let mut env_map = HashMap::new();
        env_map.insert("CDP_DEBT_SYMBOL".to_string(), "  ".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "CDP_DEBT_SYMBOL"),
            _ => panic!("Expected InvalidValue error"),
        }
    }
}
