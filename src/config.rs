use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub ingredients_path: Option<String>,
}

impl Config {
    /// Read configuration from the process environment.
    ///
    /// `DATABASE_URL` is required. `DATABASE_MAX_CONNECTIONS` defaults to 10.
    /// `INGREDIENTS_PATH`, when set, names a JSON catalogue imported on start.
    pub fn init() -> Result<Config, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(value) => value
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid {
                    key: "DATABASE_MAX_CONNECTIONS",
                    value,
                })?,
            None => 10,
        };

        let ingredients_path = lookup("INGREDIENTS_PATH").filter(|path| !path.is_empty());

        Ok(Config {
            database_url,
            max_connections,
            ingredients_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults() {
        let vars = env(&[("DATABASE_URL", "postgres://localhost/foodgram")]);
        let config = Config::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.database_url, "postgres://localhost/foodgram");
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.ingredients_path, None);
    }

    #[test]
    fn missing_database_url() {
        let err = Config::from_lookup(|_| None).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn invalid_max_connections() {
        let vars = env(&[
            ("DATABASE_URL", "postgres://localhost/foodgram"),
            ("DATABASE_MAX_CONNECTIONS", "zero"),
        ]);
        let err = Config::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "DATABASE_MAX_CONNECTIONS", .. }));
    }

    #[test]
    fn ingredients_path() {
        let vars = env(&[
            ("DATABASE_URL", "postgres://localhost/foodgram"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
            ("INGREDIENTS_PATH", "data/ingredients.json"),
        ]);
        let config = Config::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.max_connections, 4);
        assert_eq!(
            config.ingredients_path.as_deref(),
            Some("data/ingredients.json")
        );
    }
}
