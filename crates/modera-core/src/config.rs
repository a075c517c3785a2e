use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

/// Process-wide configuration, populated once from the environment.
///
/// A single `LazyLock` loaded through `figment`, with nested sections
/// addressed by `MODERA__SECTION__KEY` env vars (double underscore
/// separates levels).
pub static CONFIG: LazyLock<AppConfig> = LazyLock::new(load_config);

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub bus: BusConfig,
    pub scorer: ScorerConfig,
    #[serde(default)]
    pub debug: DebugConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_ip: std::net::IpAddr,
    pub listen_port: u16,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl DatabaseConfig {
    #[must_use]
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
}

impl CacheConfig {
    #[must_use]
    pub fn connection_url(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BusConfig {
    pub bootstrap_servers: String,
    pub topic: String,
    pub dlq_topic: String,
    pub group_id: String,
    pub auto_offset_reset: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScorerConfig {
    pub model_path: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DebugConfig {
    /// Run migrations before serving requests. Not recommended with
    /// multiple replicas running concurrently.
    #[serde(default)]
    pub migrate_before_serve: bool,
    /// Run the `serve` command unless another subcommand is specified.
    #[serde(default)]
    pub auto_serve: bool,
}

fn defaults() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            bind_ip: std::net::IpAddr::from([0, 0, 0, 0]),
            listen_port: 8080,
        },
        database: DatabaseConfig {
            host: "localhost".to_string(),
            port: 5432,
            user: "modera".to_string(),
            password: "modera".to_string(),
            database: "modera".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 10,
        },
        cache: CacheConfig {
            host: "localhost".to_string(),
            port: 6379,
            db: 0,
            connect_timeout_ms: 1000,
            read_timeout_ms: 1000,
        },
        bus: BusConfig {
            bootstrap_servers: "localhost:9092".to_string(),
            topic: "moderation".to_string(),
            dlq_topic: "moderation_dlq".to_string(),
            group_id: "moderation-worker".to_string(),
            auto_offset_reset: "earliest".to_string(),
        },
        scorer: ScorerConfig {
            model_path: "model.bin".to_string(),
        },
        debug: DebugConfig::default(),
    }
}

fn load_config() -> AppConfig {
    let defaults = figment::providers::Serialized::defaults(defaults());

    #[cfg(not(test))]
    let prefixes = &["MODERA__"];
    #[cfg(test)]
    let prefixes = &["MODERA_TEST__"];

    let mut config = figment::Figment::from(defaults);
    for prefix in prefixes {
        let env = figment::providers::Env::prefixed(prefix).split("__");
        config = config.merge(env);
    }

    match config.extract::<AppConfig>() {
        Ok(c) => c,
        Err(e) => panic!("Failed to extract Modera config: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_env_override() {
        figment::Jail::expect_with(|_jail| {
            let config = load_config();
            assert_eq!(config.database.host, "localhost");
            assert!(!config.debug.migrate_before_serve);
            Ok(())
        });

        figment::Jail::expect_with(|jail| {
            jail.set_env("MODERA_TEST__DATABASE__HOST", "db.internal");
            jail.set_env("MODERA_TEST__DEBUG__MIGRATE_BEFORE_SERVE", "true");
            let config = load_config();
            assert_eq!(config.database.host, "db.internal");
            assert!(config.debug.migrate_before_serve);
            Ok(())
        });
    }
}
