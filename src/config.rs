use config::{Config, ConfigError, File};
use serde::{Deserialize, Serialize};

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub reconciliation: ReconciliationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub slow_statement_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    /// 对账行按员工姓名排序 (否则保持插入顺序)
    pub sort_by_name: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "postgres://localhost/benefits".to_string(),
                max_connections: 20,
                acquire_timeout_secs: 10,
                slow_statement_secs: 5,
            },
            reconciliation: ReconciliationConfig { sort_by_name: false },
        }
    }
}

/// 环境变量 -> 配置键
const ENV_OVERRIDES: [(&str, &str); 5] = [
    ("SERVER_HOST", "server.host"),
    ("SERVER_PORT", "server.port"),
    ("DATABASE_URL", "database.url"),
    ("DATABASE_MAX_CONNECTIONS", "database.max_connections"),
    ("RECONCILIATION_SORT_BY_NAME", "reconciliation.sort_by_name"),
];

impl AppConfig {
    /// 加载顺序：默认值 -> benefits-recon.toml (可选) -> 环境变量
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", i64::from(defaults.server.port))?
            .set_default("database.url", defaults.database.url)?
            .set_default("database.max_connections", i64::from(defaults.database.max_connections))?
            .set_default("database.acquire_timeout_secs", defaults.database.acquire_timeout_secs as i64)?
            .set_default("database.slow_statement_secs", defaults.database.slow_statement_secs as i64)?
            .set_default("reconciliation.sort_by_name", defaults.reconciliation.sort_by_name)?
            .add_source(File::with_name("benefits-recon").required(false));

        for (var, key) in ENV_OVERRIDES {
            builder = builder.set_override_option(key, std::env::var(var).ok())?;
        }

        builder.build()?.try_deserialize()
    }

    /// 从环境变量加载配置，出错时退回默认值
    pub fn from_env() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("Invalid configuration, using defaults: {}", e);
            Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_the_loader() {
        // 测试环境中不设置覆盖变量时与默认值一致
        if ENV_OVERRIDES.iter().any(|(var, _)| std::env::var(var).is_ok()) {
            return;
        }
        let loaded = AppConfig::load().unwrap();
        assert_eq!(loaded.server.port, 8080);
        assert_eq!(loaded.database.max_connections, 20);
        assert!(!loaded.reconciliation.sort_by_name);
    }
}
