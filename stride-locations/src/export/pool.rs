//! Pool de connexions PostgreSQL

use anyhow::{Context, Result};
use deadpool_postgres::{Config, Pool, PoolConfig, Runtime, Timeouts};
use std::time::Duration;
use tokio_postgres::NoTls;
use tokio_postgres_rustls::MakeRustlsConnect;

/// Mode SSL pour la connexion PostgreSQL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SslMode {
    /// Pas de SSL (défaut)
    #[default]
    Disable,
    /// SSL requis
    Require,
}

impl std::str::FromStr for SslMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "disable" | "off" | "false" | "no" => Ok(SslMode::Disable),
            "require" | "on" | "true" | "yes" => Ok(SslMode::Require),
            _ => Err(format!("Invalid SSL mode: {}. Use: disable, require", s)),
        }
    }
}

/// Configuration de la base de données
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: Option<String>,
    pub pool_size: usize,
    pub ssl_mode: SslMode,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5432,
            dbname: "stride".into(),
            user: "postgres".into(),
            password: None,
            // Une seule session d'écriture par exécution
            pool_size: 2,
            ssl_mode: SslMode::Disable,
        }
    }
}

impl DatabaseConfig {
    /// Charge la configuration depuis les variables d'environnement
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Construit la configuration à partir d'une source de variables
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("PGHOST").unwrap_or(defaults.host),
            port: lookup("PGPORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            dbname: lookup("PGDATABASE").unwrap_or(defaults.dbname),
            user: lookup("PGUSER").unwrap_or(defaults.user),
            password: lookup("PGPASSWORD"),
            pool_size: lookup("POOL_SIZE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.pool_size),
            ssl_mode: lookup("PGSSLMODE")
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
        }
    }

    /// Description de la connexion sans le mot de passe (pour les logs)
    pub fn describe(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.dbname)
    }
}

/// Crée la configuration TLS pour rustls
fn make_tls_connector() -> MakeRustlsConnect {
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    MakeRustlsConnect::new(config)
}

/// Crée un pool de connexions
pub fn create_pool(config: &DatabaseConfig) -> Result<Pool> {
    let mut cfg = Config::new();
    cfg.host = Some(config.host.clone());
    cfg.port = Some(config.port);
    cfg.dbname = Some(config.dbname.clone());
    cfg.user = Some(config.user.clone());
    cfg.password = config.password.clone();

    cfg.pool = Some(PoolConfig {
        max_size: config.pool_size.max(1),
        timeouts: Timeouts {
            wait: Some(Duration::from_secs(30)),
            create: Some(Duration::from_secs(10)),
            recycle: Some(Duration::from_secs(30)),
        },
        ..Default::default()
    });

    match config.ssl_mode {
        SslMode::Disable => cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .context("Failed to create database pool"),
        SslMode::Require => cfg
            .create_pool(Some(Runtime::Tokio1), make_tls_connector())
            .context("Failed to create database pool with TLS"),
    }
}

/// Teste la connexion à la base
pub async fn test_connection(pool: &Pool) -> Result<()> {
    let client = pool
        .get()
        .await
        .context("Failed to get connection from pool")?;
    client
        .execute("SELECT 1", &[])
        .await
        .context("Connection test failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_ssl_mode_parse() {
        assert_eq!("require".parse::<SslMode>().unwrap(), SslMode::Require);
        assert_eq!("OFF".parse::<SslMode>().unwrap(), SslMode::Disable);
        assert!("verify-full".parse::<SslMode>().is_err());
        // Pas de repli en clair : seul `require` active TLS
        assert!("prefer".parse::<SslMode>().is_err());
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("PGHOST", "db.internal"),
            ("PGPORT", "6543"),
            ("PGDATABASE", "openbus"),
            ("PGSSLMODE", "require"),
        ]
        .into_iter()
        .collect();

        let config = DatabaseConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 6543);
        assert_eq!(config.user, "postgres");
        assert_eq!(config.ssl_mode, SslMode::Require);
        assert_eq!(config.describe(), "postgres@db.internal:6543/openbus");
    }

    #[test]
    fn test_invalid_port_falls_back() {
        let config = DatabaseConfig::from_lookup(|k| (k == "PGPORT").then(|| "abc".to_string()));
        assert_eq!(config.port, 5432);
        assert_eq!(config.dbname, "stride");
    }
}
