use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    env,
    net::{SocketAddr, ToSocketAddrs},
    time::Duration,
};

const MIB: usize = 1024 * 1024;

/// Connection settings for one PostgreSQL store.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_pool_size: u32,
    pub ssl_root_cert: Option<String>,
    pub ssl_cert: Option<String>,
    pub ssl_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub database: DatabaseConfig,
    pub api_key: Option<String>,
    pub allowed_origins: Option<Vec<String>>,
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
    pub max_download_bytes: usize,
}

/// Settings for the `cellmap-sync` reconciliation run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub source: DatabaseConfig,
    pub destination: DatabaseConfig,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    cellmap_listen_addr: Option<String>,
    #[serde(default)]
    cellmap_listen_host: Option<String>,
    #[serde(default)]
    cellmap_listen_port: Option<u16>,
    #[serde(default)]
    cellmap_database_url: Option<String>,
    #[serde(default)]
    database_url: Option<String>,
    #[serde(default = "default_pool_size")]
    cellmap_max_pool_size: u32,
    #[serde(default)]
    pgsslrootcert: Option<String>,
    #[serde(default)]
    pgsslcert: Option<String>,
    #[serde(default)]
    pgsslkey: Option<String>,
    #[serde(default)]
    cellmap_api_key: Option<String>,
    #[serde(default)]
    cellmap_allowed_origins: Option<String>,
    #[serde(default = "default_timeout_secs")]
    cellmap_request_timeout_secs: u64,
    #[serde(default = "default_body_mb")]
    cellmap_max_body_mb: usize,
    #[serde(default = "default_body_mb")]
    cellmap_max_download_mb: usize,
    #[serde(default)]
    cellmap_sync_source_url: Option<String>,
    #[serde(default)]
    cellmap_sync_source_ssl_root_cert: Option<String>,
    #[serde(default = "default_sync_pool_size")]
    cellmap_sync_pool_size: u32,
}

const fn default_pool_size() -> u32 {
    10
}

const fn default_sync_pool_size() -> u32 {
    2
}

const fn default_timeout_secs() -> u64 {
    300
}

const fn default_body_mb() -> usize {
    50
}

impl RawConfig {
    fn from_env() -> Result<Self> {
        envy::from_env().context("failed to parse CELLMAP_* environment variables")
    }

    fn database(&self) -> Result<DatabaseConfig> {
        let url = self
            .cellmap_database_url
            .clone()
            .or_else(|| self.database_url.clone())
            .or_else(|| env::var("DATABASE_URL").ok())
            .context("CELLMAP_DATABASE_URL or DATABASE_URL must be set")?;

        if self.pgsslcert.is_some() != self.pgsslkey.is_some() {
            anyhow::bail!("PGSSLCERT and PGSSLKEY must both be set (or neither)");
        }

        Ok(DatabaseConfig {
            url,
            max_pool_size: self.cellmap_max_pool_size.max(1),
            ssl_root_cert: self.pgsslrootcert.clone(),
            ssl_cert: self.pgsslcert.clone(),
            ssl_key: self.pgsslkey.clone(),
        })
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_raw(RawConfig::from_env()?)
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        let database = raw.database()?;
        let listen_addr = resolve_addr(
            raw.cellmap_listen_addr,
            raw.cellmap_listen_host,
            raw.cellmap_listen_port,
        )?;

        let allowed_origins = raw.cellmap_allowed_origins.and_then(|csv| {
            let trimmed: Vec<_> = csv
                .split(',')
                .filter_map(|part| {
                    let entry = part.trim();
                    if entry.is_empty() {
                        None
                    } else {
                        Some(entry.to_string())
                    }
                })
                .collect();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed)
            }
        });

        Ok(Self {
            listen_addr,
            database,
            api_key: raw.cellmap_api_key.filter(|key| !key.is_empty()),
            allowed_origins,
            request_timeout: Duration::from_secs(raw.cellmap_request_timeout_secs.max(1)),
            max_body_bytes: raw.cellmap_max_body_mb.max(1) * MIB,
            max_download_bytes: raw.cellmap_max_download_mb.max(1) * MIB,
        })
    }
}

impl SyncConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_raw(RawConfig::from_env()?)
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        let mut destination = raw.database()?;
        destination.max_pool_size = raw.cellmap_sync_pool_size.max(1);

        let source_url = raw
            .cellmap_sync_source_url
            .context("CELLMAP_SYNC_SOURCE_URL must be set")?;

        Ok(Self {
            source: DatabaseConfig {
                url: source_url,
                max_pool_size: raw.cellmap_sync_pool_size.max(1),
                ssl_root_cert: raw.cellmap_sync_source_ssl_root_cert,
                ssl_cert: None,
                ssl_key: None,
            },
            destination,
        })
    }
}

fn resolve_addr(
    addr: Option<String>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<SocketAddr> {
    if let Some(addr) = addr {
        return addr
            .to_socket_addrs()
            .context("invalid CELLMAP_LISTEN_ADDR value")?
            .next()
            .context("CELLMAP_LISTEN_ADDR resolved to no addresses");
    }

    let host = host.unwrap_or_else(|| "0.0.0.0".to_string());
    let port = port.unwrap_or(3000);
    let combined = format!("{}:{}", host, port);
    combined
        .to_socket_addrs()
        .context("invalid CELLMAP listen host/port combination")?
        .next()
        .context("listen address resolved to no targets")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(vars: &[(&str, &str)]) -> RawConfig {
        envy::from_iter(
            vars.iter()
                .map(|(key, value)| (key.to_string(), value.to_string())),
        )
        .unwrap()
    }

    #[test]
    fn applies_defaults() {
        let config = AppConfig::from_raw(raw(&[(
            "CELLMAP_DATABASE_URL",
            "postgres://cellmap@localhost/cellmap",
        )]))
        .unwrap();

        assert_eq!(config.listen_addr.port(), 3000);
        assert_eq!(config.database.max_pool_size, 10);
        assert_eq!(config.request_timeout, Duration::from_secs(300));
        assert_eq!(config.max_body_bytes, 50 * MIB);
        assert_eq!(config.max_download_bytes, 50 * MIB);
        assert!(config.api_key.is_none());
        assert!(config.allowed_origins.is_none());
    }

    #[test]
    fn parses_origins_and_listen_addr() {
        let config = AppConfig::from_raw(raw(&[
            ("CELLMAP_DATABASE_URL", "postgres://localhost/cellmap"),
            ("CELLMAP_LISTEN_ADDR", "127.0.0.1:8088"),
            ("CELLMAP_ALLOWED_ORIGINS", "https://a.example, ,https://b.example"),
        ]))
        .unwrap();

        assert_eq!(config.listen_addr, SocketAddr::from(([127, 0, 0, 1], 8088)));
        assert_eq!(
            config.allowed_origins,
            Some(vec![
                "https://a.example".to_string(),
                "https://b.example".to_string()
            ])
        );
    }

    #[test]
    fn requires_paired_client_certificates() {
        let err = AppConfig::from_raw(raw(&[
            ("CELLMAP_DATABASE_URL", "postgres://localhost/cellmap"),
            ("PGSSLCERT", "/etc/cellmap/client.pem"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("PGSSLKEY"));
    }

    #[test]
    fn sync_requires_source_url() {
        let err = SyncConfig::from_raw(raw(&[(
            "CELLMAP_DATABASE_URL",
            "postgres://localhost/cellmap",
        )]))
        .unwrap_err();
        assert!(err.to_string().contains("CELLMAP_SYNC_SOURCE_URL"));

        let config = SyncConfig::from_raw(raw(&[
            ("CELLMAP_DATABASE_URL", "postgres://localhost/cellmap"),
            ("CELLMAP_SYNC_SOURCE_URL", "postgres://remote.example/speedtests"),
        ]))
        .unwrap();
        assert_eq!(config.source.url, "postgres://remote.example/speedtests");
        assert_eq!(config.destination.max_pool_size, 2);
    }
}
