//! bb8-managed diesel-async connections to PostgreSQL, optionally over rustls.

use crate::config::DatabaseConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use bb8::{ManageConnection, Pool};
use diesel_async::{AsyncPgConnection, SimpleAsyncConnection};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore};
use std::fs::File;
use std::io::BufReader;
use tokio_postgres::{Config as PgConfig, NoTls};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{error, info};

pub type PgPool = Pool<PgConnectionManager>;

/// Builds a pool for one store. `label` only appears in logs.
pub async fn connect_pool(config: &DatabaseConfig, label: &str) -> Result<PgPool> {
    let manager = PgConnectionManager::from_config(config)
        .with_context(|| format!("invalid {label} database settings"))?;
    let pool = Pool::builder()
        .max_size(config.max_pool_size)
        .build(manager)
        .await
        .with_context(|| format!("failed to build {label} PostgreSQL connection pool"))?;

    // Startup check only; a failure here is logged, the pool keeps retrying.
    match pool.get().await {
        Ok(_) => info!(store = label, "database connectivity check succeeded"),
        Err(err) => error!(
            store = label,
            error = ?err,
            "initial database connectivity check failed"
        ),
    }

    Ok(pool)
}

#[derive(Clone)]
pub struct PgConnectionManager {
    config: PgConfig,
    tls: Option<MakeRustlsConnect>,
}

impl PgConnectionManager {
    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        let pg_config = config
            .url
            .parse::<PgConfig>()
            .context("invalid database URL")?;
        let tls = config
            .ssl_root_cert
            .as_deref()
            .map(|root| {
                tls_connector(root, config.ssl_cert.as_deref(), config.ssl_key.as_deref())
            })
            .transpose()?;

        Ok(Self {
            config: pg_config,
            tls,
        })
    }
}

#[async_trait]
impl ManageConnection for PgConnectionManager {
    type Connection = AsyncPgConnection;
    type Error = anyhow::Error;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let conn = match &self.tls {
            Some(connector) => {
                let (client, connection) = self.config.connect(connector.clone()).await?;
                AsyncPgConnection::try_from_client_and_connection(client, connection).await
            }
            None => {
                let (client, connection) = self.config.connect(NoTls).await?;
                AsyncPgConnection::try_from_client_and_connection(client, connection).await
            }
        };
        conn.map_err(|err| anyhow::anyhow!(err))
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.batch_execute("SELECT 1").await?;
        Ok(())
    }

    fn has_broken(&self, _: &mut Self::Connection) -> bool {
        false
    }
}

fn tls_connector(
    root_cert: &str,
    client_cert: Option<&str>,
    client_key: Option<&str>,
) -> Result<MakeRustlsConnect> {
    let mut roots = RootCertStore::empty();
    for cert in read_certs(root_cert)? {
        roots
            .add(cert)
            .map_err(|_| anyhow::anyhow!("invalid certificate in '{root_cert}'"))?;
    }

    let builder = ClientConfig::builder().with_root_certificates(roots);
    let client_config = match (client_cert, client_key) {
        (None, None) => builder.with_no_client_auth(),
        (Some(cert), Some(key)) => builder
            .with_client_auth_cert(read_certs(cert)?, read_key(key)?)
            .context("failed to build client TLS config")?,
        _ => anyhow::bail!("client certificate and key must both be set (or neither)"),
    };

    Ok(MakeRustlsConnect::new(client_config))
}

fn open_pem(path: &str) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("failed to open PEM file '{path}'"))?;
    Ok(BufReader::new(file))
}

fn read_certs(path: &str) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = open_pem(path)?;
    let chain = rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("failed to parse certificates in '{path}'"))?;

    if chain.is_empty() {
        anyhow::bail!("'{path}' contained no certificates");
    }
    Ok(chain)
}

fn read_key(path: &str) -> Result<PrivateKeyDer<'static>> {
    let mut reader = open_pem(path)?;
    rustls_pemfile::private_key(&mut reader)
        .with_context(|| format!("failed to parse private key in '{path}'"))?
        .with_context(|| format!("'{path}' contained no private keys"))
}
