//! Cassandra store
//!
//! [`Store`] backed by a Cassandra (or Scylla) table of the shape
//! `(key text PRIMARY KEY, value blob)`, using the `scylla` driver.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use openssl::error::ErrorStack;
use openssl::ssl::{SslContext, SslContextBuilder, SslFiletype, SslMethod, SslVerifyMode};
use parking_lot::RwLock;
use scylla::load_balancing::DefaultPolicy;
use scylla::prepared_statement::PreparedStatement;
use scylla::statement::Consistency;
use scylla::{ExecutionProfile, Session, SessionBuilder};
use tracing::debug;

use super::{Datum, Store};
use crate::config::{CassandraConfig, CassandraTlsConfig};
use crate::error::{Result, StorageError};

/// CQL text for the three statements, bound to one keyspace and table.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Statements {
    insert: String,
    select: String,
    delete: String,
}

impl Statements {
    fn new(keyspace: &str, table: &str) -> Self {
        let table = format!(r#""{}"."{}""#, keyspace, table);
        Self {
            insert: format!("INSERT INTO {} (key, value) VALUES (?, ?) USING TTL ?", table),
            select: format!("SELECT value, TTL(value) FROM {} WHERE key = ?", table),
            delete: format!("DELETE FROM {} WHERE key = ?", table),
        }
    }
}

// == Cassandra Store ==
pub struct CassandraStore {
    /// `None` once closed
    session: RwLock<Option<Arc<Session>>>,
    insert: PreparedStatement,
    select: PreparedStatement,
    delete: PreparedStatement,
}

impl CassandraStore {
    /// Opens a session against the configured cluster and prepares statements.
    pub async fn connect(config: &CassandraConfig) -> Result<Self> {
        let nodes: Vec<String> = config
            .hosts
            .iter()
            .map(|host| format!("{}:{}", host, config.port))
            .collect();

        let mut policy = DefaultPolicy::builder().token_aware(true);
        if let Some(dc) = &config.local_dc {
            policy = policy.prefer_datacenter(dc.clone());
        }
        let profile = ExecutionProfile::builder()
            .consistency(Consistency::LocalQuorum)
            .request_timeout(Some(Duration::from_millis(config.query_timeout_ms)))
            .load_balancing_policy(policy.build())
            .build();

        let mut builder = SessionBuilder::new()
            .known_nodes(&nodes)
            .use_keyspace(&config.keyspace, true)
            .connection_timeout(Duration::from_millis(config.connect_timeout_ms))
            .default_execution_profile_handle(profile.into_handle())
            .ssl_context(ssl_context(&config.tls)?);

        let auth = &config.authentication;
        if let (Some(username), Some(password)) = (&auth.username, &auth.password) {
            builder = builder.user(username.as_str(), password.as_str());
        }

        debug!("Connecting to Cassandra at {:?}", nodes);
        let session = builder
            .build()
            .await
            .map_err(|e| StorageError::Backend(format!("connecting to {:?}: {}", nodes, e)))?;

        let cql = Statements::new(&config.keyspace, &config.table);
        let insert = prepare(&session, cql.insert, Consistency::LocalQuorum).await?;
        let select = prepare(&session, cql.select, Consistency::LocalQuorum).await?;
        let delete = prepare(&session, cql.delete, Consistency::EachQuorum).await?;

        Ok(Self {
            session: RwLock::new(Some(Arc::new(session))),
            insert,
            select,
            delete,
        })
    }

    fn session(&self) -> Result<Arc<Session>> {
        self.session.read().clone().ok_or(StorageError::Closed)
    }
}

/// Client TLS context for CQL connections; `None` unless a CA is configured.
///
/// The server chain is verified against `ca`. The client certificate and key
/// are presented only when both are set.
fn ssl_context(tls: &CassandraTlsConfig) -> Result<Option<SslContext>> {
    let Some(ca) = &tls.ca else {
        return Ok(None);
    };

    let mut builder = SslContextBuilder::new(SslMethod::tls_client()).map_err(backend)?;
    builder.set_verify(SslVerifyMode::PEER);
    builder
        .set_ca_file(ca)
        .map_err(|e| tls_error("CA", ca, e))?;

    if let (Some(cert), Some(key)) = (&tls.cert, &tls.key) {
        builder
            .set_certificate_chain_file(cert)
            .map_err(|e| tls_error("certificate", cert, e))?;
        builder
            .set_private_key_file(key, SslFiletype::PEM)
            .map_err(|e| tls_error("key", key, e))?;
        builder.check_private_key().map_err(|e| tls_error("key", key, e))?;
    }

    Ok(Some(builder.build()))
}

fn tls_error(what: &str, path: &Path, err: ErrorStack) -> StorageError {
    StorageError::Backend(format!("loading TLS {} {}: {}", what, path.display(), err))
}

async fn prepare(
    session: &Session,
    cql: String,
    consistency: Consistency,
) -> Result<PreparedStatement> {
    let mut statement = session
        .prepare(cql.as_str())
        .await
        .map_err(|e| StorageError::Backend(format!("preparing `{}`: {}", cql, e)))?;
    statement.set_consistency(consistency);
    Ok(statement)
}

fn backend(err: impl std::fmt::Display) -> StorageError {
    StorageError::Backend(err.to_string())
}

#[async_trait]
impl Store for CassandraStore {
    async fn set(&self, key: &str, value: &[u8], ttl: u32) -> Result<()> {
        let ttl = i32::try_from(ttl).map_err(backend)?;
        self.session()?
            .execute_unpaged(&self.insert, (key, value.to_vec(), ttl))
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Datum> {
        let result = self
            .session()?
            .execute_unpaged(&self.select, (key,))
            .await
            .map_err(backend)?;

        let row = result
            .maybe_first_row_typed::<(Vec<u8>, Option<i32>)>()
            .map_err(backend)?;

        match row {
            Some((value, ttl)) => Ok(Datum {
                value,
                ttl: ttl.and_then(|t| u32::try_from(t).ok()).unwrap_or(0),
            }),
            None => Err(StorageError::NotFound(key.to_string())),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.session()?
            .execute_unpaged(&self.delete, (key,))
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn close(&self) {
        // In-flight requests keep their own handle; the session goes away with the last one.
        self.session.write().take();
    }
}
