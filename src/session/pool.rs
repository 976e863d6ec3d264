use std::time::Duration;

use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio::task::JoinHandle;
use tokio_postgres::NoTls;

use crate::config::ConnectionConfig;
use crate::error::SqlRepositoryError;

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Configured upper bound on connections
    pub max_size: usize,
    /// Connections currently open (idle + in use)
    pub size: usize,
    /// Idle connections ready to be handed out
    pub available: usize,
}

impl PoolStatus {
    pub(super) fn of(pool: &Pool) -> Self {
        let status = pool.status();
        PoolStatus {
            max_size: status.max_size,
            size: status.size,
            available: usize::try_from(status.available).unwrap_or(0),
        }
    }
}

/// Build (but do not test) a pool from the resolved connection settings.
pub(super) fn build_pool(config: &ConnectionConfig) -> Result<Pool, SqlRepositoryError> {
    let pg_config = config.to_pg_config()?;
    let manager_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };
    let manager = if ConnectionConfig::requires_tls(&pg_config) {
        tls_manager(pg_config, manager_config)?
    } else {
        Manager::from_config(pg_config, NoTls, manager_config)
    };

    let mut builder = Pool::builder(manager).runtime(Runtime::Tokio1);
    if let Some(max_size) = config.pool_size {
        builder = builder.max_size(max_size);
    }
    if let Some(timeout) = config.connection_timeout() {
        builder = builder
            .create_timeout(Some(timeout))
            .wait_timeout(Some(timeout));
    }
    builder.build().map_err(|e| {
        SqlRepositoryError::connection_with(format!("Failed to create PostgreSQL pool: {e}"), e)
    })
}

#[cfg(feature = "native-tls")]
fn tls_manager(
    pg_config: tokio_postgres::Config,
    manager_config: ManagerConfig,
) -> Result<Manager, SqlRepositoryError> {
    let connector = native_tls::TlsConnector::new().map_err(|e| {
        SqlRepositoryError::connection_with(format!("Failed to build TLS connector: {e}"), e)
    })?;
    Ok(Manager::from_config(
        pg_config,
        postgres_native_tls::MakeTlsConnector::new(connector),
        manager_config,
    ))
}

#[cfg(not(feature = "native-tls"))]
fn tls_manager(
    _pg_config: tokio_postgres::Config,
    _manager_config: ManagerConfig,
) -> Result<Manager, SqlRepositoryError> {
    Err(SqlRepositoryError::connection(
        "ssl was requested but sql-repository was built without the `native-tls` feature",
    ))
}

/// Periodically close pooled connections that have sat idle longer than `idle`.
pub(super) fn spawn_idle_reaper(pool: Pool, idle: Duration) -> JoinHandle<()> {
    let period = (idle / 2).max(Duration::from_millis(50));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if pool.is_closed() {
                break;
            }
            let before = pool.status().size;
            let _ = pool.retain(|_, metrics| metrics.last_used() < idle);
            let after = pool.status().size;
            if after < before {
                tracing::debug!(closed = before - after, "closed idle connections");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "native-tls"))]
    #[test]
    fn ssl_without_tls_support_is_refused() {
        let cfg = ConnectionConfig::new()
            .with_host("localhost")
            .with_username("postgres")
            .with_ssl(true);
        let Err(err) = build_pool(&cfg) else {
            panic!("ssl without a TLS connector should be refused");
        };
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn pool_honours_max_size() {
        let cfg = ConnectionConfig::new()
            .with_host("localhost")
            .with_username("postgres")
            .with_pool_size(3);
        let pool = build_pool(&cfg).unwrap();
        let status = PoolStatus::of(&pool);
        assert_eq!(status.max_size, 3);
        assert_eq!(status.size, 0);
    }
}
