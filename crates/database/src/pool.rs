use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use tracing::info;

/// Connection pool type alias
pub type DbPool = Pool;

fn pool_config(config: &config::DatabaseConfig) -> Config {
    let mut cfg = Config::new();
    cfg.host = Some(config.host.clone());
    cfg.port = Some(config.port);
    cfg.dbname = Some(config.database.clone());
    cfg.user = Some(config.username.clone());
    cfg.password = Some(config.password.clone());
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(PoolConfig::new(config.max_connections));
    cfg
}

/// Create a connection pool, with TLS when `tls_enabled` is set
pub async fn create_pool(config: &config::DatabaseConfig) -> anyhow::Result<DbPool> {
    info!(
        "Creating database pool host={} port={} database={} max_connections={} tls={}",
        config.host, config.port, config.database, config.max_connections, config.tls_enabled
    );

    let cfg = pool_config(config);

    let pool = if config.tls_enabled {
        create_pool_with_native_tls(cfg, config.tls_accept_invalid_certs)?
    } else {
        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| anyhow::anyhow!("Failed to create pool: {e}"))?
    };

    // Fail fast on bad credentials or an unreachable host
    let client = pool
        .get()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {e}"))?;
    client.simple_query("SELECT 1").await?;

    info!("Database pool ready");
    Ok(pool)
}

/// Create pool using native-tls (simpler for accepting self-signed certificates)
pub fn create_pool_with_native_tls(
    cfg: Config,
    accept_invalid_certs: bool,
) -> anyhow::Result<Pool> {
    use native_tls::TlsConnector;
    use postgres_native_tls::MakeTlsConnector;

    let mut builder = TlsConnector::builder();
    if accept_invalid_certs {
        info!("Configuring TLS to accept self-signed certificates");
        builder.danger_accept_invalid_certs(true);
    }

    let connector = builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create TLS connector: {e}"))?;
    let tls = MakeTlsConnector::new(connector);

    cfg.create_pool(Some(Runtime::Tokio1), tls)
        .map_err(|e| anyhow::anyhow!("Failed to create TLS pool: {e}"))
}
