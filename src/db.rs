use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::{info, instrument};

#[instrument(skip(database_url))]
pub async fn init_db(database_url: &str) -> anyhow::Result<DatabaseConnection> {
    info!("configuring database pool");

    let mut options = ConnectOptions::new(database_url);
    options
        .max_connections(10)
        .min_connections(2)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(options).await?;
    info!("database connected");

    Ok(db)
}
