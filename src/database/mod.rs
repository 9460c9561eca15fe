pub mod audit;
pub mod members;
pub mod stock;
pub mod transfers;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};

use crate::config::AppConfig;

pub type Database = Pool<Postgres>;

pub async fn create_database_pool(config: &AppConfig) -> Result<Database, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;

    // Test the connection
    sqlx::query("SELECT 1")
        .fetch_one(&pool)
        .await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await?;

    log::info!("Connected to database and applied migrations");
    Ok(pool)
}

/// Unique-key violations surface as 409 instead of 500.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}
