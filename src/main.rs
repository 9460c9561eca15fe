use dotenvy::dotenv;

use medstock::{
    config::AppConfig,
    create_router,
    database::create_database_pool,
    handlers::AppState,
};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    env_logger::init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            log::error!("invalid configuration: {err}");
            std::process::exit(1);
        }
    };

    let db = match create_database_pool(&config).await {
        Ok(db) => db,
        Err(err) => {
            log::error!("failed to connect to database: {err}");
            std::process::exit(1);
        }
    };

    let addr = config.listen_addr();
    log::info!(
        "transfer status policy: {:?}, pool size: {}",
        config.status_policy,
        config.max_connections
    );

    // Build the application router
    let app = create_router(AppState::new(db, config));

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            log::error!("failed to bind {addr}: {err}");
            std::process::exit(1);
        }
    };

    log::info!("medstock server listening on http://{addr}");
    if let Err(err) = axum::serve(listener, app).await {
        log::error!("server error: {err}");
        std::process::exit(1);
    }
}
