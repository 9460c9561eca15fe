pub mod api;
pub mod inventory;
pub mod transfers;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    database::Database,
    service::TransferService,
};

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<AppConfig>,
    pub service: TransferService,
}

impl AppState {
    pub fn new(db: Database, config: AppConfig) -> Self {
        let service = TransferService::new(db.clone(), config.status_policy);
        Self {
            db,
            config: Arc::new(config),
            service,
        }
    }
}
