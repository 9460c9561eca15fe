use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde::Deserialize;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    error::ApiError,
    handlers::AppState,
    middleware::get_current_user,
    models::StockBatch,
};

#[derive(Debug, Deserialize)]
pub struct BatchQuery {
    pub product_id: Option<Uuid>,
}

/// Stock a department holds, soonest expiry first.
pub async fn department_batches(
    cookies: Cookies,
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(department_id): Path<Uuid>,
    query: Result<Query<BatchQuery>, axum::extract::rejection::QueryRejection>,
) -> Result<Json<Vec<StockBatch>>, ApiError> {
    let current_user = get_current_user(&cookies, &headers, &state).await?;
    let Query(query) = query.map_err(|rejection| {
        ApiError::new(StatusCode::BAD_REQUEST, "InvalidQuery", rejection.body_text())
    })?;

    let batches = state
        .service
        .department_batches(&current_user.org_context(), department_id, query.product_id)
        .await?;

    Ok(Json(batches))
}
