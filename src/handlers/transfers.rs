use axum::{
    extract::{rejection::{JsonRejection, QueryRejection}, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde::Deserialize;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    database::transfers::TransferFilter,
    error::ApiError,
    handlers::AppState,
    middleware::get_current_user,
    models::{Transfer, TransferDetails, TransferItemDetails, TransferStatus},
    transfers::{ApproveItem, CancelRequest, DeliverItem, NewTransfer, PrepareItem},
};

type JsonBody<T> = Result<Json<T>, JsonRejection>;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<TransferStatus>,
    pub department_id: Option<Uuid>,
}

pub async fn create_transfer(
    cookies: Cookies,
    headers: HeaderMap,
    State(state): State<AppState>,
    payload: JsonBody<NewTransfer>,
) -> Result<(StatusCode, Json<TransferDetails>), ApiError> {
    let current_user = get_current_user(&cookies, &headers, &state).await?;
    let Json(input) = payload?;

    let details = state
        .service
        .create_transfer(&current_user.org_context(), &input)
        .await?;

    Ok((StatusCode::CREATED, Json(details)))
}

pub async fn list_transfers(
    cookies: Cookies,
    headers: HeaderMap,
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<Transfer>>, ApiError> {
    let current_user = get_current_user(&cookies, &headers, &state).await?;
    let Query(params) = params.map_err(|rejection| {
        ApiError::new(StatusCode::BAD_REQUEST, "InvalidQuery", rejection.body_text())
    })?;

    let filter = TransferFilter {
        status: params.status,
        department_id: params.department_id,
        visible_departments: None,
    };
    let transfers = state
        .service
        .list_transfers(&current_user.org_context(), filter)
        .await?;

    Ok(Json(transfers))
}

pub async fn get_transfer(
    cookies: Cookies,
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(transfer_id): Path<Uuid>,
) -> Result<Json<TransferDetails>, ApiError> {
    let current_user = get_current_user(&cookies, &headers, &state).await?;

    let details = state
        .service
        .get_transfer_with_details(&current_user.org_context(), transfer_id)
        .await?;

    Ok(Json(details))
}

pub async fn cancel_transfer(
    cookies: Cookies,
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(transfer_id): Path<Uuid>,
    payload: JsonBody<CancelRequest>,
) -> Result<Json<TransferDetails>, ApiError> {
    let current_user = get_current_user(&cookies, &headers, &state).await?;
    let Json(input) = payload?;

    let details = state
        .service
        .cancel_transfer(&current_user.org_context(), transfer_id, &input)
        .await?;

    Ok(Json(details))
}

pub async fn approve_item(
    cookies: Cookies,
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    payload: JsonBody<ApproveItem>,
) -> Result<Json<TransferItemDetails>, ApiError> {
    let current_user = get_current_user(&cookies, &headers, &state).await?;
    let Json(input) = payload?;

    let item = state
        .service
        .approve_item(&current_user.org_context(), item_id, &input)
        .await?;

    Ok(Json(item))
}

pub async fn prepare_item(
    cookies: Cookies,
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    payload: JsonBody<PrepareItem>,
) -> Result<Json<TransferItemDetails>, ApiError> {
    let current_user = get_current_user(&cookies, &headers, &state).await?;
    let Json(input) = payload?;

    let item = state
        .service
        .prepare_item(&current_user.org_context(), item_id, &input)
        .await?;

    Ok(Json(item))
}

pub async fn deliver_item(
    cookies: Cookies,
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    payload: JsonBody<DeliverItem>,
) -> Result<Json<TransferItemDetails>, ApiError> {
    let current_user = get_current_user(&cookies, &headers, &state).await?;
    let Json(input) = payload?;

    let item = state
        .service
        .deliver_item(&current_user.org_context(), item_id, &input)
        .await?;

    Ok(Json(item))
}

pub async fn cancel_item(
    cookies: Cookies,
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    payload: JsonBody<CancelRequest>,
) -> Result<Json<TransferItemDetails>, ApiError> {
    let current_user = get_current_user(&cookies, &headers, &state).await?;
    let Json(input) = payload?;

    let item = state
        .service
        .cancel_item(&current_user.org_context(), item_id, &input)
        .await?;

    Ok(Json(item))
}
