use axum::{
    extract::State,
    http::HeaderMap,
    response::Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    error::ApiError,
    handlers::AppState,
    middleware::get_current_user,
    models::Department,
};

#[derive(Serialize)]
pub struct DepartmentResponse {
    pub id: Uuid,
    pub name: String,
    pub code: Option<String>,
}

impl From<Department> for DepartmentResponse {
    fn from(department: Department) -> Self {
        Self {
            id: department.id,
            name: department.name,
            code: department.code,
        }
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn list_departments(
    cookies: Cookies,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<DepartmentResponse>>, ApiError> {
    let current_user = get_current_user(&cookies, &headers, &state).await?;

    let departments = state
        .service
        .list_departments(&current_user.org_context())
        .await?
        .into_iter()
        .map(DepartmentResponse::from)
        .collect();

    Ok(Json(departments))
}
