use axum::http::{header, HeaderMap};
use serde::Serialize;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    database::members,
    error::ApiError,
    handlers::AppState,
    models::{MemberRole, User},
    transfers::{Actor, OrgContext},
    utils::verify_token,
};

pub const AUTH_COOKIE: &str = "auth_token";

/// The authenticated caller inside the organization named by their token.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub organization_id: Uuid,
    pub role: MemberRole,
    pub department_ids: Vec<Uuid>,
}

impl CurrentUser {
    pub fn from_membership(
        user: User,
        organization_id: Uuid,
        role: MemberRole,
        department_ids: Vec<Uuid>,
    ) -> Self {
        Self {
            name: user.full_name(),
            id: user.id,
            email: user.email,
            organization_id,
            role,
            department_ids,
        }
    }

    pub fn org_context(&self) -> OrgContext {
        OrgContext::new(
            self.organization_id,
            Actor {
                user_id: self.id,
                name: self.name.clone(),
                email: self.email.clone(),
                role: self.role,
                department_ids: self.department_ids.clone(),
            },
        )
    }
}

/// The session token from the `auth_token` cookie, or else a bearer token.
pub fn session_token(cookies: &Cookies, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = cookies.get(AUTH_COOKIE) {
        return Some(cookie.value().to_string());
    }
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

pub async fn get_current_user(
    cookies: &Cookies,
    headers: &HeaderMap,
    state: &AppState,
) -> Result<CurrentUser, ApiError> {
    let token = session_token(cookies, headers)
        .ok_or_else(|| ApiError::unauthorized("missing session token"))?;

    let claims = verify_token(&token, &state.config.jwt_secret).map_err(|err| {
        log::warn!("rejected session token: {err}");
        ApiError::unauthorized("invalid session token")
    })?;

    let ids = (Uuid::parse_str(&claims.sub), Uuid::parse_str(&claims.org));
    let (user_id, organization_id) = match ids {
        (Ok(user_id), Ok(organization_id)) => (user_id, organization_id),
        _ => {
            log::warn!("session token for {} carries malformed ids", claims.email);
            return Err(ApiError::unauthorized("invalid session token"));
        }
    };

    let mut conn = state.db.acquire().await?;
    let user = members::find_active_user(&mut conn, user_id)
        .await?
        .ok_or_else(|| {
            log::warn!("session token for unknown or inactive user {user_id}");
            ApiError::unauthorized("user is not active")
        })?;
    let role = members::membership_role(&mut conn, organization_id, user_id)
        .await?
        .ok_or_else(|| {
            log::warn!("user {user_id} is not a member of organization {organization_id}");
            ApiError::unauthorized("not a member of this organization")
        })?;
    let department_ids = members::department_ids(&mut conn, organization_id, user_id).await?;

    Ok(CurrentUser::from_membership(user, organization_id, role, department_ids))
}
