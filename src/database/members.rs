use sqlx::PgConnection;
use uuid::Uuid;

use crate::models::{MemberRole, User};

pub async fn find_active_user(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND is_active = true")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn membership_role(
    conn: &mut PgConnection,
    organization_id: Uuid,
    user_id: Uuid,
) -> Result<Option<MemberRole>, sqlx::Error> {
    sqlx::query_scalar::<_, MemberRole>(
        "SELECT role FROM organization_members WHERE organization_id = $1 AND user_id = $2"
    )
    .bind(organization_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await
}

/// Departments of one organization the user is staff of.
pub async fn department_ids(
    conn: &mut PgConnection,
    organization_id: Uuid,
    user_id: Uuid,
) -> Result<Vec<Uuid>, sqlx::Error> {
    sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT dm.department_id
        FROM department_members dm
        JOIN departments d ON d.id = dm.department_id
        WHERE d.organization_id = $1 AND dm.user_id = $2
        ORDER BY dm.department_id
        "#,
    )
    .bind(organization_id)
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await
}
