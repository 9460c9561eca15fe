use sqlx::types::Json;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::models::AuditEvent;

/// Writes an audit row inside the caller's transaction, so a rolled back
/// operation leaves no audit trace either.
pub async fn record(conn: &mut PgConnection, event: &AuditEvent) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, organization_id, user_id, action, resource_type, resource_id, old_values, new_values)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(event.organization_id)
    .bind(event.user_id)
    .bind(event.action)
    .bind(event.resource_type)
    .bind(event.resource_id)
    .bind(event.old_values.clone().map(Json))
    .bind(event.new_values.clone().map(Json))
    .execute(&mut *conn)
    .await?;

    Ok(())
}
