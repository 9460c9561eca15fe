use sqlx::{PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::{
    Transfer, TransferDetails, TransferHistory, TransferItem, TransferItemBatch,
    TransferItemDetails, TransferStatus,
};

/// Locks the transfer row for the rest of the transaction. Every workflow
/// operation starts here, so operations on one transfer run one at a time.
pub async fn lock_transfer(
    conn: &mut PgConnection,
    organization_id: Uuid,
    transfer_id: Uuid,
) -> Result<Option<Transfer>, sqlx::Error> {
    sqlx::query_as::<_, Transfer>(
        "SELECT * FROM transfers WHERE id = $1 AND organization_id = $2 FOR UPDATE"
    )
    .bind(transfer_id)
    .bind(organization_id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn find_transfer(
    conn: &mut PgConnection,
    organization_id: Uuid,
    transfer_id: Uuid,
) -> Result<Option<Transfer>, sqlx::Error> {
    sqlx::query_as::<_, Transfer>(
        "SELECT * FROM transfers WHERE id = $1 AND organization_id = $2"
    )
    .bind(transfer_id)
    .bind(organization_id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn transfer_id_for_item(
    conn: &mut PgConnection,
    organization_id: Uuid,
    item_id: Uuid,
) -> Result<Option<Uuid>, sqlx::Error> {
    sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT t.id
        FROM transfer_items i
        JOIN transfers t ON t.id = i.transfer_id
        WHERE i.id = $1 AND t.organization_id = $2
        "#,
    )
    .bind(item_id)
    .bind(organization_id)
    .fetch_optional(&mut *conn)
    .await
}

/// Items in line order with their allocations, history in write order.
pub async fn load_details(
    conn: &mut PgConnection,
    transfer: Transfer,
) -> Result<TransferDetails, sqlx::Error> {
    let items = sqlx::query_as::<_, TransferItem>(
        "SELECT * FROM transfer_items WHERE transfer_id = $1 ORDER BY line_number"
    )
    .bind(transfer.id)
    .fetch_all(&mut *conn)
    .await?;

    let item_ids: Vec<Uuid> = items.iter().map(|item| item.id).collect();
    let allocations = sqlx::query_as::<_, TransferItemBatch>(
        "SELECT * FROM transfer_item_batches WHERE transfer_item_id = ANY($1) ORDER BY created_at, id"
    )
    .bind(&item_ids)
    .fetch_all(&mut *conn)
    .await?;

    let history = sqlx::query_as::<_, TransferHistory>(
        "SELECT * FROM transfer_history WHERE transfer_id = $1 ORDER BY seq"
    )
    .bind(transfer.id)
    .fetch_all(&mut *conn)
    .await?;

    let items = items
        .into_iter()
        .map(|item| {
            let batches = allocations
                .iter()
                .filter(|allocation| allocation.transfer_item_id == item.id)
                .cloned()
                .collect();
            TransferItemDetails { item, batches }
        })
        .collect();

    Ok(TransferDetails {
        transfer,
        items,
        history,
    })
}

pub async fn codes_with_prefix(
    conn: &mut PgConnection,
    organization_id: Uuid,
    prefix: &str,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT code FROM transfers WHERE organization_id = $1 AND code LIKE $2"
    )
    .bind(organization_id)
    .bind(format!("{prefix}%"))
    .fetch_all(&mut *conn)
    .await
}

pub async fn code_exists(
    conn: &mut PgConnection,
    organization_id: Uuid,
    code: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM transfers WHERE organization_id = $1 AND code = $2)"
    )
    .bind(organization_id)
    .bind(code)
    .fetch_one(&mut *conn)
    .await
}

/// Writes a freshly built transfer: the transfer row, every item and the
/// initial history.
pub async fn insert_transfer(
    conn: &mut PgConnection,
    details: &TransferDetails,
) -> Result<(), sqlx::Error> {
    let transfer = &details.transfer;
    sqlx::query(
        r#"
        INSERT INTO transfers (
            id, code, title, organization_id, requesting_department_id, supplying_department_id,
            status, priority, reason, notes, requested_at, requested_by_id, requested_by_name,
            requested_by_email, requested_by_role, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
        "#,
    )
    .bind(transfer.id)
    .bind(&transfer.code)
    .bind(&transfer.title)
    .bind(transfer.organization_id)
    .bind(transfer.requesting_department_id)
    .bind(transfer.supplying_department_id)
    .bind(transfer.status)
    .bind(transfer.priority)
    .bind(&transfer.reason)
    .bind(&transfer.notes)
    .bind(transfer.requested_at)
    .bind(transfer.requested_by_id)
    .bind(&transfer.requested_by_name)
    .bind(&transfer.requested_by_email)
    .bind(transfer.requested_by_role)
    .bind(transfer.created_at)
    .bind(transfer.updated_at)
    .execute(&mut *conn)
    .await?;

    for entry in &details.items {
        let item = &entry.item;
        sqlx::query(
            r#"
            INSERT INTO transfer_items (
                id, transfer_id, line_number, product_id, status, requested_quantity, notes,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(item.id)
        .bind(item.transfer_id)
        .bind(item.line_number)
        .bind(item.product_id)
        .bind(item.status)
        .bind(item.requested_quantity)
        .bind(&item.notes)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *conn)
        .await?;
    }

    for entry in &details.history {
        insert_history(conn, entry).await?;
    }

    Ok(())
}

pub async fn update_transfer(
    conn: &mut PgConnection,
    transfer: &Transfer,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE transfers
        SET status = $1, approved_at = $2, prepared_at = $3, delivered_at = $4,
            cancelled_at = $5, cancel_reason = $6, updated_at = $7
        WHERE id = $8
        "#,
    )
    .bind(transfer.status)
    .bind(transfer.approved_at)
    .bind(transfer.prepared_at)
    .bind(transfer.delivered_at)
    .bind(transfer.cancelled_at)
    .bind(&transfer.cancel_reason)
    .bind(transfer.updated_at)
    .bind(transfer.id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn update_item(conn: &mut PgConnection, item: &TransferItem) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE transfer_items
        SET status = $1, approved_quantity = $2, prepared_quantity = $3, received_quantity = $4,
            cancel_reason = $5, approved_at = $6, prepared_at = $7, delivered_at = $8,
            cancelled_at = $9, updated_at = $10
        WHERE id = $11
        "#,
    )
    .bind(item.status)
    .bind(item.approved_quantity)
    .bind(item.prepared_quantity)
    .bind(item.received_quantity)
    .bind(&item.cancel_reason)
    .bind(item.approved_at)
    .bind(item.prepared_at)
    .bind(item.delivered_at)
    .bind(item.cancelled_at)
    .bind(item.updated_at)
    .bind(item.id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn insert_allocation(
    conn: &mut PgConnection,
    allocation: &TransferItemBatch,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO transfer_item_batches (id, transfer_item_id, batch_id, lot_number, expiry_date, quantity, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(allocation.id)
    .bind(allocation.transfer_item_id)
    .bind(allocation.batch_id)
    .bind(&allocation.lot_number)
    .bind(allocation.expiry_date)
    .bind(allocation.quantity)
    .bind(allocation.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn delete_allocations(conn: &mut PgConnection, item_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM transfer_item_batches WHERE transfer_item_id = $1")
        .bind(item_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// History is insert-only; nothing in this crate updates or deletes it.
pub async fn insert_history(
    conn: &mut PgConnection,
    entry: &TransferHistory,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO transfer_history (
            id, transfer_id, transfer_item_id, action, from_status, to_status,
            actor_id, actor_name, actor_email, actor_role, notes, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(entry.id)
    .bind(entry.transfer_id)
    .bind(entry.transfer_item_id)
    .bind(&entry.action)
    .bind(&entry.from_status)
    .bind(&entry.to_status)
    .bind(entry.actor.actor_id)
    .bind(&entry.actor.actor_name)
    .bind(&entry.actor.actor_email)
    .bind(entry.actor.actor_role)
    .bind(&entry.notes)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct TransferFilter {
    pub status: Option<TransferStatus>,
    pub department_id: Option<Uuid>,
    /// Restricts results to transfers touching one of these departments.
    pub visible_departments: Option<Vec<Uuid>>,
}

pub async fn list_transfers(
    conn: &mut PgConnection,
    organization_id: Uuid,
    filter: &TransferFilter,
) -> Result<Vec<Transfer>, sqlx::Error> {
    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT * FROM transfers WHERE organization_id = ");
    query_builder.push_bind(organization_id);

    if let Some(status) = filter.status {
        query_builder.push(" AND status = ").push_bind(status);
    }
    if let Some(department_id) = filter.department_id {
        query_builder
            .push(" AND (requesting_department_id = ")
            .push_bind(department_id)
            .push(" OR supplying_department_id = ")
            .push_bind(department_id)
            .push(")");
    }
    if let Some(departments) = &filter.visible_departments {
        query_builder
            .push(" AND (requesting_department_id = ANY(")
            .push_bind(departments.clone())
            .push(") OR supplying_department_id = ANY(")
            .push_bind(departments.clone())
            .push("))");
    }

    query_builder.push(" ORDER BY requested_at DESC");

    query_builder
        .build_query_as::<Transfer>()
        .fetch_all(&mut *conn)
        .await
}
