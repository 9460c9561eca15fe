use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::models::{Department, Product, StockBatch};
use crate::transfers::allocator::BatchDelta;
use crate::transfers::{Receipt, TransferError};

pub async fn departments_by_ids(
    conn: &mut PgConnection,
    organization_id: Uuid,
    ids: &[Uuid],
) -> Result<Vec<Department>, sqlx::Error> {
    sqlx::query_as::<_, Department>(
        "SELECT * FROM departments WHERE organization_id = $1 AND id = ANY($2)"
    )
    .bind(organization_id)
    .bind(ids)
    .fetch_all(&mut *conn)
    .await
}

pub async fn products_by_ids(
    conn: &mut PgConnection,
    organization_id: Uuid,
    ids: &[Uuid],
) -> Result<Vec<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE organization_id = $1 AND id = ANY($2)"
    )
    .bind(organization_id)
    .bind(ids)
    .fetch_all(&mut *conn)
    .await
}

pub async fn list_departments(
    conn: &mut PgConnection,
    organization_id: Uuid,
) -> Result<Vec<Department>, sqlx::Error> {
    sqlx::query_as::<_, Department>(
        "SELECT * FROM departments WHERE organization_id = $1 AND is_active = true ORDER BY name"
    )
    .bind(organization_id)
    .fetch_all(&mut *conn)
    .await
}

/// Locks batches in id order so concurrent transactions always acquire
/// them in the same sequence.
pub async fn lock_batches(
    conn: &mut PgConnection,
    organization_id: Uuid,
    ids: &[Uuid],
) -> Result<Vec<StockBatch>, sqlx::Error> {
    sqlx::query_as::<_, StockBatch>(
        r#"
        SELECT * FROM stock_batches
        WHERE organization_id = $1 AND id = ANY($2)
        ORDER BY id
        FOR UPDATE
        "#,
    )
    .bind(organization_id)
    .bind(ids)
    .fetch_all(&mut *conn)
    .await
}

/// Every batch of a product a department holds, locked, for FEFO picking.
pub async fn lock_department_batches(
    conn: &mut PgConnection,
    organization_id: Uuid,
    department_id: Uuid,
    product_id: Uuid,
) -> Result<Vec<StockBatch>, sqlx::Error> {
    sqlx::query_as::<_, StockBatch>(
        r#"
        SELECT * FROM stock_batches
        WHERE organization_id = $1 AND department_id = $2 AND product_id = $3
        ORDER BY id
        FOR UPDATE
        "#,
    )
    .bind(organization_id)
    .bind(department_id)
    .bind(product_id)
    .fetch_all(&mut *conn)
    .await
}

/// Stock a department holds, soonest expiry first.
pub async fn department_batches(
    conn: &mut PgConnection,
    organization_id: Uuid,
    department_id: Uuid,
    product_id: Option<Uuid>,
) -> Result<Vec<StockBatch>, sqlx::Error> {
    sqlx::query_as::<_, StockBatch>(
        r#"
        SELECT * FROM stock_batches
        WHERE organization_id = $1
          AND department_id = $2
          AND ($3::uuid IS NULL OR product_id = $3)
          AND quantity_available > 0
        ORDER BY expiry_date ASC NULLS LAST, created_at, id
        "#,
    )
    .bind(organization_id)
    .bind(department_id)
    .bind(product_id)
    .fetch_all(&mut *conn)
    .await
}

/// Applies one signed change. The row guard makes a draw fail rather than
/// drive a batch negative, even if the in-memory check was stale.
pub async fn apply_delta(
    conn: &mut PgConnection,
    delta: &BatchDelta,
    now: DateTime<Utc>,
) -> Result<(), TransferError> {
    let result = sqlx::query(
        r#"
        UPDATE stock_batches
        SET quantity_available = quantity_available + $1, updated_at = $2
        WHERE id = $3 AND quantity_available + $1 >= 0
        "#,
    )
    .bind(delta.delta)
    .bind(now)
    .bind(delta.batch_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let available = sqlx::query_scalar::<_, i32>(
            "SELECT quantity_available FROM stock_batches WHERE id = $1"
        )
        .bind(delta.batch_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(TransferError::NotFound("stock batch"))?;

        return Err(TransferError::InsufficientBatchStock {
            batch_id: Some(delta.batch_id),
            requested: -i64::from(delta.delta),
            available: i64::from(available),
        });
    }

    Ok(())
}

/// Credits a received lot to the receiving department, topping up the
/// matching lot when it already holds one. The lot key index makes the
/// insert and the top-up a single statement.
pub async fn receive(
    conn: &mut PgConnection,
    receipt: &Receipt,
    now: DateTime<Utc>,
) -> Result<Uuid, sqlx::Error> {
    sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO stock_batches (
            id, organization_id, department_id, product_id, lot_number, expiry_date,
            quantity_available, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
        ON CONFLICT (
            organization_id, department_id, product_id, lot_number,
            (COALESCE(expiry_date, 'infinity'::date))
        )
        DO UPDATE SET
            quantity_available = stock_batches.quantity_available + EXCLUDED.quantity_available,
            updated_at = EXCLUDED.updated_at
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(receipt.organization_id)
    .bind(receipt.department_id)
    .bind(receipt.product_id)
    .bind(&receipt.line.lot_number)
    .bind(receipt.line.expiry_date)
    .bind(receipt.line.quantity)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
}
