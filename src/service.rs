//! Runs workflow operations against Postgres. Every mutating call is one
//! transaction: lock the transfer, load it, lock the batches it may touch,
//! let the engine decide, then write the resulting effects and an audit row.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::database::transfers::TransferFilter;
use crate::database::{audit, stock, transfers, Database};
use crate::models::{
    AuditEvent, Department, StockBatch, Transfer, TransferDetails, TransferItemDetails,
};
use crate::transfers::code::{self, MAX_CODE_ATTEMPTS};
use crate::transfers::history::HistoryAction;
use crate::transfers::{
    builder, AllocationRequest, ApproveItem, CancelRequest, DeliverItem, Effects, InProgressPolicy,
    NewTransfer, OrgContext, PrepareItem, Receipt, TransferError, Workflow,
};

#[derive(Clone)]
pub struct TransferService {
    db: Database,
    workflow: Workflow,
}

impl TransferService {
    pub fn new(db: Database, policy: InProgressPolicy) -> Self {
        Self {
            db,
            workflow: Workflow::new(policy),
        }
    }

    pub async fn create_transfer(
        &self,
        ctx: &OrgContext,
        input: &NewTransfer,
    ) -> Result<TransferDetails, TransferError> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let department_ids = [input.requesting_department_id, input.supplying_department_id];
        let departments =
            stock::departments_by_ids(&mut tx, ctx.organization_id, &department_ids).await?;
        let product_ids: Vec<Uuid> = input.items.iter().map(|line| line.product_id).collect();
        let products = stock::products_by_ids(&mut tx, ctx.organization_id, &product_ids).await?;

        let code = next_code(&mut tx, ctx.organization_id, now).await?;
        let details = builder::build_transfer(input, code, ctx, &departments, &products, now)?;

        transfers::insert_transfer(&mut tx, &details).await?;
        audit::record(
            &mut tx,
            &AuditEvent {
                organization_id: ctx.organization_id,
                user_id: ctx.actor.user_id,
                action: HistoryAction::TransferCreated.as_str(),
                resource_type: "transfer",
                resource_id: details.transfer.id,
                old_values: None,
                new_values: Some(json!({
                    "code": details.transfer.code,
                    "status": details.transfer.status,
                    "items": details.items.len(),
                })),
            },
        )
        .await?;
        tx.commit().await?;

        log::info!(
            "transfer {} created by {} with {} item(s)",
            details.transfer.code,
            ctx.actor.user_id,
            details.items.len()
        );
        Ok(details)
    }

    pub async fn approve_item(
        &self,
        ctx: &OrgContext,
        item_id: Uuid,
        input: &ApproveItem,
    ) -> Result<TransferItemDetails, TransferError> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let mut details = lock_item_transfer(&mut tx, ctx, item_id).await?;

        let effects = self.workflow.approve_item(&mut details, item_id, input, ctx, now)?;
        let action = HistoryAction::ItemApproved;
        self.commit_item_change(tx, ctx, &details, item_id, &effects, action, now)
            .await
    }

    pub async fn prepare_item(
        &self,
        ctx: &OrgContext,
        item_id: Uuid,
        input: &PrepareItem,
    ) -> Result<TransferItemDetails, TransferError> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let mut details = lock_item_transfer(&mut tx, ctx, item_id).await?;

        let product_id = details
            .item(item_id)
            .map(|entry| entry.item.product_id)
            .ok_or(TransferError::NotFound("transfer item"))?;
        let mut batches = match &input.allocation {
            AllocationRequest::Manual { .. } => {
                let ids = input.allocation.batch_ids();
                stock::lock_batches(&mut tx, ctx.organization_id, &ids).await?
            }
            AllocationRequest::Fefo {} => {
                stock::lock_department_batches(
                    &mut tx,
                    ctx.organization_id,
                    details.transfer.supplying_department_id,
                    product_id,
                )
                .await?
            }
        };

        let effects = self
            .workflow
            .prepare_item(&mut details, item_id, input, &mut batches, ctx, now)?;
        let action = HistoryAction::ItemPrepared;
        self.commit_item_change(tx, ctx, &details, item_id, &effects, action, now)
            .await
    }

    pub async fn deliver_item(
        &self,
        ctx: &OrgContext,
        item_id: Uuid,
        input: &DeliverItem,
    ) -> Result<TransferItemDetails, TransferError> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let mut details = lock_item_transfer(&mut tx, ctx, item_id).await?;

        let effects = self.workflow.deliver_item(&mut details, item_id, input, ctx, now)?;
        let action = HistoryAction::ItemDelivered;
        self.commit_item_change(tx, ctx, &details, item_id, &effects, action, now)
            .await
    }

    pub async fn cancel_item(
        &self,
        ctx: &OrgContext,
        item_id: Uuid,
        input: &CancelRequest,
    ) -> Result<TransferItemDetails, TransferError> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let mut details = lock_item_transfer(&mut tx, ctx, item_id).await?;

        let batch_ids: Vec<Uuid> = details
            .item(item_id)
            .map(|entry| entry.batches.iter().map(|batch| batch.batch_id).collect())
            .unwrap_or_default();
        let mut batches = lock_allocated(&mut tx, ctx, batch_ids).await?;

        let effects = self.workflow.cancel_item(
            &mut details,
            item_id,
            &input.reason,
            &mut batches,
            ctx,
            now,
        )?;
        let action = HistoryAction::ItemCancelled;
        self.commit_item_change(tx, ctx, &details, item_id, &effects, action, now)
            .await
    }

    pub async fn cancel_transfer(
        &self,
        ctx: &OrgContext,
        transfer_id: Uuid,
        input: &CancelRequest,
    ) -> Result<TransferDetails, TransferError> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let transfer = transfers::lock_transfer(&mut tx, ctx.organization_id, transfer_id)
            .await?
            .ok_or(TransferError::NotFound("transfer"))?;
        let mut details = transfers::load_details(&mut tx, transfer).await?;

        let batch_ids: Vec<Uuid> = details
            .items
            .iter()
            .filter(|entry| !entry.item.status.is_terminal())
            .flat_map(|entry| entry.batches.iter().map(|batch| batch.batch_id))
            .collect();
        let mut batches = lock_allocated(&mut tx, ctx, batch_ids).await?;

        let from = details.transfer.status;
        let effects = self
            .workflow
            .cancel_transfer(&mut details, &input.reason, &mut batches, ctx, now)?;
        persist_effects(&mut tx, &details, &effects, now).await?;
        audit::record(
            &mut tx,
            &AuditEvent {
                organization_id: ctx.organization_id,
                user_id: ctx.actor.user_id,
                action: HistoryAction::TransferCancelled.as_str(),
                resource_type: "transfer",
                resource_id: transfer_id,
                old_values: Some(json!({ "status": from })),
                new_values: Some(json!({
                    "status": details.transfer.status,
                    "reason": details.transfer.cancel_reason,
                    "cancelled_items": effects.changed_items,
                })),
            },
        )
        .await?;
        tx.commit().await?;

        log::info!(
            "transfer {} cancelled by {} ({} item(s))",
            details.transfer.code,
            ctx.actor.user_id,
            effects.changed_items.len()
        );
        Ok(details)
    }

    pub async fn get_transfer_with_details(
        &self,
        ctx: &OrgContext,
        transfer_id: Uuid,
    ) -> Result<TransferDetails, TransferError> {
        let mut conn = self.db.acquire().await?;
        let transfer = transfers::find_transfer(&mut conn, ctx.organization_id, transfer_id)
            .await?
            .ok_or(TransferError::NotFound("transfer"))?;
        if !ctx.can_view(&transfer) {
            return Err(TransferError::NotFound("transfer"));
        }
        Ok(transfers::load_details(&mut conn, transfer).await?)
    }

    /// MEMBERs only see transfers touching one of their departments.
    pub async fn list_transfers(
        &self,
        ctx: &OrgContext,
        mut filter: TransferFilter,
    ) -> Result<Vec<Transfer>, TransferError> {
        if !ctx.actor.role.is_admin() {
            filter.visible_departments = Some(ctx.actor.department_ids.clone());
        }
        let mut conn = self.db.acquire().await?;
        Ok(transfers::list_transfers(&mut conn, ctx.organization_id, &filter).await?)
    }

    pub async fn list_departments(
        &self,
        ctx: &OrgContext,
    ) -> Result<Vec<Department>, TransferError> {
        let mut conn = self.db.acquire().await?;
        Ok(stock::list_departments(&mut conn, ctx.organization_id).await?)
    }

    pub async fn department_batches(
        &self,
        ctx: &OrgContext,
        department_id: Uuid,
        product_id: Option<Uuid>,
    ) -> Result<Vec<StockBatch>, TransferError> {
        let mut conn = self.db.acquire().await?;
        let department =
            stock::departments_by_ids(&mut conn, ctx.organization_id, &[department_id]).await?;
        if department.is_empty() {
            return Err(TransferError::NotFound("department"));
        }
        let batches =
            stock::department_batches(&mut conn, ctx.organization_id, department_id, product_id)
                .await?;
        Ok(batches)
    }

    #[allow(clippy::too_many_arguments)]
    async fn commit_item_change(
        &self,
        mut tx: sqlx::Transaction<'_, sqlx::Postgres>,
        ctx: &OrgContext,
        details: &TransferDetails,
        item_id: Uuid,
        effects: &Effects,
        action: HistoryAction,
        now: DateTime<Utc>,
    ) -> Result<TransferItemDetails, TransferError> {
        persist_effects(&mut tx, details, effects, now).await?;

        let entry = details
            .item(item_id)
            .cloned()
            .ok_or(TransferError::NotFound("transfer item"))?;
        let from = effects
            .history
            .iter()
            .find(|row| row.transfer_item_id == Some(item_id))
            .and_then(|row| row.from_status.clone());

        audit::record(
            &mut tx,
            &AuditEvent {
                organization_id: ctx.organization_id,
                user_id: ctx.actor.user_id,
                action: action.as_str(),
                resource_type: "transfer_item",
                resource_id: item_id,
                old_values: Some(json!({ "status": from })),
                new_values: Some(json!({
                    "status": entry.item.status,
                    "approved_quantity": entry.item.approved_quantity,
                    "prepared_quantity": entry.item.prepared_quantity,
                    "received_quantity": entry.item.received_quantity,
                    "transfer_status": details.transfer.status,
                })),
            },
        )
        .await?;
        tx.commit().await?;

        log::info!(
            "transfer {} item {} {} -> {} (transfer {})",
            details.transfer.code,
            item_id,
            action.as_str(),
            entry.item.status.as_str(),
            details.transfer.status.as_str()
        );
        Ok(entry)
    }
}

/// Locks and loads the transfer owning `item_id`.
async fn lock_item_transfer(
    conn: &mut PgConnection,
    ctx: &OrgContext,
    item_id: Uuid,
) -> Result<TransferDetails, TransferError> {
    let transfer_id = transfers::transfer_id_for_item(conn, ctx.organization_id, item_id)
        .await?
        .ok_or(TransferError::NotFound("transfer item"))?;
    let transfer = transfers::lock_transfer(conn, ctx.organization_id, transfer_id)
        .await?
        .ok_or(TransferError::NotFound("transfer"))?;
    Ok(transfers::load_details(conn, transfer).await?)
}

async fn lock_allocated(
    conn: &mut PgConnection,
    ctx: &OrgContext,
    mut batch_ids: Vec<Uuid>,
) -> Result<Vec<StockBatch>, TransferError> {
    if batch_ids.is_empty() {
        return Ok(Vec::new());
    }
    batch_ids.sort();
    batch_ids.dedup();
    Ok(stock::lock_batches(conn, ctx.organization_id, &batch_ids).await?)
}

/// First free code of the day, counting up from the highest one issued.
async fn next_code(
    conn: &mut PgConnection,
    organization_id: Uuid,
    now: DateTime<Utc>,
) -> Result<String, TransferError> {
    let today = now.date_naive();
    let prefix = code::day_prefix(today);
    let existing = transfers::codes_with_prefix(conn, organization_id, &prefix).await?;

    let mut last = None;
    let candidates = code::candidates(today, existing.iter().map(String::as_str));
    for candidate in candidates.take(MAX_CODE_ATTEMPTS) {
        if !transfers::code_exists(conn, organization_id, &candidate).await? {
            return Ok(candidate);
        }
        last = Some(candidate);
    }

    // Every candidate was taken; the insert reports the conflict.
    log::warn!(
        "no free transfer code after {MAX_CODE_ATTEMPTS} attempts for organization {organization_id}"
    );
    last.ok_or(TransferError::InvalidTransferRequest(
        "unable to allocate a transfer code".to_string(),
    ))
}

async fn persist_effects(
    conn: &mut PgConnection,
    details: &TransferDetails,
    effects: &Effects,
    now: DateTime<Utc>,
) -> Result<(), TransferError> {
    for item_id in &effects.changed_items {
        if let Some(entry) = details.item(*item_id) {
            transfers::update_item(conn, &entry.item).await?;
        }
    }
    for item_id in &effects.released_items {
        transfers::delete_allocations(conn, *item_id).await?;
    }
    for delta in &effects.batch_deltas {
        stock::apply_delta(conn, delta, now).await?;
    }
    for allocation in &effects.new_allocations {
        transfers::insert_allocation(conn, allocation).await?;
    }
    receive_all(conn, &effects.receipts, now).await?;
    transfers::update_transfer(conn, &details.transfer).await?;
    for entry in &effects.history {
        transfers::insert_history(conn, entry).await?;
    }
    Ok(())
}

/// Credits receipts in a fixed order. The receiving department's existing
/// lots are locked in id order first, the same order a prepare drawing from
/// that department takes them.
async fn receive_all(
    conn: &mut PgConnection,
    receipts: &[Receipt],
    now: DateTime<Utc>,
) -> Result<(), TransferError> {
    let mut ordered: Vec<&Receipt> = receipts.iter().collect();
    ordered.sort_by(|a, b| receipt_key(a).cmp(&receipt_key(b)));

    let mut locked: Vec<(Uuid, Uuid)> = Vec::new();
    for receipt in &ordered {
        let key = (receipt.department_id, receipt.product_id);
        if !locked.contains(&key) {
            stock::lock_department_batches(conn, receipt.organization_id, key.0, key.1).await?;
            locked.push(key);
        }
    }
    for receipt in ordered {
        stock::receive(conn, receipt, now).await?;
    }
    Ok(())
}

fn receipt_key(receipt: &Receipt) -> (Uuid, Uuid, &str, Option<NaiveDate>) {
    (
        receipt.department_id,
        receipt.product_id,
        receipt.line.lot_number.as_str(),
        receipt.line.expiry_date,
    )
}
