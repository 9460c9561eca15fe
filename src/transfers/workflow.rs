//! Transfer operations over an in-memory `TransferDetails`.
//!
//! Each operation validates everything first, then mutates the details
//! (and the loaded stock batches), recomputes the aggregate status and
//! returns the `Effects` the persistence layer has to write. On error the
//! details and stock are left exactly as they were.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::allocator::{self, AllocationScope, BatchDelta, ReceiptLine};
use super::commands::{AllocationRequest, ApproveItem, DeliverItem, PrepareItem};
use super::context::OrgContext;
use super::error::TransferError;
use super::history::{clean_notes, HistoryAction, HistoryEntry};
use super::state_machine::{self, check_quantity, quantity_ceiling, ItemAction, Transition};
use super::status::{aggregate_status, is_settled, InProgressPolicy};
use crate::models::{
    ItemStatus, StockBatch, TransferDetails, TransferHistory, TransferItemBatch, TransferStatus,
};

/// A lot credited to a department on delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub organization_id: Uuid,
    pub department_id: Uuid,
    pub product_id: Uuid,
    pub line: ReceiptLine,
}

/// Writes produced by one operation.
#[derive(Debug, Default, Clone)]
pub struct Effects {
    pub changed_items: Vec<Uuid>,
    pub batch_deltas: Vec<BatchDelta>,
    pub new_allocations: Vec<TransferItemBatch>,
    /// Items whose allocation rows must be deleted.
    pub released_items: Vec<Uuid>,
    pub receipts: Vec<Receipt>,
    pub history: Vec<TransferHistory>,
    pub status_change: Option<(TransferStatus, TransferStatus)>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Workflow {
    policy: InProgressPolicy,
}

impl Workflow {
    pub fn new(policy: InProgressPolicy) -> Self {
        Self { policy }
    }

    pub fn approve_item(
        &self,
        details: &mut TransferDetails,
        item_id: Uuid,
        input: &ApproveItem,
        ctx: &OrgContext,
        now: DateTime<Utc>,
    ) -> Result<Effects, TransferError> {
        ctx.ensure_owns(&details.transfer)?;
        let supplying = details.transfer.supplying_department_id;
        let transfer_id = details.transfer.id;
        let entry = details
            .item_mut(item_id)
            .ok_or(TransferError::NotFound("transfer item"))?;
        ctx.require_department(supplying, "approving an item")?;

        let transition = state_machine::approve(&mut entry.item, input.approved_quantity, now)?;

        let mut effects = Effects::default();
        effects.changed_items.push(item_id);
        effects.history.push(item_entry(
            transfer_id,
            item_id,
            HistoryAction::ItemApproved,
            transition,
            clean_notes(input.notes.as_deref()),
            ctx,
            now,
        ));
        self.settle(details, &mut effects, now);
        Ok(effects)
    }

    /// `stock` must hold the batches the allocation may draw from: the
    /// requested ids for a manual allocation, the supplying department's
    /// batches of the item's product for FEFO.
    pub fn prepare_item(
        &self,
        details: &mut TransferDetails,
        item_id: Uuid,
        input: &PrepareItem,
        stock: &mut [StockBatch],
        ctx: &OrgContext,
        now: DateTime<Utc>,
    ) -> Result<Effects, TransferError> {
        ctx.ensure_owns(&details.transfer)?;
        let supplying = details.transfer.supplying_department_id;
        let transfer_id = details.transfer.id;
        let entry = details
            .item_mut(item_id)
            .ok_or(TransferError::NotFound("transfer item"))?;
        ctx.require_department(supplying, "preparing an item")?;

        ItemAction::Prepare.guard(&entry.item)?;
        check_quantity(
            "prepared_quantity",
            input.prepared_quantity,
            quantity_ceiling(ItemAction::Prepare, &entry.item),
        )?;

        let scope = AllocationScope {
            organization_id: ctx.organization_id,
            department_id: supplying,
            product_id: entry.item.product_id,
        };
        let plan = match &input.allocation {
            AllocationRequest::Manual { batches } => {
                allocator::validate_explicit(input.prepared_quantity, batches, stock, scope)?
            }
            AllocationRequest::Fefo {} => {
                allocator::allocate_fefo(input.prepared_quantity, stock, scope, now.date_naive())?
            }
        };
        let deltas = allocator::draw(&plan);
        allocator::apply_deltas(stock, &deltas)?;

        let transition = state_machine::prepare(&mut entry.item, input.prepared_quantity, now)?;
        let rows: Vec<TransferItemBatch> = plan
            .into_iter()
            .map(|allocation| allocation.into_item_batch(item_id, now))
            .collect();
        entry.batches = rows.clone();

        let mut effects = Effects {
            changed_items: vec![item_id],
            batch_deltas: deltas,
            new_allocations: rows,
            ..Effects::default()
        };
        effects.history.push(item_entry(
            transfer_id,
            item_id,
            HistoryAction::ItemPrepared,
            transition,
            clean_notes(input.notes.as_deref()),
            ctx,
            now,
        ));
        self.settle(details, &mut effects, now);
        Ok(effects)
    }

    /// Marks the item received and credits the received quantity to the
    /// requesting department, lot by lot.
    pub fn deliver_item(
        &self,
        details: &mut TransferDetails,
        item_id: Uuid,
        input: &DeliverItem,
        ctx: &OrgContext,
        now: DateTime<Utc>,
    ) -> Result<Effects, TransferError> {
        ctx.ensure_owns(&details.transfer)?;
        let requesting = details.transfer.requesting_department_id;
        let transfer_id = details.transfer.id;
        let entry = details
            .item_mut(item_id)
            .ok_or(TransferError::NotFound("transfer item"))?;
        ctx.require_department(requesting, "receiving an item")?;

        let transition = state_machine::deliver(&mut entry.item, input.received_quantity, now)?;
        let receipts = allocator::plan_receipt(&entry.batches, input.received_quantity)
            .into_iter()
            .map(|line| Receipt {
                organization_id: ctx.organization_id,
                department_id: requesting,
                product_id: entry.item.product_id,
                line,
            })
            .collect();

        let mut effects = Effects {
            changed_items: vec![item_id],
            receipts,
            ..Effects::default()
        };
        effects.history.push(item_entry(
            transfer_id,
            item_id,
            HistoryAction::ItemDelivered,
            transition,
            clean_notes(input.notes.as_deref()),
            ctx,
            now,
        ));
        self.settle(details, &mut effects, now);
        Ok(effects)
    }

    /// `stock` must hold every batch the item drew from when it is PREPARED.
    pub fn cancel_item(
        &self,
        details: &mut TransferDetails,
        item_id: Uuid,
        reason: &str,
        stock: &mut [StockBatch],
        ctx: &OrgContext,
        now: DateTime<Utc>,
    ) -> Result<Effects, TransferError> {
        ctx.ensure_owns(&details.transfer)?;
        let departments = [
            details.transfer.requesting_department_id,
            details.transfer.supplying_department_id,
        ];
        let transfer_id = details.transfer.id;
        let entry = details
            .item_mut(item_id)
            .ok_or(TransferError::NotFound("transfer item"))?;
        ctx.require_any_department(&departments, "cancelling an item")?;
        ItemAction::Cancel.guard(&entry.item)?;
        let reason = cancel_reason(reason)?;

        let deltas = allocator::release(&entry.batches);
        allocator::apply_deltas(stock, &deltas)?;

        let transition = state_machine::cancel(&mut entry.item, reason.clone(), now)?;
        let released = !entry.batches.is_empty();
        entry.batches.clear();

        let mut effects = Effects {
            changed_items: vec![item_id],
            batch_deltas: deltas,
            released_items: if released { vec![item_id] } else { Vec::new() },
            ..Effects::default()
        };
        effects.history.push(item_entry(
            transfer_id,
            item_id,
            HistoryAction::ItemCancelled,
            transition,
            reason,
            ctx,
            now,
        ));
        self.settle(details, &mut effects, now);
        Ok(effects)
    }

    /// Cancels every active item and the transfer itself. Refused once any
    /// item has been delivered or when nothing is left to cancel.
    pub fn cancel_transfer(
        &self,
        details: &mut TransferDetails,
        reason: &str,
        stock: &mut [StockBatch],
        ctx: &OrgContext,
        now: DateTime<Utc>,
    ) -> Result<Effects, TransferError> {
        ctx.ensure_owns(&details.transfer)?;
        ctx.require_admin("cancelling a transfer")?;

        let statuses: Vec<ItemStatus> = details.item_statuses().collect();
        if statuses.contains(&ItemStatus::Delivered) || is_settled(statuses.iter().copied()) {
            return Err(TransferError::InvalidTransition {
                action: "cancel the transfer of",
                from: details.transfer.status.as_str(),
            });
        }
        let reason = cancel_reason(reason)?;

        let mut deltas = Vec::new();
        for entry in details.items.iter().filter(|entry| !entry.item.status.is_terminal()) {
            deltas.extend(allocator::release(&entry.batches));
        }
        allocator::apply_deltas(stock, &deltas)?;

        let transfer_id = details.transfer.id;
        let mut effects = Effects {
            batch_deltas: deltas,
            ..Effects::default()
        };
        for entry in details.items.iter_mut().filter(|entry| !entry.item.status.is_terminal()) {
            let item_id = entry.item.id;
            let transition = state_machine::cancel(&mut entry.item, reason.clone(), now)?;
            if !entry.batches.is_empty() {
                entry.batches.clear();
                effects.released_items.push(item_id);
            }
            effects.changed_items.push(item_id);
            effects.history.push(item_entry(
                transfer_id,
                item_id,
                HistoryAction::ItemCancelled,
                transition,
                reason.clone(),
                ctx,
                now,
            ));
        }

        let from = details.transfer.status;
        details.transfer.cancel_reason = reason.clone();
        effects.history.push(
            HistoryEntry {
                transfer_id,
                item_id: None,
                action: HistoryAction::TransferCancelled,
                from_status: Some(from.as_str()),
                to_status: TransferStatus::Cancelled.as_str(),
                notes: reason,
            }
            .record(&ctx.actor.snapshot(), now),
        );
        self.settle(details, &mut effects, now);
        Ok(effects)
    }

    /// Recomputes the aggregate status, stamps first-reached phase
    /// timestamps and appends the operation's history to the details.
    fn settle(&self, details: &mut TransferDetails, effects: &mut Effects, now: DateTime<Utc>) {
        let before = details.transfer.status;
        let after = aggregate_status(details.item_statuses(), self.policy);
        let settled = is_settled(details.item_statuses());

        let transfer = &mut details.transfer;
        transfer.status = after;
        transfer.updated_at = now;
        match after {
            TransferStatus::Approved => {
                transfer.approved_at.get_or_insert(now);
            }
            TransferStatus::Prepared => {
                transfer.approved_at.get_or_insert(now);
                transfer.prepared_at.get_or_insert(now);
            }
            TransferStatus::Completed => {
                transfer.delivered_at.get_or_insert(now);
            }
            TransferStatus::Partial if settled => {
                transfer.delivered_at.get_or_insert(now);
            }
            TransferStatus::Cancelled => {
                transfer.cancelled_at.get_or_insert(now);
            }
            TransferStatus::Pending | TransferStatus::Partial => {}
        }

        if before != after {
            effects.status_change = Some((before, after));
        }
        details.history.extend(effects.history.iter().cloned());
    }
}

/// A cancellation must say why; whitespace alone does not count.
fn cancel_reason(reason: &str) -> Result<Option<String>, TransferError> {
    match clean_notes(Some(reason)) {
        Some(reason) => Ok(Some(reason)),
        None => Err(TransferError::InvalidTransferRequest(
            "a cancellation reason is required".to_string(),
        )),
    }
}

fn item_entry(
    transfer_id: Uuid,
    item_id: Uuid,
    action: HistoryAction,
    transition: Transition,
    notes: Option<String>,
    ctx: &OrgContext,
    now: DateTime<Utc>,
) -> TransferHistory {
    HistoryEntry {
        transfer_id,
        item_id: Some(item_id),
        action,
        from_status: Some(transition.from.as_str()),
        to_status: transition.to.as_str(),
        notes,
    }
    .record(&ctx.actor.snapshot(), now)
}
