use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::commands::NewTransfer;
use super::context::OrgContext;
use super::error::TransferError;
use super::history::{clean_notes, HistoryAction, HistoryEntry};
use crate::models::{
    Department, ItemStatus, Product, Transfer, TransferDetails, TransferItem, TransferItemDetails,
    TransferStatus,
};

fn invalid(message: impl Into<String>) -> TransferError {
    TransferError::InvalidTransferRequest(message.into())
}

/// Builds a PENDING transfer with one PENDING item per input line and the
/// `transfer.created` history entry. `departments` and `products` are the
/// rows the caller found for the referenced ids; anything missing or owned
/// by another organization is treated as unresolved.
pub fn build_transfer(
    input: &NewTransfer,
    code: String,
    ctx: &OrgContext,
    departments: &[Department],
    products: &[Product],
    now: DateTime<Utc>,
) -> Result<TransferDetails, TransferError> {
    let title = input.title.trim();
    if title.is_empty() {
        return Err(invalid("title is required"));
    }
    if input.items.is_empty() {
        return Err(invalid("a transfer needs at least one item"));
    }
    if input.requesting_department_id == input.supplying_department_id {
        return Err(invalid("requesting and supplying department must differ"));
    }
    if let Some((index, line)) = input
        .items
        .iter()
        .enumerate()
        .find(|(_, line)| line.requested_quantity <= 0)
    {
        return Err(invalid(format!(
            "item {} has requested quantity {}; it must be positive",
            index + 1,
            line.requested_quantity
        )));
    }

    let resolves = |id: Uuid| {
        departments
            .iter()
            .any(|department| {
                department.id == id && department.organization_id == ctx.organization_id
            })
    };
    if !resolves(input.requesting_department_id) {
        return Err(invalid("requesting department does not belong to this organization"));
    }
    if !resolves(input.supplying_department_id) {
        return Err(invalid("supplying department does not belong to this organization"));
    }
    if let Some(line) = input.items.iter().find(|line| {
        !products
            .iter()
            .any(|product| {
                product.id == line.product_id && product.organization_id == ctx.organization_id
            })
    }) {
        return Err(invalid(format!(
            "product {} does not belong to this organization",
            line.product_id
        )));
    }

    ctx.require_department(input.requesting_department_id, "creating a transfer")?;

    let requester = ctx.actor.snapshot();
    let transfer_id = Uuid::new_v4();
    let transfer = Transfer {
        id: transfer_id,
        code,
        title: title.to_string(),
        organization_id: ctx.organization_id,
        requesting_department_id: input.requesting_department_id,
        supplying_department_id: input.supplying_department_id,
        status: TransferStatus::Pending,
        priority: input.priority,
        reason: clean_notes(input.reason.as_deref()),
        notes: clean_notes(input.notes.as_deref()),
        requested_at: now,
        approved_at: None,
        prepared_at: None,
        delivered_at: None,
        cancelled_at: None,
        cancel_reason: None,
        requested_by_id: requester.actor_id,
        requested_by_name: requester.actor_name.clone(),
        requested_by_email: requester.actor_email.clone(),
        requested_by_role: requester.actor_role,
        created_at: now,
        updated_at: now,
    };

    let items = input
        .items
        .iter()
        .enumerate()
        .map(|(index, line)| TransferItemDetails {
            item: TransferItem {
                id: Uuid::new_v4(),
                transfer_id,
                line_number: index as i32 + 1,
                product_id: line.product_id,
                status: ItemStatus::Pending,
                requested_quantity: line.requested_quantity,
                approved_quantity: None,
                prepared_quantity: None,
                received_quantity: None,
                notes: clean_notes(line.notes.as_deref()),
                cancel_reason: None,
                approved_at: None,
                prepared_at: None,
                delivered_at: None,
                cancelled_at: None,
                created_at: now,
                updated_at: now,
            },
            batches: Vec::new(),
        })
        .collect();

    let created = HistoryEntry {
        transfer_id,
        item_id: None,
        action: HistoryAction::TransferCreated,
        from_status: None,
        to_status: TransferStatus::Pending.as_str(),
        notes: None,
    }
    .record(&requester, now);

    Ok(TransferDetails {
        transfer,
        items,
        history: vec![created],
    })
}
