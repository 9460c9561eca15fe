//! Per-item lifecycle:
//!
//! ```text
//! PENDING -> APPROVED -> PREPARED -> DELIVERED
//!    |          |           |
//!    +----------+-----------+------> CANCELLED
//! ```
//!
//! Every function checks the source state first, then quantity bounds, and
//! only mutates the item once all checks pass.

use chrono::{DateTime, Utc};

use super::error::TransferError;
use crate::models::{ItemStatus, TransferItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemAction {
    Approve,
    Prepare,
    Deliver,
    Cancel,
}

impl ItemAction {
    pub fn verb(self) -> &'static str {
        match self {
            ItemAction::Approve => "approve",
            ItemAction::Prepare => "prepare",
            ItemAction::Deliver => "deliver",
            ItemAction::Cancel => "cancel",
        }
    }

    pub fn target(self) -> ItemStatus {
        match self {
            ItemAction::Approve => ItemStatus::Approved,
            ItemAction::Prepare => ItemStatus::Prepared,
            ItemAction::Deliver => ItemStatus::Delivered,
            ItemAction::Cancel => ItemStatus::Cancelled,
        }
    }

    pub fn permits(self, from: ItemStatus) -> bool {
        match self {
            ItemAction::Approve => from == ItemStatus::Pending,
            ItemAction::Prepare => from == ItemStatus::Approved,
            ItemAction::Deliver => from == ItemStatus::Prepared,
            ItemAction::Cancel => !from.is_terminal(),
        }
    }

    pub fn guard(self, item: &TransferItem) -> Result<(), TransferError> {
        if self.permits(item.status) {
            Ok(())
        } else {
            Err(TransferError::InvalidTransition {
                action: self.verb(),
                from: item.status.as_str(),
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ItemStatus,
    pub to: ItemStatus,
}

pub fn check_quantity(field: &'static str, value: i32, max: i32) -> Result<(), TransferError> {
    if value <= 0 || value > max {
        Err(TransferError::QuantityOutOfRange { field, value, max })
    } else {
        Ok(())
    }
}

/// Upper bound for the quantity the given action may set.
pub fn quantity_ceiling(action: ItemAction, item: &TransferItem) -> i32 {
    match action {
        ItemAction::Approve => item.requested_quantity,
        ItemAction::Prepare => item.approved_quantity.unwrap_or(0),
        ItemAction::Deliver => item.prepared_quantity.unwrap_or(0),
        ItemAction::Cancel => 0,
    }
}

fn advance(item: &mut TransferItem, action: ItemAction, now: DateTime<Utc>) -> Transition {
    let from = item.status;
    item.status = action.target();
    item.updated_at = now;
    Transition {
        from,
        to: item.status,
    }
}

pub fn approve(
    item: &mut TransferItem,
    approved_quantity: i32,
    now: DateTime<Utc>,
) -> Result<Transition, TransferError> {
    ItemAction::Approve.guard(item)?;
    check_quantity(
        "approved_quantity",
        approved_quantity,
        quantity_ceiling(ItemAction::Approve, item),
    )?;

    item.approved_quantity = Some(approved_quantity);
    item.approved_at = Some(now);
    Ok(advance(item, ItemAction::Approve, now))
}

/// Caller must already have validated the batch allocations covering
/// `prepared_quantity`.
pub fn prepare(
    item: &mut TransferItem,
    prepared_quantity: i32,
    now: DateTime<Utc>,
) -> Result<Transition, TransferError> {
    ItemAction::Prepare.guard(item)?;
    check_quantity(
        "prepared_quantity",
        prepared_quantity,
        quantity_ceiling(ItemAction::Prepare, item),
    )?;

    item.prepared_quantity = Some(prepared_quantity);
    item.prepared_at = Some(now);
    Ok(advance(item, ItemAction::Prepare, now))
}

pub fn deliver(
    item: &mut TransferItem,
    received_quantity: i32,
    now: DateTime<Utc>,
) -> Result<Transition, TransferError> {
    ItemAction::Deliver.guard(item)?;
    check_quantity(
        "received_quantity",
        received_quantity,
        quantity_ceiling(ItemAction::Deliver, item),
    )?;

    item.received_quantity = Some(received_quantity);
    item.delivered_at = Some(now);
    Ok(advance(item, ItemAction::Deliver, now))
}

/// Batch allocations of a PREPARED item are the caller's to release.
pub fn cancel(
    item: &mut TransferItem,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> Result<Transition, TransferError> {
    ItemAction::Cancel.guard(item)?;

    item.cancel_reason = reason;
    item.cancelled_at = Some(now);
    Ok(advance(item, ItemAction::Cancel, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn item(requested: i32) -> TransferItem {
        let now = Utc::now();
        TransferItem {
            id: Uuid::new_v4(),
            transfer_id: Uuid::new_v4(),
            line_number: 1,
            product_id: Uuid::new_v4(),
            status: ItemStatus::Pending,
            requested_quantity: requested,
            approved_quantity: None,
            prepared_quantity: None,
            received_quantity: None,
            notes: None,
            cancel_reason: None,
            approved_at: None,
            prepared_at: None,
            delivered_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn happy_path_walks_every_phase() {
        let now = Utc::now();
        let mut line = item(10);

        assert_eq!(
            approve(&mut line, 8, now).unwrap(),
            Transition { from: ItemStatus::Pending, to: ItemStatus::Approved }
        );
        prepare(&mut line, 8, now).unwrap();
        let delivered = deliver(&mut line, 7, now).unwrap();

        assert_eq!(delivered.from, ItemStatus::Prepared);
        assert_eq!(line.status, ItemStatus::Delivered);
        assert_eq!(
            (line.approved_quantity, line.prepared_quantity, line.received_quantity),
            (Some(8), Some(8), Some(7))
        );
        assert!(line.delivered_at.is_some());
    }

    #[test]
    fn quantities_are_bounded_by_the_previous_phase() {
        let now = Utc::now();
        let mut line = item(10);

        assert!(matches!(
            approve(&mut line, 0, now),
            Err(TransferError::QuantityOutOfRange { value: 0, max: 10, .. })
        ));
        assert!(matches!(
            approve(&mut line, 11, now),
            Err(TransferError::QuantityOutOfRange { .. })
        ));
        assert_eq!(line.status, ItemStatus::Pending);

        approve(&mut line, 4, now).unwrap();
        assert!(matches!(
            prepare(&mut line, 5, now),
            Err(TransferError::QuantityOutOfRange { .. })
        ));
        prepare(&mut line, 4, now).unwrap();
        assert!(matches!(
            deliver(&mut line, -1, now),
            Err(TransferError::QuantityOutOfRange { .. })
        ));
        assert_eq!(line.status, ItemStatus::Prepared);
    }

    #[test]
    fn phases_cannot_be_skipped() {
        let now = Utc::now();
        let mut line = item(3);

        assert!(matches!(
            prepare(&mut line, 3, now),
            Err(TransferError::InvalidTransition { action: "prepare", from: "PENDING" })
        ));
        assert!(matches!(deliver(&mut line, 3, now), Err(TransferError::InvalidTransition { .. })));
    }

    #[test]
    fn terminal_items_refuse_everything() {
        let now = Utc::now();
        let mut cancelled = item(3);
        cancel(&mut cancelled, Some("ordered twice".to_string()), now).unwrap();
        let snapshot = cancelled.clone();

        assert!(approve(&mut cancelled, 1, now).is_err());
        assert!(cancel(&mut cancelled, None, now).is_err());
        assert_eq!(cancelled, snapshot);
        assert_eq!(cancelled.cancel_reason.as_deref(), Some("ordered twice"));
    }

    #[test]
    fn cancel_is_allowed_from_every_active_state() {
        for status in [ItemStatus::Pending, ItemStatus::Approved, ItemStatus::Prepared] {
            assert!(ItemAction::Cancel.permits(status));
        }
        assert!(!ItemAction::Cancel.permits(ItemStatus::Delivered));
    }
}
