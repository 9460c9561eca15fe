//! Draws prepared quantities from stock batches and gives them back.
//!
//! Nothing here touches the database. The allocator works on the batches
//! the caller loaded (and locked) and returns plans; `apply_deltas` mirrors
//! those plans onto the in-memory batches so callers see the same numbers
//! the guarded SQL updates will produce.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use super::commands::BatchAllocationInput;
use super::error::TransferError;
use crate::models::{StockBatch, TransferItemBatch};

/// Department and product a batch must belong to before it can be drawn
/// from for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationScope {
    pub organization_id: Uuid,
    pub department_id: Uuid,
    pub product_id: Uuid,
}

impl AllocationScope {
    fn admits(&self, batch: &StockBatch) -> bool {
        batch.organization_id == self.organization_id
            && batch.department_id == self.department_id
            && batch.product_id == self.product_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAllocation {
    pub batch_id: Uuid,
    pub lot_number: String,
    pub expiry_date: Option<NaiveDate>,
    pub quantity: i32,
}

impl PlannedAllocation {
    pub fn into_item_batch(self, transfer_item_id: Uuid, now: DateTime<Utc>) -> TransferItemBatch {
        TransferItemBatch {
            id: Uuid::new_v4(),
            transfer_item_id,
            batch_id: self.batch_id,
            lot_number: self.lot_number,
            expiry_date: self.expiry_date,
            quantity: self.quantity,
            created_at: now,
        }
    }
}

/// Signed change to a batch's available quantity. Negative draws stock,
/// positive returns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchDelta {
    pub batch_id: Uuid,
    pub delta: i32,
}

/// Quantity of one lot credited to the receiving department.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptLine {
    pub lot_number: String,
    pub expiry_date: Option<NaiveDate>,
    pub quantity: i32,
}

/// Checks a caller-supplied allocation list against current stock.
///
/// Repeated batch ids are merged. Fails with `QuantityOutOfRange` for a
/// non-positive line, `AllocationMismatch` when the lines do not add up to
/// `prepared`, `NotFound` for a batch outside `scope`, and
/// `InsufficientBatchStock` when a batch holds less than asked.
pub fn validate_explicit(
    prepared: i32,
    requested: &[BatchAllocationInput],
    stock: &[StockBatch],
    scope: AllocationScope,
) -> Result<Vec<PlannedAllocation>, TransferError> {
    if let Some(line) = requested.iter().find(|line| line.quantity <= 0) {
        return Err(TransferError::QuantityOutOfRange {
            field: "allocation quantity",
            value: line.quantity,
            max: prepared,
        });
    }

    let allocated: i64 = requested.iter().map(|line| i64::from(line.quantity)).sum();
    if allocated != i64::from(prepared) {
        return Err(TransferError::AllocationMismatch { allocated, prepared });
    }

    let mut order: Vec<Uuid> = Vec::new();
    let mut merged: HashMap<Uuid, i32> = HashMap::new();
    for line in requested {
        let entry = merged.entry(line.batch_id).or_insert_with(|| {
            order.push(line.batch_id);
            0
        });
        *entry += line.quantity;
    }

    let mut plan = Vec::with_capacity(order.len());
    for batch_id in order {
        let quantity = merged[&batch_id];
        let batch = stock
            .iter()
            .find(|batch| batch.id == batch_id && scope.admits(batch))
            .ok_or(TransferError::NotFound("stock batch"))?;

        if quantity > batch.quantity_available {
            return Err(TransferError::InsufficientBatchStock {
                batch_id: Some(batch_id),
                requested: i64::from(quantity),
                available: i64::from(batch.quantity_available),
            });
        }

        plan.push(PlannedAllocation {
            batch_id,
            lot_number: batch.lot_number.clone(),
            expiry_date: batch.expiry_date,
            quantity,
        });
    }

    Ok(plan)
}

/// First-expired-first-out selection. Expired and empty batches are
/// skipped, undated batches go last. Either covers `quantity` exactly or
/// fails with `InsufficientBatchStock`.
pub fn allocate_fefo(
    quantity: i32,
    stock: &[StockBatch],
    scope: AllocationScope,
    today: NaiveDate,
) -> Result<Vec<PlannedAllocation>, TransferError> {
    let mut candidates: Vec<&StockBatch> = stock
        .iter()
        .filter(|batch| scope.admits(batch))
        .filter(|batch| batch.quantity_available > 0 && !batch.is_expired(today))
        .collect();

    candidates.sort_by(|a, b| {
        let expiry = match (a.expiry_date, b.expiry_date) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        };
        expiry
            .then_with(|| a.lot_number.cmp(&b.lot_number))
            .then_with(|| a.id.cmp(&b.id))
    });

    let available: i64 = candidates
        .iter()
        .map(|batch| i64::from(batch.quantity_available))
        .sum();
    if available < i64::from(quantity) {
        return Err(TransferError::InsufficientBatchStock {
            batch_id: None,
            requested: i64::from(quantity),
            available,
        });
    }

    let mut remaining = quantity;
    let mut plan = Vec::new();
    for batch in candidates {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(batch.quantity_available);
        plan.push(PlannedAllocation {
            batch_id: batch.id,
            lot_number: batch.lot_number.clone(),
            expiry_date: batch.expiry_date,
            quantity: take,
        });
        remaining -= take;
    }

    Ok(plan)
}

pub fn draw(plan: &[PlannedAllocation]) -> Vec<BatchDelta> {
    plan.iter()
        .map(|allocation| BatchDelta {
            batch_id: allocation.batch_id,
            delta: -allocation.quantity,
        })
        .collect()
}

/// Reverses every allocation of an item.
pub fn release(allocations: &[TransferItemBatch]) -> Vec<BatchDelta> {
    allocations
        .iter()
        .map(|allocation| BatchDelta {
            batch_id: allocation.batch_id,
            delta: allocation.quantity,
        })
        .collect()
}

/// Splits a received quantity over the item's lots in allocation order.
pub fn plan_receipt(allocations: &[TransferItemBatch], received: i32) -> Vec<ReceiptLine> {
    let mut remaining = received;
    let mut lines = Vec::new();
    for allocation in allocations {
        if remaining <= 0 {
            break;
        }
        let quantity = remaining.min(allocation.quantity);
        lines.push(ReceiptLine {
            lot_number: allocation.lot_number.clone(),
            expiry_date: allocation.expiry_date,
            quantity,
        });
        remaining -= quantity;
    }
    lines
}

/// Mirrors deltas onto loaded batches. A draw larger than what is left
/// fails before anything changes.
pub fn apply_deltas(stock: &mut [StockBatch], deltas: &[BatchDelta]) -> Result<(), TransferError> {
    let mut net: HashMap<Uuid, i64> = HashMap::new();
    for delta in deltas {
        *net.entry(delta.batch_id).or_insert(0) += i64::from(delta.delta);
    }

    for (batch_id, change) in &net {
        let batch = stock
            .iter()
            .find(|batch| batch.id == *batch_id)
            .ok_or(TransferError::NotFound("stock batch"))?;
        let after = i64::from(batch.quantity_available) + change;
        if after < 0 {
            return Err(TransferError::InsufficientBatchStock {
                batch_id: Some(*batch_id),
                requested: -change,
                available: i64::from(batch.quantity_available),
            });
        }
    }

    for batch in stock.iter_mut() {
        if let Some(change) = net.get(&batch.id) {
            batch.quantity_available = (i64::from(batch.quantity_available) + change) as i32;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    struct Shelf {
        scope: AllocationScope,
    }

    impl Shelf {
        fn new() -> Self {
            Self {
                scope: AllocationScope {
                    organization_id: Uuid::new_v4(),
                    department_id: Uuid::new_v4(),
                    product_id: Uuid::new_v4(),
                },
            }
        }

        fn batch(&self, lot: &str, expiry: Option<(i32, u32, u32)>, quantity: i32) -> StockBatch {
            StockBatch {
                id: Uuid::new_v4(),
                organization_id: self.scope.organization_id,
                department_id: self.scope.department_id,
                product_id: self.scope.product_id,
                lot_number: lot.to_string(),
                expiry_date: expiry.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
                quantity_available: quantity,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            }
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn fefo_prefers_nearest_expiry_and_skips_expired() {
        let shelf = Shelf::new();
        let expired = shelf.batch("L-OLD", Some((2026, 1, 1)), 50);
        let later = shelf.batch("L-LATE", Some((2027, 6, 1)), 10);
        let sooner = shelf.batch("L-SOON", Some((2026, 12, 1)), 4);
        let undated = shelf.batch("L-NODATE", None, 100);
        let stock = vec![expired, later.clone(), undated, sooner.clone()];

        let plan = allocate_fefo(9, &stock, shelf.scope, today()).unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!((plan[0].batch_id, plan[0].quantity), (sooner.id, 4));
        assert_eq!((plan[1].batch_id, plan[1].quantity), (later.id, 5));
    }

    #[test]
    fn fefo_never_under_allocates() {
        let shelf = Shelf::new();
        let stock = vec![shelf.batch("L1", Some((2027, 1, 1)), 3)];

        let err = allocate_fefo(5, &stock, shelf.scope, today()).unwrap_err();
        assert!(matches!(
            err,
            TransferError::InsufficientBatchStock { requested: 5, available: 3, .. }
        ));
    }

    #[test]
    fn fefo_ignores_other_departments() {
        let shelf = Shelf::new();
        let mut elsewhere = shelf.batch("L1", Some((2027, 1, 1)), 30);
        elsewhere.department_id = Uuid::new_v4();

        assert!(allocate_fefo(1, &[elsewhere], shelf.scope, today()).is_err());
    }

    #[test]
    fn explicit_allocations_must_add_up() {
        let shelf = Shelf::new();
        let a = shelf.batch("A", None, 10);
        let b = shelf.batch("B", None, 10);
        let requested = [
            BatchAllocationInput { batch_id: a.id, quantity: 2 },
            BatchAllocationInput { batch_id: b.id, quantity: 3 },
        ];

        let err = validate_explicit(6, &requested, &[a, b], shelf.scope).unwrap_err();
        assert!(matches!(
            err,
            TransferError::AllocationMismatch { allocated: 5, prepared: 6 }
        ));
    }

    #[test]
    fn explicit_allocations_merge_repeated_batches() {
        let shelf = Shelf::new();
        let a = shelf.batch("A", None, 10);
        let requested = [
            BatchAllocationInput { batch_id: a.id, quantity: 6 },
            BatchAllocationInput { batch_id: a.id, quantity: 6 },
        ];

        let err = validate_explicit(12, &requested, &[a.clone()], shelf.scope).unwrap_err();
        assert!(matches!(
            err,
            TransferError::InsufficientBatchStock { requested: 12, available: 10, .. }
        ));

        let requested = [
            BatchAllocationInput { batch_id: a.id, quantity: 4 },
            BatchAllocationInput { batch_id: a.id, quantity: 1 },
        ];
        let plan = validate_explicit(5, &requested, &[a], shelf.scope).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].quantity, 5);
    }

    #[test]
    fn explicit_allocations_reject_zero_lines_and_foreign_batches() {
        let shelf = Shelf::new();
        let a = shelf.batch("A", None, 10);
        let zero = [BatchAllocationInput { batch_id: a.id, quantity: 0 }];
        assert!(matches!(
            validate_explicit(0, &zero, &[a.clone()], shelf.scope),
            Err(TransferError::QuantityOutOfRange { .. })
        ));

        let other = Shelf::new();
        let foreign = other.batch("X", None, 10);
        let lines = [BatchAllocationInput { batch_id: foreign.id, quantity: 1 }];
        assert!(matches!(
            validate_explicit(1, &lines, &[foreign], shelf.scope),
            Err(TransferError::NotFound(_))
        ));
    }

    #[test]
    fn release_restores_what_draw_took() {
        let shelf = Shelf::new();
        let mut stock = vec![shelf.batch("X", None, 20)];
        let plan = validate_explicit(
            5,
            &[BatchAllocationInput { batch_id: stock[0].id, quantity: 5 }],
            &stock,
            shelf.scope,
        )
        .unwrap();

        apply_deltas(&mut stock, &draw(&plan)).unwrap();
        assert_eq!(stock[0].quantity_available, 15);

        let item_id = Uuid::new_v4();
        let rows: Vec<_> = plan
            .into_iter()
            .map(|allocation| allocation.into_item_batch(item_id, Utc::now()))
            .collect();
        apply_deltas(&mut stock, &release(&rows)).unwrap();
        assert_eq!(stock[0].quantity_available, 20);
    }

    #[test]
    fn overdrawing_leaves_stock_untouched() {
        let shelf = Shelf::new();
        let mut stock = vec![shelf.batch("X", None, 2), shelf.batch("Y", None, 9)];
        let deltas = [
            BatchDelta { batch_id: stock[1].id, delta: -4 },
            BatchDelta { batch_id: stock[0].id, delta: -3 },
        ];

        assert!(apply_deltas(&mut stock, &deltas).is_err());
        assert_eq!(stock[0].quantity_available, 2);
        assert_eq!(stock[1].quantity_available, 9);
    }

    #[test]
    fn receipt_follows_allocation_order() {
        let item_id = Uuid::new_v4();
        let now = Utc::now();
        let rows = vec![
            PlannedAllocation {
                batch_id: Uuid::new_v4(),
                lot_number: "A".to_string(),
                expiry_date: None,
                quantity: 4,
            }
            .into_item_batch(item_id, now),
            PlannedAllocation {
                batch_id: Uuid::new_v4(),
                lot_number: "B".to_string(),
                expiry_date: None,
                quantity: 6,
            }
            .into_item_batch(item_id, now),
        ];

        let lines = plan_receipt(&rows, 7);
        assert_eq!(lines.len(), 2);
        assert_eq!((lines[0].lot_number.as_str(), lines[0].quantity), ("A", 4));
        assert_eq!((lines[1].lot_number.as_str(), lines[1].quantity), ("B", 3));
    }
}
