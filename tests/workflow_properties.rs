//! Property-based tests for the workflow laws: aggregation ignores item
//! order, quantities stay within their phase bounds, batch stock is
//! conserved and terminal items never move again.

mod common;

use common::{now, Hospital};
use medstock::models::{ItemStatus, TransferStatus};
use medstock::transfers::{
    aggregate_status, AllocationRequest, ApproveItem, DeliverItem, InProgressPolicy, PrepareItem,
    Workflow,
};
use proptest::prelude::*;

// PROPERTY TEST STRATEGIES

fn item_status_strategy() -> impl Strategy<Value = ItemStatus> {
    prop_oneof![
        Just(ItemStatus::Pending),
        Just(ItemStatus::Approved),
        Just(ItemStatus::Prepared),
        Just(ItemStatus::Delivered),
        Just(ItemStatus::Cancelled),
    ]
}

fn policy_strategy() -> impl Strategy<Value = InProgressPolicy> {
    prop_oneof![
        Just(InProgressPolicy::LeastAdvanced),
        Just(InProgressPolicy::MostAdvanced),
    ]
}

/// requested, approved <= requested, prepared <= approved, received <= prepared
fn quantity_chain() -> impl Strategy<Value = (i32, i32, i32, i32)> {
    (1i32..=500)
        .prop_flat_map(|requested| (Just(requested), 1..=requested))
        .prop_flat_map(|(requested, approved)| (Just(requested), Just(approved), 1..=approved))
        .prop_flat_map(|(requested, approved, prepared)| {
            (Just(requested), Just(approved), Just(prepared), 1..=prepared)
        })
}

proptest! {
    #[test]
    fn aggregation_ignores_item_order(
        statuses in prop::collection::vec(item_status_strategy(), 1..12),
        policy in policy_strategy(),
    ) {
        let forward = aggregate_status(statuses.iter().copied(), policy);
        let backward = aggregate_status(statuses.iter().rev().copied(), policy);
        let mut sorted = statuses.clone();
        sorted.sort_by_key(|status| status.as_str());
        let reordered = aggregate_status(sorted, policy);

        prop_assert_eq!(forward, backward);
        prop_assert_eq!(forward, reordered);
    }

    #[test]
    fn all_delivered_is_completed_and_all_cancelled_is_cancelled(
        count in 1usize..10,
        policy in policy_strategy(),
    ) {
        prop_assert_eq!(
            aggregate_status(vec![ItemStatus::Delivered; count], policy),
            TransferStatus::Completed
        );
        prop_assert_eq!(
            aggregate_status(vec![ItemStatus::Cancelled; count], policy),
            TransferStatus::Cancelled
        );
    }

    #[test]
    fn quantities_stay_within_phase_bounds((requested, approved, prepared, received) in quantity_chain()) {
        let hospital = Hospital::new();
        let workflow = Workflow::default();
        let admin = hospital.admin();
        let mut details = hospital.create(&[(hospital.saline.id, requested)]);
        let item_id = details.items[0].item.id;
        let mut stock = vec![hospital.pharmacy_batch(&hospital.saline, "A", None, 1_000)];

        workflow
            .approve_item(&mut details, item_id, &ApproveItem { approved_quantity: approved, notes: None }, &admin, now())
            .unwrap();
        let over = PrepareItem {
            prepared_quantity: approved + 1,
            allocation: AllocationRequest::Fefo {},
            notes: None,
        };
        prop_assert!(workflow.prepare_item(&mut details, item_id, &over, &mut stock, &admin, now()).is_err());

        let prepare = PrepareItem { prepared_quantity: prepared, allocation: AllocationRequest::Fefo {}, notes: None };
        workflow.prepare_item(&mut details, item_id, &prepare, &mut stock, &admin, now()).unwrap();
        prop_assert_eq!(details.items[0].allocated_quantity(), i64::from(prepared));

        let over = DeliverItem { received_quantity: prepared + 1, notes: None };
        prop_assert!(workflow.deliver_item(&mut details, item_id, &over, &admin, now()).is_err());
        workflow
            .deliver_item(&mut details, item_id, &DeliverItem { received_quantity: received, notes: None }, &admin, now())
            .unwrap();

        let item = &details.items[0].item;
        prop_assert!(item.approved_quantity.unwrap() <= item.requested_quantity);
        prop_assert!(item.prepared_quantity.unwrap() <= item.approved_quantity.unwrap());
        prop_assert!(item.received_quantity.unwrap() <= item.prepared_quantity.unwrap());
    }

    #[test]
    fn stock_is_conserved_across_prepare_and_cancel(
        quantities in prop::collection::vec(1i32..=40, 1..5),
        available in prop::collection::vec(0i32..=60, 1..5),
    ) {
        let hospital = Hospital::new();
        let workflow = Workflow::default();
        let admin = hospital.admin();
        let lines: Vec<_> = quantities.iter().map(|quantity| (hospital.saline.id, *quantity)).collect();
        let mut details = hospital.create(&lines);
        let mut stock: Vec<_> = available
            .iter()
            .enumerate()
            .map(|(index, quantity)| hospital.pharmacy_batch(&hospital.saline, &format!("LOT-{index}"), None, *quantity))
            .collect();
        let original: i64 = stock.iter().map(|batch| i64::from(batch.quantity_available)).sum();

        let item_ids: Vec<_> = details.items.iter().map(|entry| entry.item.id).collect();
        for (item_id, quantity) in item_ids.iter().zip(&quantities) {
            workflow
                .approve_item(&mut details, *item_id, &ApproveItem { approved_quantity: *quantity, notes: None }, &admin, now())
                .unwrap();
            let prepare = PrepareItem { prepared_quantity: *quantity, allocation: AllocationRequest::Fefo {}, notes: None };
            // Running out of stock is fine; the failed item simply stays APPROVED.
            let _ = workflow.prepare_item(&mut details, *item_id, &prepare, &mut stock, &admin, now());

            let remaining: i64 = stock.iter().map(|batch| i64::from(batch.quantity_available)).sum();
            let allocated: i64 = details.items.iter().map(|entry| entry.allocated_quantity()).sum();
            prop_assert!(stock.iter().all(|batch| batch.quantity_available >= 0));
            prop_assert_eq!(remaining + allocated, original);
        }

        workflow.cancel_transfer(&mut details, "stock count", &mut stock, &admin, now()).unwrap();
        let restored: i64 = stock.iter().map(|batch| i64::from(batch.quantity_available)).sum();
        prop_assert_eq!(restored, original);
        for (batch, quantity) in stock.iter().zip(&available) {
            prop_assert_eq!(batch.quantity_available, *quantity);
        }
    }

    #[test]
    fn terminal_items_never_change(deliver_first in any::<bool>(), attempt in 0u8..4, quantity in 1i32..20) {
        let hospital = Hospital::new();
        let workflow = Workflow::default();
        let admin = hospital.admin();
        let mut details = hospital.create(&[(hospital.saline.id, quantity)]);
        let item_id = details.items[0].item.id;
        let mut stock = vec![hospital.pharmacy_batch(&hospital.saline, "A", None, 100)];

        if deliver_first {
            workflow.approve_item(&mut details, item_id, &ApproveItem { approved_quantity: quantity, notes: None }, &admin, now()).unwrap();
            let prepare = PrepareItem { prepared_quantity: quantity, allocation: AllocationRequest::Fefo {}, notes: None };
            workflow.prepare_item(&mut details, item_id, &prepare, &mut stock, &admin, now()).unwrap();
            workflow.deliver_item(&mut details, item_id, &DeliverItem { received_quantity: quantity, notes: None }, &admin, now()).unwrap();
        } else {
            workflow.cancel_item(&mut details, item_id, "not needed", &mut stock, &admin, now()).unwrap();
        }

        let frozen = details.items[0].clone();
        let stock_before = stock.clone();
        let history_len = details.history.len();

        let result = match attempt {
            0 => workflow.approve_item(&mut details, item_id, &ApproveItem { approved_quantity: 1, notes: None }, &admin, now()),
            1 => {
                let prepare = PrepareItem { prepared_quantity: 1, allocation: AllocationRequest::Fefo {}, notes: None };
                workflow.prepare_item(&mut details, item_id, &prepare, &mut stock, &admin, now())
            }
            2 => workflow.deliver_item(&mut details, item_id, &DeliverItem { received_quantity: 1, notes: None }, &admin, now()),
            _ => workflow.cancel_item(&mut details, item_id, "again", &mut stock, &admin, now()),
        };

        let is_invalid_transition = matches!(result, Err(medstock::transfers::TransferError::InvalidTransition { .. }));
        prop_assert!(is_invalid_transition);
        prop_assert_eq!(&details.items[0].item, &frozen.item);
        prop_assert_eq!(&details.items[0].batches, &frozen.batches);
        prop_assert_eq!(stock, stock_before);
        prop_assert_eq!(details.history.len(), history_len);
    }
}
