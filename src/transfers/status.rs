//! Derives a transfer's overall status from its item statuses.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::{ItemStatus, TransferStatus};

/// Which in-progress status wins when active items sit in different
/// phases (some APPROVED, some PREPARED, or PENDING next to either).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InProgressPolicy {
    /// Report the phase every active item has reached.
    #[default]
    LeastAdvanced,
    /// Report the phase the furthest active item has reached.
    MostAdvanced,
}

impl FromStr for InProgressPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "least-advanced" | "least_advanced" => Ok(InProgressPolicy::LeastAdvanced),
            "most-advanced" | "most_advanced" => Ok(InProgressPolicy::MostAdvanced),
            other => Err(format!("unknown in-progress policy '{other}'")),
        }
    }
}

fn progress(status: ItemStatus) -> u8 {
    match status {
        ItemStatus::Pending => 0,
        ItemStatus::Approved => 1,
        ItemStatus::Prepared => 2,
        ItemStatus::Delivered | ItemStatus::Cancelled => 3,
    }
}

fn in_progress(status: ItemStatus) -> TransferStatus {
    match status {
        ItemStatus::Approved => TransferStatus::Approved,
        ItemStatus::Prepared => TransferStatus::Prepared,
        _ => TransferStatus::Pending,
    }
}

/// Rules, in order:
/// - no active items: all CANCELLED gives CANCELLED, all DELIVERED gives
///   COMPLETED, a mix gives PARTIAL
/// - active items next to a delivered one: PARTIAL
/// - otherwise the active items' phase, chosen by `policy`
///
/// Cancelled items next to active ones do not affect the result. Only the
/// multiset of statuses matters, never their order.
pub fn aggregate_status<I>(statuses: I, policy: InProgressPolicy) -> TransferStatus
where
    I: IntoIterator<Item = ItemStatus>,
{
    let mut total = 0usize;
    let mut delivered = 0usize;
    let mut cancelled = 0usize;
    let mut least: Option<ItemStatus> = None;
    let mut most: Option<ItemStatus> = None;

    for status in statuses {
        total += 1;
        match status {
            ItemStatus::Delivered => delivered += 1,
            ItemStatus::Cancelled => cancelled += 1,
            active => {
                if least.map_or(true, |current| progress(active) < progress(current)) {
                    least = Some(active);
                }
                if most.map_or(true, |current| progress(active) > progress(current)) {
                    most = Some(active);
                }
            }
        }
    }

    if total == 0 {
        return TransferStatus::Pending;
    }

    let chosen = match policy {
        InProgressPolicy::LeastAdvanced => least,
        InProgressPolicy::MostAdvanced => most,
    };

    match chosen {
        None if cancelled == total => TransferStatus::Cancelled,
        None if delivered == total => TransferStatus::Completed,
        None => TransferStatus::Partial,
        Some(_) if delivered > 0 => TransferStatus::Partial,
        Some(active) => in_progress(active),
    }
}

/// True once no item can move any more.
pub fn is_settled<I>(statuses: I) -> bool
where
    I: IntoIterator<Item = ItemStatus>,
{
    statuses.into_iter().all(ItemStatus::is_terminal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ItemStatus::*;

    fn least(statuses: &[ItemStatus]) -> TransferStatus {
        aggregate_status(statuses.iter().copied(), InProgressPolicy::LeastAdvanced)
    }

    #[test]
    fn terminal_combinations() {
        assert_eq!(least(&[Delivered, Delivered]), TransferStatus::Completed);
        assert_eq!(least(&[Cancelled, Cancelled]), TransferStatus::Cancelled);
        assert_eq!(least(&[Delivered, Cancelled]), TransferStatus::Partial);
    }

    #[test]
    fn pending_items_hold_the_transfer_back() {
        assert_eq!(least(&[Pending, Pending]), TransferStatus::Pending);
        assert_eq!(least(&[Approved, Pending]), TransferStatus::Pending);
        assert_eq!(least(&[Approved, Prepared]), TransferStatus::Approved);
        assert_eq!(least(&[Prepared, Prepared, Cancelled]), TransferStatus::Prepared);
    }

    #[test]
    fn most_advanced_policy_reports_the_leading_item() {
        let statuses = [Approved, Prepared, Pending];
        assert_eq!(
            aggregate_status(statuses, InProgressPolicy::MostAdvanced),
            TransferStatus::Prepared
        );
    }

    #[test]
    fn a_delivery_next_to_active_items_is_partial() {
        assert_eq!(least(&[Delivered, Prepared]), TransferStatus::Partial);
        assert_eq!(least(&[Delivered, Pending, Cancelled]), TransferStatus::Partial);
    }

    #[test]
    fn empty_transfer_is_pending() {
        assert_eq!(least(&[]), TransferStatus::Pending);
    }

    #[test]
    fn policy_parses_from_config_strings() {
        assert_eq!("least-advanced".parse(), Ok(InProgressPolicy::LeastAdvanced));
        assert_eq!("MOST_ADVANCED".parse(), Ok(InProgressPolicy::MostAdvanced));
        assert!("fastest".parse::<InProgressPolicy>().is_err());
    }

    #[test]
    fn settled_only_when_every_item_is_terminal() {
        assert!(is_settled([Delivered, Cancelled]));
        assert!(!is_settled([Delivered, Prepared]));
    }
}
