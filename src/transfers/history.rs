use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{ActorSnapshot, TransferHistory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryAction {
    TransferCreated,
    TransferCancelled,
    ItemApproved,
    ItemPrepared,
    ItemDelivered,
    ItemCancelled,
}

impl HistoryAction {
    pub fn as_str(self) -> &'static str {
        match self {
            HistoryAction::TransferCreated => "transfer.created",
            HistoryAction::TransferCancelled => "transfer.cancelled",
            HistoryAction::ItemApproved => "item.approved",
            HistoryAction::ItemPrepared => "item.prepared",
            HistoryAction::ItemDelivered => "item.delivered",
            HistoryAction::ItemCancelled => "item.cancelled",
        }
    }
}

/// One state change about to be written to the timeline.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub transfer_id: Uuid,
    pub item_id: Option<Uuid>,
    pub action: HistoryAction,
    pub from_status: Option<&'static str>,
    pub to_status: &'static str,
    pub notes: Option<String>,
}

impl HistoryEntry {
    pub fn record(self, actor: &ActorSnapshot, now: DateTime<Utc>) -> TransferHistory {
        TransferHistory {
            id: Uuid::new_v4(),
            transfer_id: self.transfer_id,
            transfer_item_id: self.item_id,
            action: self.action.as_str().to_string(),
            from_status: self.from_status.map(str::to_string),
            to_status: self.to_status.to_string(),
            actor: actor.clone(),
            notes: self.notes,
            created_at: now,
        }
    }
}

/// Blank notes are not worth a column.
pub fn clean_notes(notes: Option<&str>) -> Option<String> {
    notes
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
