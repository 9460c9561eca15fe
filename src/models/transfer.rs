use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, Utc};

use super::MemberRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transfer_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    Pending,
    Approved,
    Prepared,
    Partial,
    Completed,
    Cancelled,
}

impl TransferStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransferStatus::Pending => "PENDING",
            TransferStatus::Approved => "APPROVED",
            TransferStatus::Prepared => "PREPARED",
            TransferStatus::Partial => "PARTIAL",
            TransferStatus::Completed => "COMPLETED",
            TransferStatus::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transfer_item_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Pending,
    Approved,
    Prepared,
    Delivered,
    Cancelled,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Pending => "PENDING",
            ItemStatus::Approved => "APPROVED",
            ItemStatus::Prepared => "PREPARED",
            ItemStatus::Delivered => "DELIVERED",
            ItemStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStatus::Delivered | ItemStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transfer_priority", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferPriority {
    #[default]
    Normal,
    Urgent,
    Critical,
}

/// Who did something, frozen at the time they did it. Never re-resolved
/// against `users`, so renamed or removed accounts keep their history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ActorSnapshot {
    pub actor_id: Uuid,
    pub actor_name: String,
    pub actor_email: String,
    pub actor_role: MemberRole,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transfer {
    pub id: Uuid,
    pub code: String,
    pub title: String,
    pub organization_id: Uuid,
    pub requesting_department_id: Uuid,
    pub supplying_department_id: Uuid,
    pub status: TransferStatus,
    pub priority: TransferPriority,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub prepared_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub requested_by_id: Uuid,
    pub requested_by_name: String,
    pub requested_by_email: String,
    pub requested_by_role: MemberRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transfer {
    pub fn requester(&self) -> ActorSnapshot {
        ActorSnapshot {
            actor_id: self.requested_by_id,
            actor_name: self.requested_by_name.clone(),
            actor_email: self.requested_by_email.clone(),
            actor_role: self.requested_by_role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TransferItem {
    pub id: Uuid,
    pub transfer_id: Uuid,
    pub line_number: i32,
    pub product_id: Uuid,
    pub status: ItemStatus,
    pub requested_quantity: i32,
    pub approved_quantity: Option<i32>,
    pub prepared_quantity: Option<i32>,
    pub received_quantity: Option<i32>,
    pub notes: Option<String>,
    pub cancel_reason: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub prepared_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Part of a prepared item drawn from one stock batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TransferItemBatch {
    pub id: Uuid,
    pub transfer_item_id: Uuid,
    pub batch_id: Uuid,
    pub lot_number: String,
    pub expiry_date: Option<NaiveDate>,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

/// Append-only timeline entry. `transfer_item_id` is `None` for
/// transfer-level events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TransferHistory {
    pub id: Uuid,
    pub transfer_id: Uuid,
    pub transfer_item_id: Option<Uuid>,
    pub action: String,
    pub from_status: Option<String>,
    pub to_status: String,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub actor: ActorSnapshot,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferItemDetails {
    #[serde(flatten)]
    pub item: TransferItem,
    pub batches: Vec<TransferItemBatch>,
}

impl TransferItemDetails {
    pub fn allocated_quantity(&self) -> i64 {
        self.batches.iter().map(|batch| i64::from(batch.quantity)).sum()
    }
}

/// A transfer with its items, their batch allocations and the timeline,
/// items in line order and history in creation order.
#[derive(Debug, Clone, Serialize)]
pub struct TransferDetails {
    #[serde(flatten)]
    pub transfer: Transfer,
    pub items: Vec<TransferItemDetails>,
    pub history: Vec<TransferHistory>,
}

impl TransferDetails {
    pub fn item(&self, item_id: Uuid) -> Option<&TransferItemDetails> {
        self.items.iter().find(|entry| entry.item.id == item_id)
    }

    pub fn item_mut(&mut self, item_id: Uuid) -> Option<&mut TransferItemDetails> {
        self.items.iter_mut().find(|entry| entry.item.id == item_id)
    }

    pub fn item_statuses(&self) -> impl Iterator<Item = ItemStatus> + '_ {
        self.items.iter().map(|entry| entry.item.status)
    }
}
