//! Validated request payloads for the transfer operations. Unknown fields
//! are rejected at deserialization.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::TransferPriority;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewTransfer {
    pub requesting_department_id: Uuid,
    pub supplying_department_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub priority: TransferPriority,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub items: Vec<NewTransferItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewTransferItem {
    pub product_id: Uuid,
    pub requested_quantity: i32,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApproveItem {
    pub approved_quantity: i32,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrepareItem {
    pub prepared_quantity: i32,
    pub allocation: AllocationRequest,
    #[serde(default)]
    pub notes: Option<String>,
}

/// How the prepared quantity is drawn from the supplying department's lots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case", deny_unknown_fields)]
pub enum AllocationRequest {
    Manual { batches: Vec<BatchAllocationInput> },
    Fefo {},
}

impl AllocationRequest {
    pub fn batch_ids(&self) -> Vec<Uuid> {
        match self {
            AllocationRequest::Manual { batches } => {
                batches.iter().map(|batch| batch.batch_id).collect()
            }
            AllocationRequest::Fefo {} => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchAllocationInput {
    pub batch_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeliverItem {
    pub received_quantity: i32,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CancelRequest {
    pub reason: String,
}
