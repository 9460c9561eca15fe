use uuid::Uuid;

/// Every way a transfer operation can fail. A failed operation writes
/// nothing.
#[derive(thiserror::Error, Debug)]
pub enum TransferError {
    #[error("invalid transfer request: {0}")]
    InvalidTransferRequest(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("cannot {action} an item that is {from}")]
    InvalidTransition {
        action: &'static str,
        from: &'static str,
    },
    #[error("{field} must be between 1 and {max}, got {value}")]
    QuantityOutOfRange {
        field: &'static str,
        value: i32,
        max: i32,
    },
    #[error("batch allocations add up to {allocated} but {prepared} were prepared")]
    AllocationMismatch { allocated: i64, prepared: i32 },
    #[error("insufficient stock: {requested} requested, {available} available{}", batch_suffix(.batch_id))]
    InsufficientBatchStock {
        batch_id: Option<Uuid>,
        requested: i64,
        available: i64,
    },
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

fn batch_suffix(batch_id: &Option<Uuid>) -> String {
    batch_id
        .map(|id| format!(" in batch {id}"))
        .unwrap_or_default()
}
