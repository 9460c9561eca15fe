//! Transfer workflow engine: request creation, the per-item
//! approve/prepare/deliver/cancel lifecycle, batch allocation, aggregate
//! status and the history timeline. Pure logic over loaded rows; the
//! `database::transfers` module and `service` own the SQL side.

pub mod allocator;
pub mod builder;
pub mod code;
pub mod commands;
pub mod context;
pub mod error;
pub mod history;
pub mod state_machine;
pub mod status;
pub mod workflow;

pub use commands::{
    AllocationRequest, ApproveItem, BatchAllocationInput, CancelRequest, DeliverItem, NewTransfer,
    NewTransferItem, PrepareItem,
};
pub use context::{Actor, OrgContext};
pub use error::TransferError;
pub use status::{aggregate_status, InProgressPolicy};
pub use workflow::{Effects, Receipt, Workflow};
