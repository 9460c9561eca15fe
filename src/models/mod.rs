pub mod audit;
pub mod inventory;
pub mod rbac;
pub mod transfer;
pub mod user;

pub use audit::AuditEvent;
pub use inventory::{Department, Product, StockBatch};
pub use rbac::MemberRole;
pub use transfer::{
    ActorSnapshot, ItemStatus, Transfer, TransferDetails, TransferHistory, TransferItem,
    TransferItemBatch, TransferItemDetails, TransferPriority, TransferStatus,
};
pub use user::User;
