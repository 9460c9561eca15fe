//! Organization-scoped caller context handed to every engine call.

use uuid::Uuid;

use super::error::TransferError;
use crate::models::{ActorSnapshot, MemberRole, Transfer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: MemberRole,
    /// Departments of the current organization the actor is staff of.
    pub department_ids: Vec<Uuid>,
}

impl Actor {
    pub fn snapshot(&self) -> ActorSnapshot {
        ActorSnapshot {
            actor_id: self.user_id,
            actor_name: self.name.clone(),
            actor_email: self.email.clone(),
            actor_role: self.role,
        }
    }

    pub fn staffs(&self, department_id: Uuid) -> bool {
        self.role.is_admin() || self.department_ids.contains(&department_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgContext {
    pub organization_id: Uuid,
    pub actor: Actor,
}

impl OrgContext {
    pub fn new(organization_id: Uuid, actor: Actor) -> Self {
        Self {
            organization_id,
            actor,
        }
    }

    /// Transfers of other organizations do not exist for this caller.
    pub fn ensure_owns(&self, transfer: &Transfer) -> Result<(), TransferError> {
        if transfer.organization_id == self.organization_id {
            Ok(())
        } else {
            Err(TransferError::NotFound("transfer"))
        }
    }

    /// MEMBERs see transfers touching one of their departments; ADMINs see all.
    pub fn can_view(&self, transfer: &Transfer) -> bool {
        transfer.organization_id == self.organization_id
            && (self.actor.staffs(transfer.requesting_department_id)
                || self.actor.staffs(transfer.supplying_department_id))
    }

    pub fn require_department(
        &self,
        department_id: Uuid,
        action: &str,
    ) -> Result<(), TransferError> {
        if self.actor.staffs(department_id) {
            Ok(())
        } else {
            Err(TransferError::PermissionDenied(format!(
                "{action} requires staff access to department {department_id}"
            )))
        }
    }

    pub fn require_any_department(
        &self,
        department_ids: &[Uuid],
        action: &str,
    ) -> Result<(), TransferError> {
        if department_ids.iter().any(|id| self.actor.staffs(*id)) {
            Ok(())
        } else {
            Err(TransferError::PermissionDenied(format!(
                "{action} requires staff access to one of the transfer's departments"
            )))
        }
    }

    pub fn require_admin(&self, action: &str) -> Result<(), TransferError> {
        if self.actor.role.is_admin() {
            Ok(())
        } else {
            Err(TransferError::PermissionDenied(format!(
                "{action} requires the ADMIN or OWNER role"
            )))
        }
    }
}
