use serde::{Deserialize, Serialize};

/// Organization-level role. Department access is granted separately through
/// `department_members`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "member_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberRole {
    Member,
    Admin,
    Owner,
}

impl MemberRole {
    /// ADMIN and OWNER act on every department of their organization.
    pub fn is_admin(self) -> bool {
        matches!(self, MemberRole::Admin | MemberRole::Owner)
    }
}
