use uuid::Uuid;

/// Structured record handed to the audit sink.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub action: &'static str,
    pub resource_type: &'static str,
    pub resource_id: Uuid,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
}
