//! Authorization decisions. Pure functions, no store access.

use uuid::Uuid;

use crate::auth::repo_types::Role;

/// Owner-or-admin rule gating update and delete of an owned resource.
/// Reads and creates are not gated here.
pub fn can_mutate(requester_id: Uuid, requester_role: Role, resource_owner_id: Uuid) -> bool {
    requester_id == resource_owner_id || requester_role == Role::Admin
}

/// Route-level role check. An empty set admits any authenticated role.
pub fn permits(role: Role, required: &[Role]) -> bool {
    required.is_empty() || required.contains(&role)
}
