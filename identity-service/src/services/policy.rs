//! Organization authorization rules.
//!
//! Stateless: each check sees the acting user, the target organization and
//! whether the actor is in its member set. Ownership does not imply membership.

use super::error::ServiceError;
use crate::models::Organization;

/// Operations gated on an existing organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrgAction {
    Read,
    Update,
    Delete,
    Invite,
}

impl OrgAction {
    fn denial(&self) -> &'static str {
        match self {
            OrgAction::Read => "Not authorized to view this organization",
            OrgAction::Update => "Not authorized to update this organization",
            OrgAction::Delete => "Not authorized to delete this organization",
            OrgAction::Invite => "Only the organization owner can invite users",
        }
    }

    /// Also returned by update/delete when nothing owned by the caller
    /// matches, so missing and not-owned look the same.
    pub fn forbidden(&self) -> ServiceError {
        ServiceError::Forbidden(self.denial())
    }
}

/// Whether `actor_id` may perform `action` on `org`.
pub fn is_allowed(action: OrgAction, actor_id: i64, org: &Organization, is_member: bool) -> bool {
    match action {
        OrgAction::Read => org.is_owned_by(actor_id) || is_member,
        OrgAction::Update | OrgAction::Delete | OrgAction::Invite => org.is_owned_by(actor_id),
    }
}

pub fn authorize(
    action: OrgAction,
    actor_id: i64,
    org: &Organization,
    is_member: bool,
) -> Result<(), ServiceError> {
    if is_allowed(action, actor_id, org, is_member) {
        Ok(())
    } else {
        tracing::debug!(
            actor_id,
            org_id = org.org_id,
            action = ?action,
            "Organization access denied"
        );
        Err(action.forbidden())
    }
}
