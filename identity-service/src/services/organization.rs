use std::sync::Arc;

use super::error::{trimmed_required, ServiceError};
use super::policy::{authorize, OrgAction};
use super::store::CredentialStore;
use crate::models::{
    normalize_email, Invitation, NewInvitation, NewOrganization, Organization, OrganizationDetail,
};

/// Organization CRUD, invitations and membership.
#[derive(Clone)]
pub struct OrganizationService {
    store: Arc<dyn CredentialStore>,
}

impl OrganizationService {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Every organization in the system. An empty table is reported as an error.
    pub async fn list(&self) -> Result<Vec<Organization>, ServiceError> {
        let orgs = self.store.list_organizations().await?;
        if orgs.is_empty() {
            return Err(ServiceError::NoOrganizations);
        }
        Ok(orgs)
    }

    pub async fn create(
        &self,
        actor_id: i64,
        name: &str,
        description: Option<&str>,
    ) -> Result<Organization, ServiceError> {
        let name = trimmed_required("Name", name)?;
        let org = self
            .store
            .insert_organization(NewOrganization {
                org_name: name.to_string(),
                org_description: description.map(str::to_string),
                owner_user_id: actor_id,
            })
            .await?;

        tracing::info!(org_id = org.org_id, owner_user_id = actor_id, "Organization created");
        Ok(org)
    }

    pub async fn get(&self, actor_id: i64, org_id: i64) -> Result<OrganizationDetail, ServiceError> {
        let organization = self.find(org_id).await?;
        let is_member = self.store.is_member(org_id, actor_id).await?;
        authorize(OrgAction::Read, actor_id, &organization, is_member)?;

        let owner = self
            .store
            .find_user_by_id(organization.owner_user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;
        let members = self.store.list_members(org_id).await?;

        Ok(OrganizationDetail {
            organization,
            owner,
            members,
        })
    }

    pub async fn update(
        &self,
        actor_id: i64,
        org_id: i64,
        name: &str,
        description: Option<&str>,
    ) -> Result<Organization, ServiceError> {
        let name = trimmed_required("Name", name)?;
        let org = self
            .store
            .update_owned_organization(org_id, actor_id, name, description)
            .await?
            .ok_or_else(|| OrgAction::Update.forbidden())?;

        tracing::info!(org_id, actor_id, "Organization updated");
        Ok(org)
    }

    pub async fn delete(&self, actor_id: i64, org_id: i64) -> Result<(), ServiceError> {
        if !self.store.delete_owned_organization(org_id, actor_id).await? {
            return Err(OrgAction::Delete.forbidden());
        }

        tracing::info!(org_id, actor_id, "Organization deleted");
        Ok(())
    }

    /// Record a pending invitation for the user registered under `email`.
    pub async fn invite(
        &self,
        actor_id: i64,
        org_id: i64,
        email: &str,
    ) -> Result<Invitation, ServiceError> {
        let org = self.find(org_id).await?;
        // Checked before the target lookup so non-owners cannot probe emails.
        authorize(OrgAction::Invite, actor_id, &org, false)?;

        let target = self
            .store
            .find_user_by_email(&normalize_email(email))
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        if org.is_owned_by(target.user_id) {
            return Err(ServiceError::ValidationError(
                "The organization owner cannot be invited".to_string(),
            ));
        }
        if self.store.is_member(org_id, target.user_id).await? {
            return Err(ServiceError::AlreadyMember);
        }

        let invitation = self
            .store
            .insert_invitation(NewInvitation {
                org_id,
                invited_user_id: target.user_id,
                invited_by_user_id: actor_id,
            })
            .await?;

        tracing::info!(
            org_id,
            invitation_id = invitation.invitation_id,
            invited_user_id = target.user_id,
            "Invitation recorded"
        );
        Ok(invitation)
    }

    /// Accept the caller's pending invitation to `org_id`, joining the member set.
    pub async fn accept_invitation(
        &self,
        actor_id: i64,
        org_id: i64,
    ) -> Result<Invitation, ServiceError> {
        let pending = self
            .store
            .find_pending_invitation(org_id, actor_id)
            .await?
            .ok_or(ServiceError::InvitationNotFound)?;

        let accepted = self
            .store
            .accept_invitation(pending.invitation_id)
            .await?
            .ok_or(ServiceError::InvitationNotFound)?;

        tracing::info!(org_id, user_id = actor_id, "Invitation accepted");
        Ok(accepted)
    }

    pub async fn list_invitations(&self, actor_id: i64) -> Result<Vec<Invitation>, ServiceError> {
        self.store.list_pending_invitations(actor_id).await
    }

    async fn find(&self, org_id: i64) -> Result<Organization, ServiceError> {
        self.store
            .find_organization(org_id)
            .await?
            .ok_or(ServiceError::OrganizationNotFound)
    }
}
