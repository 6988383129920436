//! In-process store used by dev mode (no `DATABASE_URL`) and tests.
//!
//! All state sits behind one mutex, so each trait call is atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use super::error::ServiceError;
use super::store::{CredentialStore, TokenStore};
use crate::models::{
    Invitation, InvitationState, NewInvitation, NewOrganization, NewUser, Organization,
    TokenRecord, User,
};

#[derive(Default)]
struct MemoryState {
    users: BTreeMap<i64, User>,
    organizations: BTreeMap<i64, Organization>,
    /// (org_id, user_id) -> joined at
    memberships: BTreeMap<(i64, i64), DateTime<Utc>>,
    invitations: BTreeMap<i64, Invitation>,
    /// Keyed by access token.
    tokens: HashMap<String, TokenRecord>,
    next_user_id: i64,
    next_org_id: i64,
    next_invitation_id: i64,
}

impl MemoryState {
    fn next_id(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, ServiceError> {
        self.state
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Memory store mutex poisoned: {}", e)))
    }

    /// Number of persisted token records.
    pub fn token_count(&self) -> Result<usize, ServiceError> {
        Ok(self.lock()?.tokens.len())
    }

    /// Look up a token record by its current access token. Inspection only;
    /// request authentication never consults stored tokens.
    pub fn find_by_access_token(
        &self,
        access_token: &str,
    ) -> Result<Option<TokenRecord>, ServiceError> {
        Ok(self.lock()?.tokens.get(access_token).cloned())
    }
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn health_check(&self) -> Result<(), ServiceError> {
        self.lock().map(|_| ())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, ServiceError> {
        let mut state = self.lock()?;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(ServiceError::EmailAlreadyRegistered);
        }

        let user = User {
            user_id: MemoryState::next_id(&mut state.next_user_id),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash.into_string(),
            created_utc: Utc::now(),
        };
        state.users.insert(user.user_id, user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>, ServiceError> {
        Ok(self.lock()?.users.get(&user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, ServiceError> {
        Ok(self.lock()?.users.values().cloned().collect())
    }

    async fn update_password_hash(
        &self,
        user_id: i64,
        password_hash: &str,
    ) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or(ServiceError::UserNotFound)?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn insert_organization(
        &self,
        org: NewOrganization,
    ) -> Result<Organization, ServiceError> {
        let mut state = self.lock()?;
        let org = Organization {
            org_id: MemoryState::next_id(&mut state.next_org_id),
            org_name: org.org_name,
            org_description: org.org_description,
            owner_user_id: org.owner_user_id,
            created_utc: Utc::now(),
        };
        state.organizations.insert(org.org_id, org.clone());
        Ok(org)
    }

    async fn find_organization(&self, org_id: i64) -> Result<Option<Organization>, ServiceError> {
        Ok(self.lock()?.organizations.get(&org_id).cloned())
    }

    async fn list_organizations(&self) -> Result<Vec<Organization>, ServiceError> {
        Ok(self.lock()?.organizations.values().cloned().collect())
    }

    async fn update_owned_organization(
        &self,
        org_id: i64,
        owner_user_id: i64,
        org_name: &str,
        org_description: Option<&str>,
    ) -> Result<Option<Organization>, ServiceError> {
        let mut state = self.lock()?;
        Ok(state
            .organizations
            .get_mut(&org_id)
            .filter(|org| org.is_owned_by(owner_user_id))
            .map(|org| {
                org.org_name = org_name.to_string();
                org.org_description = org_description.map(str::to_string);
                org.clone()
            }))
    }

    async fn delete_owned_organization(
        &self,
        org_id: i64,
        owner_user_id: i64,
    ) -> Result<bool, ServiceError> {
        let mut state = self.lock()?;
        let owned = state
            .organizations
            .get(&org_id)
            .is_some_and(|org| org.is_owned_by(owner_user_id));
        if !owned {
            return Ok(false);
        }

        state.organizations.remove(&org_id);
        state.memberships.retain(|(member_org, _), _| *member_org != org_id);
        state.invitations.retain(|_, inv| inv.org_id != org_id);
        Ok(true)
    }

    async fn list_members(&self, org_id: i64) -> Result<Vec<User>, ServiceError> {
        let state = self.lock()?;
        let mut members: Vec<(DateTime<Utc>, User)> = state
            .memberships
            .iter()
            .filter(|((member_org, _), _)| *member_org == org_id)
            .filter_map(|((_, user_id), joined)| {
                state.users.get(user_id).map(|u| (*joined, u.clone()))
            })
            .collect();
        members.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.user_id.cmp(&b.1.user_id)));
        Ok(members.into_iter().map(|(_, user)| user).collect())
    }

    async fn is_member(&self, org_id: i64, user_id: i64) -> Result<bool, ServiceError> {
        Ok(self.lock()?.memberships.contains_key(&(org_id, user_id)))
    }

    async fn insert_invitation(
        &self,
        invitation: NewInvitation,
    ) -> Result<Invitation, ServiceError> {
        let mut state = self.lock()?;
        let duplicate = state.invitations.values().any(|inv| {
            inv.org_id == invitation.org_id
                && inv.invited_user_id == invitation.invited_user_id
                && inv.is_pending()
        });
        if duplicate {
            return Err(ServiceError::InvitationAlreadyPending);
        }

        let invitation = Invitation {
            invitation_id: MemoryState::next_id(&mut state.next_invitation_id),
            org_id: invitation.org_id,
            invited_user_id: invitation.invited_user_id,
            invited_by_user_id: invitation.invited_by_user_id,
            invitation_state_code: InvitationState::Pending.as_str().to_string(),
            created_utc: Utc::now(),
            accepted_utc: None,
        };
        state
            .invitations
            .insert(invitation.invitation_id, invitation.clone());
        Ok(invitation)
    }

    async fn find_pending_invitation(
        &self,
        org_id: i64,
        user_id: i64,
    ) -> Result<Option<Invitation>, ServiceError> {
        Ok(self
            .lock()?
            .invitations
            .values()
            .find(|inv| inv.org_id == org_id && inv.invited_user_id == user_id && inv.is_pending())
            .cloned())
    }

    async fn list_pending_invitations(
        &self,
        user_id: i64,
    ) -> Result<Vec<Invitation>, ServiceError> {
        Ok(self
            .lock()?
            .invitations
            .values()
            .filter(|inv| inv.invited_user_id == user_id && inv.is_pending())
            .cloned()
            .collect())
    }

    async fn accept_invitation(
        &self,
        invitation_id: i64,
    ) -> Result<Option<Invitation>, ServiceError> {
        let mut state = self.lock()?;
        let now = Utc::now();

        let Some(invitation) = state
            .invitations
            .get_mut(&invitation_id)
            .filter(|inv| inv.is_pending())
        else {
            return Ok(None);
        };
        invitation.invitation_state_code = InvitationState::Accepted.as_str().to_string();
        invitation.accepted_utc = Some(now);
        let invitation = invitation.clone();

        state
            .memberships
            .entry((invitation.org_id, invitation.invited_user_id))
            .or_insert(now);
        Ok(Some(invitation))
    }
}

#[async_trait]
impl TokenStore for InMemoryStore {
    async fn persist_tokens(
        &self,
        user_id: i64,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<TokenRecord, ServiceError> {
        let mut state = self.lock()?;
        if state.tokens.contains_key(access_token) {
            return Err(ServiceError::Database(anyhow::anyhow!(
                "duplicate access token key"
            )));
        }

        let record = TokenRecord::new(user_id, access_token.to_string(), refresh_token.to_string());
        state
            .tokens
            .insert(record.access_token.clone(), record.clone());
        Ok(record)
    }

    async fn find_for_rotation(
        &self,
        user_id: i64,
        refresh_token: &str,
    ) -> Result<Option<TokenRecord>, ServiceError> {
        Ok(self
            .lock()?
            .tokens
            .values()
            .find(|r| r.user_id == user_id && r.refresh_token == refresh_token && r.active_flag)
            .cloned())
    }

    async fn rotate_tokens(
        &self,
        record: &TokenRecord,
        new_access_token: &str,
        new_refresh_token: &str,
    ) -> Result<TokenRecord, ServiceError> {
        let mut state = self.lock()?;
        let current = state
            .tokens
            .get(&record.access_token)
            .filter(|r| r.user_id == record.user_id && r.refresh_token == record.refresh_token)
            .cloned()
            .ok_or(ServiceError::RotationConflict)?;

        state.tokens.remove(&record.access_token);
        let rotated = TokenRecord {
            access_token: new_access_token.to_string(),
            refresh_token: new_refresh_token.to_string(),
            ..current
        };
        state
            .tokens
            .insert(rotated.access_token.clone(), rotated.clone());
        Ok(rotated)
    }
}
