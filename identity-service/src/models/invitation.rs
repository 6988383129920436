//! Organization invitation model.
//!
//! An invitation is pending until the invited user accepts it; acceptance is
//! what adds the membership row.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

/// Invitation state codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvitationState {
    Pending,
    Accepted,
}

impl InvitationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationState::Pending => "pending",
            InvitationState::Accepted => "accepted",
        }
    }
}

/// Invitation entity.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Invitation {
    pub invitation_id: i64,
    pub org_id: i64,
    pub invited_user_id: i64,
    pub invited_by_user_id: i64,
    pub invitation_state_code: String,
    pub created_utc: DateTime<Utc>,
    pub accepted_utc: Option<DateTime<Utc>>,
}

impl Invitation {
    pub fn is_pending(&self) -> bool {
        self.invitation_state_code == InvitationState::Pending.as_str()
    }
}

/// Fields required to record an invitation.
#[derive(Debug, Clone)]
pub struct NewInvitation {
    pub org_id: i64,
    pub invited_user_id: i64,
    pub invited_by_user_id: i64,
}

/// Invitation response.
#[derive(Debug, Serialize, ToSchema)]
pub struct InvitationResponse {
    pub invitation_id: i64,
    pub org_id: i64,
    pub invited_user_id: i64,
    pub invited_by_user_id: i64,
    #[schema(example = "pending")]
    pub state: String,
    pub created_utc: DateTime<Utc>,
    pub accepted_utc: Option<DateTime<Utc>>,
}

impl From<Invitation> for InvitationResponse {
    fn from(inv: Invitation) -> Self {
        Self {
            invitation_id: inv.invitation_id,
            org_id: inv.org_id,
            invited_user_id: inv.invited_user_id,
            invited_by_user_id: inv.invited_by_user_id,
            state: inv.invitation_state_code,
            created_utc: inv.created_utc,
            accepted_utc: inv.accepted_utc,
        }
    }
}
