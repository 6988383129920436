//! Organization model - tenant container with a single owner and a member set.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

use super::{User, UserResponse};

/// Organization entity.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Organization {
    pub org_id: i64,
    pub org_name: String,
    pub org_description: Option<String>,
    pub owner_user_id: i64,
    pub created_utc: DateTime<Utc>,
}

impl Organization {
    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.owner_user_id == user_id
    }
}

/// Fields required to create an organization.
#[derive(Debug, Clone)]
pub struct NewOrganization {
    pub org_name: String,
    pub org_description: Option<String>,
    pub owner_user_id: i64,
}

/// Organization with its owner and members resolved.
#[derive(Debug, Clone)]
pub struct OrganizationDetail {
    pub organization: Organization,
    pub owner: User,
    pub members: Vec<User>,
}

/// Organization response.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrganizationResponse {
    #[schema(example = 1)]
    pub org_id: i64,
    #[schema(example = "Acme")]
    pub name: String,
    #[schema(example = "Rockets and anvils")]
    pub description: Option<String>,
    #[schema(example = 1)]
    pub owner_user_id: i64,
    pub created_utc: DateTime<Utc>,
}

impl From<Organization> for OrganizationResponse {
    fn from(org: Organization) -> Self {
        Self {
            org_id: org.org_id,
            name: org.org_name,
            description: org.org_description,
            owner_user_id: org.owner_user_id,
            created_utc: org.created_utc,
        }
    }
}

/// Organization response with owner and member list.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrganizationDetailResponse {
    #[serde(flatten)]
    pub organization: OrganizationResponse,
    pub owner: UserResponse,
    pub members: Vec<UserResponse>,
}

impl From<OrganizationDetail> for OrganizationDetailResponse {
    fn from(detail: OrganizationDetail) -> Self {
        Self {
            organization: OrganizationResponse::from(detail.organization),
            owner: UserResponse::from(detail.owner),
            members: detail.members.into_iter().map(UserResponse::from).collect(),
        }
    }
}
