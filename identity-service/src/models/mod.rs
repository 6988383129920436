//! Domain models for identity-service.

pub mod invitation;
pub mod organization;
pub mod token;
pub mod user;

pub use invitation::{Invitation, InvitationResponse, InvitationState, NewInvitation};
pub use organization::{
    NewOrganization, Organization, OrganizationDetail, OrganizationDetailResponse,
    OrganizationResponse,
};
pub use token::TokenRecord;
pub use user::{normalize_email, NewUser, User, UserResponse};
