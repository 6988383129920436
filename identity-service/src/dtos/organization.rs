use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use super::not_blank;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateOrganizationRequest {
    #[validate(
        length(min = 1, max = 100, message = "Name must be 1-100 characters"),
        custom(function = "not_blank")
    )]
    #[schema(example = "Acme")]
    pub name: String,

    #[validate(length(max = 255, message = "Description must be at most 255 characters"))]
    #[schema(example = "Rockets and anvils")]
    pub description: Option<String>,
}

/// Full replacement of the mutable fields; an absent description clears it.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateOrganizationRequest {
    #[validate(
        length(min = 1, max = 100, message = "Name must be 1-100 characters"),
        custom(function = "not_blank")
    )]
    #[schema(example = "Acme Corp")]
    pub name: String,

    #[validate(length(max = 255, message = "Description must be at most 255 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct InviteRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "bob@example.com")]
    pub email: String,
}
