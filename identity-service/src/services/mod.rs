pub mod auth;
pub mod database;
pub mod error;
pub mod jwt;
pub mod memory;
pub mod organization;
pub mod policy;
pub mod store;

pub use auth::AuthService;
pub use database::Database;
pub use error::ServiceError;
pub use jwt::{JwtService, TokenError, TokenKind, TokenPair, VerifiedToken};
pub use memory::InMemoryStore;
pub use organization::OrganizationService;
pub use policy::OrgAction;
pub use store::{CredentialStore, TokenStore};
