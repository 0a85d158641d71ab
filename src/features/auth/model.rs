use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Caller identity established by a verified bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

impl AuthenticatedUser {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }

    /// Whether this user owns a resource with the given owner reference
    pub fn owns(&self, owner_user_id: Option<Uuid>) -> bool {
        owner_user_id == Some(self.user_id)
    }
}

/// JWT claims issued to signed-in users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: u64,
    pub iat: u64,
    pub typ: String,
}

pub const ACCESS_TOKEN_TYPE: &str = "access";
