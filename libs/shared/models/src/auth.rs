use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Source of the signed-in patient's identity.
///
/// Booking code only ever asks "who is signed in right now"; sign-up,
/// sign-in and session refresh live with the identity provider.
pub trait IdentityProvider: Send + Sync {
    fn current_user_id(&self) -> Option<String>;

    /// Bearer to forward to the store so row-level security applies.
    fn access_token(&self) -> Option<String> {
        None
    }
}

/// Identity resolved for a single request; anonymous when no bearer was sent.
#[derive(Debug, Clone, Default)]
pub struct RequestIdentity {
    user: Option<User>,
    access_token: Option<String>,
}

impl RequestIdentity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(user: User, access_token: impl Into<String>) -> Self {
        Self {
            user: Some(user),
            access_token: Some(access_token.into()),
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_anonymous(&self) -> bool {
        self.user.is_none()
    }
}

impl From<User> for RequestIdentity {
    fn from(user: User) -> Self {
        Self { user: Some(user), access_token: None }
    }
}

impl IdentityProvider for RequestIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.user.as_ref().map(|user| user.id.clone())
    }

    fn access_token(&self) -> Option<String> {
        self.access_token.clone()
    }
}

impl IdentityProvider for Option<String> {
    fn current_user_id(&self) -> Option<String> {
        self.clone()
    }
}

/// Owned copy of an identity, for work that outlives the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentitySnapshot {
    pub user_id: Option<String>,
    pub access_token: Option<String>,
}

impl IdentitySnapshot {
    pub fn capture(identity: &dyn IdentityProvider) -> Self {
        Self {
            user_id: identity.current_user_id(),
            access_token: identity.access_token(),
        }
    }
}

impl IdentityProvider for IdentitySnapshot {
    fn current_user_id(&self) -> Option<String> {
        self.user_id.clone()
    }

    fn access_token(&self) -> Option<String> {
        self.access_token.clone()
    }
}
