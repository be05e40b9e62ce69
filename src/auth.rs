use std::future::Future;

use serde::{Deserialize, Serialize};

/// Identity resolved from a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Identity {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            email: None,
            display_name: None,
        }
    }

    /// Attribution string recorded on created/updated records: the email
    /// when the provider supplies one, otherwise the opaque subject id.
    pub fn attribution(&self) -> &str {
        self.email.as_deref().unwrap_or(&self.subject)
    }
}

/// A request identity that passed token verification.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(Identity);

impl AuthenticatedUser {
    pub fn new(identity: Identity) -> Self {
        Self(identity)
    }

    pub fn identity(&self) -> &Identity {
        &self.0
    }

    pub fn subject(&self) -> &str {
        &self.0.subject
    }
}

/// Token verification boundary. Implementations exchange an opaque bearer
/// token for an [`Identity`] or reject it; the board never inspects tokens
/// itself.
pub trait VerifiesIdentity {
    fn verify_token(&self, token: &str) -> impl Future<Output = anyhow::Result<Identity>> + Send;
}

/// Extracts the bearer token from an `Authorization` header value.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    header
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{Identity, bearer_token};

    #[test]
    fn attribution_prefers_email() {
        let mut identity = Identity::new("uid-123");
        assert_eq!(identity.attribution(), "uid-123");

        identity.email = Some("person@example.com".to_string());
        assert_eq!(identity.attribution(), "person@example.com");
    }

    #[test]
    fn bearer_token_requires_scheme() {
        assert_eq!(bearer_token(Some("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(Some("Basic abc")), None);
        assert_eq!(bearer_token(Some("Bearer ")), None);
        assert_eq!(bearer_token(None), None);
    }
}
