//! Signed-in user identity as reported by the identity provider.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// User profile owned by the identity provider.
///
/// The session layer only observes identities; it never creates or edits them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Identity {
    /// Provider-issued user ID (also the owner ID of remote records)
    pub uid: String,
    /// Display name, if the user set one
    pub display_name: Option<String>,
    /// Email address
    pub email: Option<String>,
    /// Profile picture URL
    pub photo_url: Option<String>,
    /// When the account was created (RFC 3339)
    pub created_at: Option<String>,
}

impl Identity {
    /// Create an identity with only a user ID.
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: None,
            email: None,
            photo_url: None,
            created_at: None,
        }
    }

    /// Name to show for this user, falling back to the email address.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .or(self.email.as_deref())
            .unwrap_or("User Name")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_prefers_display_name() {
        let mut identity = Identity::new("uid-1");
        assert_eq!(identity.label(), "User Name");

        identity.email = Some("a@example.com".to_string());
        assert_eq!(identity.label(), "a@example.com");

        identity.display_name = Some(String::new());
        assert_eq!(identity.label(), "a@example.com");

        identity.display_name = Some("Dr. Rao".to_string());
        assert_eq!(identity.label(), "Dr. Rao");
    }
}
