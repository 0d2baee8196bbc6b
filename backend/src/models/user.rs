use chrono::{DateTime, Utc};
use serde::Serialize;

/// Local user record, provisioned on first successful authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    /// Subject ID from the identity provider. Never changes after creation.
    pub id: String,
    /// Email from the provider token, or from an explicit profile update
    pub email: Option<String>,
    /// When the user was first provisioned
    pub created_at: DateTime<Utc>,
    /// When the record was last modified
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build a fresh record with both timestamps set to now.
    pub fn new(id: impl Into<String>, email: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            email: email.filter(|e| !e.is_empty()),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_timestamps_match() {
        let user = User::new("u1", Some("a@x.com".to_string()));
        assert_eq!(user.id, "u1");
        assert_eq!(user.email.as_deref(), Some("a@x.com"));
        assert_eq!(user.created_at, user.updated_at);
    }

    #[test]
    fn test_new_user_empty_email_is_none() {
        let user = User::new("u1", Some(String::new()));
        assert!(user.email.is_none());
    }
}
