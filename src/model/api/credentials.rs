use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::db::user::{NewUser, UserCore};

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Raw credentials, received from a user. Never stored directly, since
/// the password is in plaintext.
#[derive(Clone, Deserialize, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// The username as it is stored and matched: surrounding whitespace
    /// stripped, case preserved.
    pub fn username_trimmed(&self) -> &str {
        self.username.trim()
    }
}

impl TryFrom<Credentials> for NewUser {
    type Error = Error;

    /// Convert [`Credentials`] into a new non-admin user by hashing the
    /// password. Enforces the registration rules: both fields present
    /// (whitespace-only counts as missing) and a minimum password length.
    fn try_from(credentials: Credentials) -> Result<Self, Self::Error> {
        let username = credentials.username.trim();
        if username.is_empty() || credentials.password.trim().is_empty() {
            return Err(Error::MissingField);
        }
        if credentials.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(Error::WeakPassword);
        }
        UserCore::with_password(username, &credentials.password, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(username: &str, password: &str) -> Credentials {
        Credentials {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn valid_credentials_become_a_user() {
        let user = NewUser::try_from(credentials("alice", "secret1")).unwrap();
        assert_eq!(user.username, "alice");
        assert!(!user.is_admin);
        assert!(user.verify_password("secret1"));
    }

    #[test]
    fn username_is_trimmed() {
        let user = NewUser::try_from(credentials("  alice  ", "secret1")).unwrap();
        assert_eq!(user.username, "alice");
    }

    #[test]
    fn missing_fields_are_rejected() {
        for (username, password) in [("", "secret1"), ("alice", ""), ("   ", "secret1"), ("alice", "      ")] {
            let err = NewUser::try_from(credentials(username, password)).unwrap_err();
            assert!(matches!(err, Error::MissingField), "{username:?}/{password:?}");
        }
    }

    #[test]
    fn short_passwords_are_rejected() {
        let err = NewUser::try_from(credentials("alice", "abc12")).unwrap_err();
        assert!(matches!(err, Error::WeakPassword));

        // Exactly the minimum is fine.
        assert!(NewUser::try_from(credentials("alice", "abc123")).is_ok());
    }
}
