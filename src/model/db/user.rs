use std::ops::{Deref, DerefMut};

use argon2::Config as HashConfig;
use mongodb::bson::doc;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Result;
use crate::model::mongodb::{is_duplicate_key_error, Coll, Id};

/// Well-known username of the seeded administrator account.
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";

/// A syntactically valid encoded hash that no password matches. Unknown
/// usernames are verified against this so that a failed login costs the
/// same work whether or not the user exists.
const DUMMY_PASSWORD_HASH: &str =
    "$argon2i$v=19$m=4096,t=3,p=1$AAAAAAAAAAAAAAAAAAAAAA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Core user data, as stored in the database.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCore {
    pub username: String,
    pub password_hash: String,
    pub is_admin: bool,
}

impl UserCore {
    /// Create a user by hashing the given plaintext password with a fresh
    /// random salt. The plaintext is never stored.
    pub fn with_password(username: impl Into<String>, password: &str, is_admin: bool) -> Result<Self> {
        // 16 bytes of salt is the recommended size for argon2.
        let mut salt = [0_u8; 16];
        rand::thread_rng().fill(&mut salt);
        let password_hash = argon2::hash_encoded(password.as_bytes(), &salt, &HashConfig::default())?;
        Ok(Self {
            username: username.into(),
            password_hash,
            is_admin,
        })
    }

    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        // Unwrap safe: users are only ever created via `with_password`, so
        // the stored hash is always a well-formed encoding.
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap()
    }
}

/// Burn the same hashing work as a real verification without revealing
/// anything; always returns false.
pub fn verify_against_dummy<T: AsRef<[u8]>>(password: T) -> bool {
    argon2::verify_encoded(DUMMY_PASSWORD_HASH, password.as_ref()).unwrap_or(false)
}

/// A user without an ID.
pub type NewUser = UserCore;

/// A user from the database, with its unique ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub user: UserCore,
}

impl Deref for User {
    type Target = UserCore;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl DerefMut for User {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.user
    }
}

/// Ensure the default administrator account exists.
///
/// Idempotent, and safe to race from multiple processes: the unique
/// username index arbitrates, and losing the race counts as success.
/// The initial password comes from the `admin_password` config secret if
/// set; otherwise a random one is generated and logged once so the
/// operator can collect it. Either way it should be changed after first
/// login.
pub async fn ensure_admin_exists(users: &Coll<NewUser>, config: &Config) -> Result<()> {
    let filter = doc! {
        "username": DEFAULT_ADMIN_USERNAME,
    };
    if users.find_one(filter, None).await?.is_some() {
        return Ok(());
    }

    let password = match config.admin_password() {
        Some(password) => password.to_string(),
        None => {
            let generated: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(16)
                .map(char::from)
                .collect();
            warn!(
                "Generated initial password for '{}': {} (change it after first login)",
                DEFAULT_ADMIN_USERNAME, generated
            );
            generated
        }
    };

    let admin = UserCore::with_password(DEFAULT_ADMIN_USERNAME, &password, true)?;
    match users.insert_one(admin, None).await {
        Ok(_) => info!("Created default administrator '{}'", DEFAULT_ADMIN_USERNAME),
        // Another process created it concurrently.
        Err(ref err) if is_duplicate_key_error(err) => {}
        Err(err) => return Err(err.into()),
    }
    Ok(())
}


/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl UserCore {
        pub fn example() -> Self {
            Self::with_password("voter1", "hunter22", false).unwrap()
        }

        pub fn example_admin() -> Self {
            Self::with_password("returning-officer", "dontuseinprod", true).unwrap()
        }
    }
}
