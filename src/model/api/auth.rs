use std::ops::Deref;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use mongodb::Database;
use rocket::{
    http::{Cookie, SameSite, Status},
    outcome::try_outcome,
    request::{FromRequest, Outcome, Request},
    time::Duration,
    State,
};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::config::Config;
use crate::error::Error;
use crate::model::{
    db::user::User,
    mongodb::{Coll, Id},
};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// Privilege levels. Admins can do everything voters can.
#[derive(
    Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Serialize_repr, Deserialize_repr,
)]
#[repr(u8)]
pub enum Rights {
    Voter = 0,
    Admin = 1,
}

/// An authentication token representing a logged-in principal.
///
/// Issued at login as a JWT inside an HttpOnly cookie; every protected
/// route resolves it back to a live user via the request guard below.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthToken {
    pub id: Id,
    #[serde(rename = "rgt")]
    pub rights: Rights,
}

impl AuthToken {
    /// Create a token for the given user, with rights matching their
    /// admin flag.
    pub fn for_user(user: &User) -> Self {
        Self {
            id: user.id,
            rights: if user.is_admin {
                Rights::Admin
            } else {
                Rights::Voter
            },
        }
    }

    /// Does this token permit operations requiring the given rights?
    pub fn permits(&self, target: Rights) -> bool {
        self.rights >= target
    }

    /// Serialize this token into an expiring session cookie.
    #[allow(clippy::missing_panics_doc)]
    pub fn into_cookie(self, config: &Config) -> Cookie<'static> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };

        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
        .expect("JWT encoding is infallible with default settings");

        Cookie::build(AUTH_TOKEN_COOKIE, token)
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish()
    }

    /// Deserialize and validate a token from a cookie. Fails on bad
    /// signatures and on expired tokens.
    pub fn from_cookie(cookie: &Cookie<'_>, config: &Config) -> Result<Self, Error> {
        let token = jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims>| claims.claims.token)?;
        Ok(token)
    }
}

/// Cookie claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    token: AuthToken,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthToken {
    type Error = Error;

    /// Resolve the session cookie to a live principal.
    ///
    /// A missing, malformed, or expired cookie, and a token for a user
    /// that no longer exists, all fail with 401; the catcher turns that
    /// into a login redirect for browser-facing paths.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        let cookie = match req.cookies().get(AUTH_TOKEN_COOKIE) {
            Some(cookie) => cookie,
            None => {
                return Outcome::Failure((Status::Unauthorized, Error::AuthenticationRequired))
            }
        };
        let token = match Self::from_cookie(cookie, config) {
            Ok(token) => token,
            Err(_) => {
                return Outcome::Failure((Status::Unauthorized, Error::AuthenticationRequired))
            }
        };

        // The token must still correspond to an existing user.
        let db = req.guard::<&State<Database>>().await.unwrap();
        match Coll::<User>::from_db(db).find_one(token.id.as_doc(), None).await {
            Ok(Some(_)) => Outcome::Success(token),
            Ok(None) => Outcome::Failure((Status::Unauthorized, Error::AuthenticationRequired)),
            Err(err) => Outcome::Failure((Status::InternalServerError, err.into())),
        }
    }
}

/// An [`AuthToken`] whose principal holds administrator rights, verified
/// against the current database record rather than just the token.
pub struct AdminToken(AuthToken);

impl Deref for AdminToken {
    type Target = AuthToken;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminToken {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let token = try_outcome!(req.guard::<AuthToken>().await);
        if !token.permits(Rights::Admin) {
            return Outcome::Failure((Status::Forbidden, Error::Forbidden));
        }

        // Rights may have been revoked since the token was issued.
        let db = req.guard::<&State<Database>>().await.unwrap();
        match Coll::<User>::from_db(db).find_one(token.id.as_doc(), None).await {
            Ok(Some(user)) if user.is_admin => Outcome::Success(AdminToken(token)),
            Ok(_) => Outcome::Failure((Status::Forbidden, Error::Forbidden)),
            Err(err) => Outcome::Failure((Status::InternalServerError, err.into())),
        }
    }
}

/// Response body for successful register/login calls.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub status: String,
    pub message: String,
    /// Where the client should navigate next; the validated `next`
    /// target, or the default landing page.
    pub redirect: String,
}

impl AuthResponse {
    pub fn ok(message: impl Into<String>, redirect: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
            redirect: redirect.into(),
        }
    }
}
