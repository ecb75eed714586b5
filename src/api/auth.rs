use mongodb::bson::doc;
use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::{AuthResponse, AuthToken, AUTH_TOKEN_COOKIE},
            credentials::Credentials,
            redirect::safe_redirect,
        },
        db::user::{verify_against_dummy, NewUser, User},
        mongodb::{is_duplicate_key_error, Coll, Id},
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![register, login, logout]
}

#[post("/auth/register?<next>", data = "<credentials>", format = "json")]
pub async fn register(
    cookies: &CookieJar<'_>,
    next: Option<String>,
    credentials: Json<Credentials>,
    users: Coll<User>,
    new_users: Coll<NewUser>,
    config: &State<Config>,
) -> Result<Json<AuthResponse>> {
    let credentials = credentials.0;

    // Fast path for the common case; the unique username index is the
    // authority when two registrations race.
    let with_username = doc! {
        "username": credentials.username_trimmed(),
    };
    if users.find_one(with_username, None).await?.is_some() {
        info!(
            "Register attempt with existing username: {}",
            credentials.username_trimmed()
        );
        return Err(Error::DuplicateUsername);
    }

    let user: NewUser = credentials.try_into()?;
    let id: Id = match new_users.insert_one(&user, None).await {
        // Safe because the ID comes directly from the database.
        Ok(result) => result.inserted_id.as_object_id().unwrap().into(),
        Err(ref err) if is_duplicate_key_error(err) => return Err(Error::DuplicateUsername),
        Err(err) => return Err(err.into()),
    };
    info!("New user registered: {}", user.username);

    // Registration doubles as login.
    let user = User { id, user };
    cookies.add(AuthToken::for_user(&user).into_cookie(config));

    Ok(Json(AuthResponse::ok(
        "Registration successful. You are now logged in.",
        safe_redirect(next.as_deref(), config.site_origin()),
    )))
}

#[post("/auth/login?<next>", data = "<credentials>", format = "json")]
pub async fn login(
    cookies: &CookieJar<'_>,
    next: Option<String>,
    credentials: Json<Credentials>,
    users: Coll<User>,
    config: &State<Config>,
) -> Result<Json<AuthResponse>> {
    let with_username = doc! {
        "username": credentials.username_trimmed(),
    };

    let user = match users.find_one(with_username, None).await? {
        Some(user) if user.verify_password(&credentials.password) => user,
        Some(_) => {
            info!("Failed login for: {}", credentials.username_trimmed());
            return Err(Error::InvalidCredentials);
        }
        None => {
            // Burn the same hashing work as a real check so unknown
            // usernames are indistinguishable from wrong passwords.
            verify_against_dummy(&credentials.password);
            info!("Failed login for: {}", credentials.username_trimmed());
            return Err(Error::InvalidCredentials);
        }
    };

    info!("User logged in: {}", user.username);
    cookies.add(AuthToken::for_user(&user).into_cookie(config));

    Ok(Json(AuthResponse::ok(
        "Logged in successfully",
        safe_redirect(next.as_deref(), config.site_origin()),
    )))
}

#[delete("/auth")]
pub fn logout(cookies: &CookieJar) -> Status {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}

#[cfg(test)]
mod tests {
    use mongodb::Database;
    use rocket::{
        http::ContentType,
        local::asynchronous::Client,
        serde::json::{json, serde_json},
    };

    use super::*;

    async fn register_user(client: &Client, credentials: &Credentials) -> Status {
        let response = client
            .post("/auth/register")
            .header(ContentType::JSON)
            .body(json!(credentials.clone()).to_string())
            .dispatch()
            .await;
        response.status()
    }

    #[db_test]
    async fn register_creates_user_and_logs_in(client: Client, db: Database) {
        let status = register_user(&client, &Credentials::example()).await;
        assert_eq!(Status::Ok, status);
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());

        // The stored user has a hash, not the password.
        let user = Coll::<User>::from_db(&db)
            .find_one(doc! {"username": "alice"}, None)
            .await
            .unwrap()
            .unwrap();
        assert!(!user.is_admin);
        assert_ne!(user.password_hash, Credentials::example().password);
        assert!(user.verify_password(&Credentials::example().password));
    }

    #[db_test]
    async fn register_rejects_duplicates_and_bad_input(client: Client, db: Database) {
        assert_eq!(Status::Ok, register_user(&client, &Credentials::example()).await);
        let original = Coll::<User>::from_db(&db)
            .find_one(doc! {"username": "alice"}, None)
            .await
            .unwrap()
            .unwrap();

        // Same username again, different password.
        let duplicate = Credentials {
            username: "alice".to_string(),
            password: "other12".to_string(),
        };
        assert_eq!(Status::BadRequest, register_user(&client, &duplicate).await);

        // The first user's password is unaffected.
        let after = Coll::<User>::from_db(&db)
            .find_one(doc! {"username": "alice"}, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(original.password_hash, after.password_hash);

        // Missing fields and weak passwords.
        for (username, password) in [("", "secret1"), ("carol", ""), ("carol", "abc12")] {
            let bad = Credentials {
                username: username.to_string(),
                password: password.to_string(),
            };
            assert_eq!(Status::BadRequest, register_user(&client, &bad).await);
        }
    }

    #[db_test]
    async fn login_failures_are_indistinguishable(client: Client, _db: Database) {
        register_user(&client, &Credentials::example()).await;
        client.delete("/auth").dispatch().await;

        // Wrong password for a real user.
        let response = client
            .post("/auth/login")
            .header(ContentType::JSON)
            .body(json!({"username": "alice", "password": "wrong"}).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
        let wrong_password_body = response.into_string().await.unwrap();

        // Unknown user entirely.
        let response = client
            .post("/auth/login")
            .header(ContentType::JSON)
            .body(json!({"username": "nobody", "password": "x"}).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
        let unknown_user_body = response.into_string().await.unwrap();

        // Same structured failure either way: no user-existence leak.
        assert_eq!(wrong_password_body, unknown_user_body);
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_none());
    }

    #[db_test]
    async fn login_validates_next_target(client: Client, _db: Database) {
        register_user(&client, &Credentials::example()).await;
        client.delete("/auth").dispatch().await;

        // A relative target is honoured.
        let response = client
            .post("/auth/login?next=/elections/3")
            .header(ContentType::JSON)
            .body(json!(Credentials::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let body: AuthResponse =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(body.redirect, "/elections/3");

        // A foreign host falls back to the landing page.
        let response = client
            .post("/auth/login?next=http://evil.example/x")
            .header(ContentType::JSON)
            .body(json!(Credentials::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let body: AuthResponse =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(body.redirect, "/");
    }

    #[db_test]
    async fn logout_clears_session(client: Client, _db: Database) {
        register_user(&client, &Credentials::example()).await;
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());

        let response = client.delete("/auth").dispatch().await;
        assert_eq!(Status::Ok, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_none());

        // Logging out while logged out is fine too.
        let response = client.delete("/auth").dispatch().await;
        assert_eq!(Status::Ok, response.status());
    }
}
