use chrono::Duration;
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{
    db::{election::ensure_demo_election_exists, user::ensure_admin_exists},
    mongodb::{ensure_election_id_counter_exists, ensure_indexes_exist, Coll},
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    site_origin: String,
    auth_ttl: u32,
    // secrets
    jwt_secret: String,
    #[serde(default)]
    admin_password: Option<String>,
}

impl Config {
    /// The origin (scheme + host + port) the site is served from.
    /// Post-login redirect targets are validated against it.
    pub fn site_origin(&self) -> &str {
        &self.site_origin
    }

    /// Valid lifetime of auth token cookies.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Secret key used to sign session JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Initial password for the seeded administrator, if configured.
    /// When absent, a random one is generated at seed time.
    pub fn admin_password(&self) -> Option<&str> {
        self.admin_password.as_deref()
    }
}

/// A fairing that loads the application config and puts it in managed
/// state, with control over the error message on failure.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: String,
}

/// A fairing that connects to MongoDB, ensures indexes and seed data
/// exist, and places both a `Client` and a `Database` into managed state.
///
/// Every seed step is idempotent and tolerates concurrent startups of
/// independent server processes against the same store.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let db_config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        let client = match MongoClient::with_uri_str(db_config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&get_database_name());

        // The unique indexes are load-bearing (one vote per user per
        // election); refuse to launch without them.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to create database indexes: {e}");
            return Err(rocket);
        }

        if let Err(e) = ensure_election_id_counter_exists(&Coll::from_db(&db)).await {
            error!("Failed to seed election ID counter: {e}");
            return Err(rocket);
        }

        // Seeding the admin needs the application config; `ConfigFairing`
        // must be attached before this fairing.
        let config = match rocket.state::<Config>() {
            Some(config) => config,
            None => {
                error!("Application config missing; attach ConfigFairing first");
                return Err(rocket);
            }
        };
        if let Err(e) = ensure_admin_exists(&Coll::from_db(&db), config).await {
            error!("Failed to seed default administrator: {e}");
            return Err(rocket);
        }

        if let Err(e) = ensure_demo_election_exists(&client, &db).await {
            error!("Failed to seed demo election: {e}");
            return Err(rocket);
        }
        info!("...database connection online");

        rocket = rocket.manage(client).manage(db);
        Ok(rocket)
    }
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
fn get_database_name() -> String {
    "ballotbox".to_string()
}

/// Get the name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
fn get_database_name() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Config {
        pub fn example() -> Self {
            Self {
                site_origin: "http://127.0.0.1:8000".to_string(),
                auth_ttl: 86400,
                jwt_secret: "test-jwt-secret-do-not-deploy".to_string(),
                admin_password: Some("insecure-test-admin".to_string()),
            }
        }

        pub fn example_other_secret() -> Self {
            Self {
                jwt_secret: "a-different-secret-entirely".to_string(),
                ..Self::example()
            }
        }
    }
}
