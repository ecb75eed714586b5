#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate db_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;

pub use config::Config;

use config::{ConfigFairing, DatabaseFairing};
use logging::LoggerFairing;

/// Assemble the server: config first, then the database (whose fairing
/// also runs the idempotent seed steps), then routes and catchers.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(LoggerFairing)
        .mount("/", api::routes())
        .register("/", api::catchers())
}

/// Ignite a local test client against a throwaway randomly-named
/// database, returning both.
#[cfg(test)]
pub(crate) async fn client_and_db() -> (rocket::local::asynchronous::Client, mongodb::Database) {
    let client = rocket::local::asynchronous::Client::tracked(build())
        .await
        .expect("Failed to ignite test instance");
    let db = client
        .rocket()
        .state::<mongodb::Database>()
        .expect("Database not in managed state")
        .clone();
    (client, db)
}
