#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

use rocket::{Build, Rocket};

pub mod api;
pub mod ballot;
pub mod config;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod model;

pub use config::Config;

/// Assemble the server: config, database, logging, and the API routes.
/// Database connection and setup run when the returned rocket is ignited.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(config::ConfigFairing)
        .attach(config::DatabaseFairing)
        .attach(logging::LoggerFairing)
        .mount("/", api::routes())
}
