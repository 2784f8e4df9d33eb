pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod mail;
pub mod models;
pub mod routes;
pub mod rules;
pub mod schema;
pub mod state;
pub mod store;
pub mod uploads;
