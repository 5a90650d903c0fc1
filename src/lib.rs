#![doc = "The `tasks_app` library crate."]
#![doc = ""]
#![doc = "Accounts with email verification and password reset, per-user task tracking"]
#![doc = "and a read-through cache of task listings. The binary (`main.rs`) wires these"]
#![doc = "modules into an actix-web server; the integration tests build the same app."]

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod mail;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;
pub mod tasks;

pub use crate::error::AppError;
pub use crate::state::AppState;
