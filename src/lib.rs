pub mod audit;
pub mod auth;
pub mod config;
pub mod export;
pub mod inquiries;
pub mod notify;
pub mod store;
pub mod web;

pub use config::ServiceConfig;
pub use web::{AppState, build_router};
