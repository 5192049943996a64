pub mod admin;
pub mod auth;
pub mod cors;
pub mod inquiries;
pub mod responses;
pub mod router;
pub mod state;

pub use auth::AdminSession;
pub use responses::{ApiError, ApiMessage, store_failure};
pub use router::build_router;
pub use state::AppState;
