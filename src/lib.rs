pub mod api;
pub mod config;
pub mod error;
pub mod narration;
pub mod providers;

pub use api::routes::{create_router, AppState};
pub use config::Config;
pub use error::AppError;
