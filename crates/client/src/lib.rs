//! DreamEcho client: session gate, dream submission, progress stream and reconciliation.

pub mod app;
pub mod domain;
pub mod shared;
pub mod system;

pub use app::AppState;
pub use shared::error::ApiError;
