//! In-memory DreamEcho backend: auth, dream CRUD and the progress event stream.
//!
//! Состояние живёт только в памяти процесса. Используется для локальной разработки
//! и для сквозных тестов клиента.

pub mod domain;
pub mod handlers;
pub mod routes;
pub mod shared;
pub mod system;

pub use routes::configure_routes;
pub use shared::config::Config;
pub use shared::state::AppState;
