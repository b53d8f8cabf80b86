pub mod api;
pub mod events;
pub mod service;
pub mod store;

pub use events::ProgressStream;
pub use service::{DreamService, DreamUpdate, GenerationFollower, GenerationOutcome};
pub use store::{DreamSnapshot, DreamStore};
