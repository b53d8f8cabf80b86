pub mod aggregate;
pub mod progress;
pub mod request;

pub use aggregate::{BlockchainOption, Dream, DreamId, DreamStatus};
pub use progress::DreamProgressEvent;
pub use request::DreamCreationRequest;
