pub mod capture;
pub mod engine;
pub mod errors;
pub mod faces;
pub mod identity;
pub mod images;

pub use engine::{AuthDecision, AuthEngine, RegisterOutcome};
pub use errors::{AppError, AppResult};
