//! Streaming generation: sessions, retry handling and the manager that
//! drives them.

pub mod manager;
mod manager_test;
pub mod retry;
pub mod session;

pub use manager::{GenerationManager, UpdateCallback};
pub use retry::{RetryCoordinator, RetryDecision, RetryPolicy};
pub use session::{GenerationResponse, GenerationSession, SessionOutcome, SessionPhase};
