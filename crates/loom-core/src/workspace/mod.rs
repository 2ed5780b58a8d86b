//! Persisted workspace state.

pub mod model;
pub mod repository;

pub use model::WorkspaceSnapshot;
pub use repository::WorkspaceRepository;
