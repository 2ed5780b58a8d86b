//! Application layer for Loom.
//!
//! Wires the document store, persistence and the generation manager into
//! services a front end can drive.

pub mod generation_controller;
pub mod workspace_service;

pub use generation_controller::GenerationController;
pub use workspace_service::WorkspaceService;
