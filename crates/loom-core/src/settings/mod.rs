//! Application settings: provider credentials, model and UI theme.

pub mod model;
pub mod repository;

pub use model::{DEFAULT_MODEL, DEFAULT_THEME, Settings, SettingsUpdate, SharedSettings};
pub use repository::SettingsRepository;
