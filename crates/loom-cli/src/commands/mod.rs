pub mod context;
pub mod doc;
pub mod generate;
pub mod settings;
pub mod task;
