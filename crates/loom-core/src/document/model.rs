//! Document entity and file-name helpers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::locale::Locale;

/// A named, mutable text buffer.
///
/// `id` never changes after creation; `name` and `content` do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub content: String,
}

impl Document {
    /// Creates a document with a fresh id and the default content for its
    /// extension.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let content = initial_content(&file_extension(&name)).to_string();
        Self {
            id: new_document_id(),
            name,
            content,
        }
    }
}

/// Generates an opaque document id.
pub fn new_document_id() -> String {
    format!("file-{}", Uuid::new_v4())
}

/// Lower-cased extension of `name`, or `txt` when there is none.
pub fn file_extension(name: &str) -> String {
    match name.rfind('.') {
        Some(idx) => name[idx + 1..].to_lowercase(),
        None => "txt".to_string(),
    }
}

/// Content a freshly created document starts with.
pub fn initial_content(extension: &str) -> &'static str {
    match extension {
        "json" => "{}",
        _ => "",
    }
}

/// Name for a copy of `name`: the locale's copy marker goes before the
/// extension (`report.md` -> `report copy.md`).
pub fn duplicate_name(name: &str, locale: Locale) -> String {
    let marker = locale.copy_marker();
    match name.rfind('.') {
        Some(idx) => {
            let (base, extension) = name.split_at(idx);
            format!("{base} {marker}{extension}")
        }
        None => format!("{name} {marker}"),
    }
}
