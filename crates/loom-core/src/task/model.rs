//! Generation task domain model.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::document::file_extension;

/// Format the model is asked to produce.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    Plaintext,
    #[default]
    Markdown,
    Csv,
    Json,
}

impl OutputFormat {
    /// Derives the output format from a document name.
    ///
    /// `txt`, `md`, `csv` and `json` map to their formats; every other
    /// extension falls back to Markdown.
    pub fn from_file_name(name: &str) -> Self {
        match file_extension(name).as_str() {
            "txt" => OutputFormat::Plaintext,
            "md" => OutputFormat::Markdown,
            "csv" => OutputFormat::Csv,
            "json" => OutputFormat::Json,
            _ => OutputFormat::Markdown,
        }
    }
}

/// User configuration for a single generation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GenerationTask {
    /// What the document should be. Goes into the system prompt.
    #[serde(default)]
    pub task_description: String,
    /// Constraints for the output. Goes into the user message.
    #[serde(default)]
    pub requirements: String,
    #[serde(default)]
    pub output_format: OutputFormat,
}

impl GenerationTask {
    pub fn new(
        task_description: impl Into<String>,
        requirements: impl Into<String>,
        output_format: OutputFormat,
    ) -> Self {
        Self {
            task_description: task_description.into(),
            requirements: requirements.into(),
            output_format,
        }
    }

    pub fn with_output_format(mut self, output_format: OutputFormat) -> Self {
        self.output_format = output_format;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_output_format_from_file_name() {
        assert_eq!(OutputFormat::from_file_name("notes.txt"), OutputFormat::Plaintext);
        assert_eq!(OutputFormat::from_file_name("README.MD"), OutputFormat::Markdown);
        assert_eq!(OutputFormat::from_file_name("table.csv"), OutputFormat::Csv);
        assert_eq!(OutputFormat::from_file_name("data.json"), OutputFormat::Json);
        assert_eq!(OutputFormat::from_file_name("diagram.svg"), OutputFormat::Markdown);
        // No extension counts as txt
        assert_eq!(OutputFormat::from_file_name("note"), OutputFormat::Plaintext);
    }

    #[test]
    fn test_output_format_parse_and_display() {
        assert_eq!(OutputFormat::from_str("csv").unwrap(), OutputFormat::Csv);
        assert_eq!(OutputFormat::Plaintext.to_string(), "plaintext");
        assert!(OutputFormat::from_str("yaml").is_err());
    }

    #[test]
    fn test_task_deserializes_with_defaults() {
        let task: GenerationTask = serde_json::from_str(r#"{"requirements":"short"}"#).unwrap();
        assert_eq!(task.task_description, "");
        assert_eq!(task.requirements, "short");
        assert_eq!(task.output_format, OutputFormat::Markdown);
    }
}
