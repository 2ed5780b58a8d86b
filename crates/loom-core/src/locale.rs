//! User-facing strings that vary with the interface language.
//!
//! Prompts and derived file names are written in the user's language, so the
//! store and the prompt assembler both take a [`Locale`].

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::task::OutputFormat;

/// Interface language.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Locale {
    /// Simplified Chinese.
    #[default]
    Zh,
    /// English.
    En,
}

impl Locale {
    /// Marker inserted before the extension of a duplicated document name.
    pub fn copy_marker(&self) -> &'static str {
        match self {
            Locale::Zh => "副本",
            Locale::En => "copy",
        }
    }

    pub fn system_preamble(&self) -> &'static str {
        match self {
            Locale::Zh => {
                "你是一个专业的内容生成助手，擅长根据用户的要求生成高质量的文档内容。"
            }
            Locale::En => {
                "You are a professional content generation assistant who produces high-quality documents from the user's requirements."
            }
        }
    }

    pub fn task_label(&self) -> &'static str {
        match self {
            Locale::Zh => "任务描述: ",
            Locale::En => "Task description: ",
        }
    }

    pub fn requirements_label(&self) -> &'static str {
        match self {
            Locale::Zh => "要求: ",
            Locale::En => "Requirements: ",
        }
    }

    pub fn context_heading(&self) -> &'static str {
        match self {
            Locale::Zh => "上下文文件:",
            Locale::En => "Context files:",
        }
    }

    /// Human-readable name of an output format.
    pub fn format_label(&self, format: OutputFormat) -> &'static str {
        match (self, format) {
            (Locale::Zh, OutputFormat::Plaintext) => "纯文本",
            (Locale::En, OutputFormat::Plaintext) => "Plain text",
            (_, OutputFormat::Markdown) => "Markdown",
            (_, OutputFormat::Csv) => "CSV",
            (_, OutputFormat::Json) => "JSON",
        }
    }

    /// Closing instruction asking for raw output in `format`.
    pub fn output_instruction(&self, format: OutputFormat) -> String {
        let label = self.format_label(format);
        match self {
            Locale::Zh => format!(
                "请以{label}格式输出结果，直接输出文件内容，不要将内容放置在代码块中，除内容外不包含其他任何信息。"
            ),
            Locale::En => format!(
                "Output the result in {label} format. Output the file content directly, do not wrap it in code blocks, and include nothing besides the content."
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_parse_locale() {
        assert_eq!(Locale::from_str("en").unwrap(), Locale::En);
        assert_eq!(Locale::from_str("zh").unwrap(), Locale::Zh);
        assert!(Locale::from_str("fr").is_err());
        assert_eq!(Locale::default(), Locale::Zh);
    }

    #[test]
    fn test_output_instruction_names_format() {
        let zh = Locale::Zh.output_instruction(OutputFormat::Markdown);
        assert!(zh.contains("Markdown"));
        assert!(zh.contains("代码块"));

        let en = Locale::En.output_instruction(OutputFormat::Plaintext);
        assert!(en.contains("Plain text"));
        assert!(en.contains("code blocks"));
    }
}
