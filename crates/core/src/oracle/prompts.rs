//! Named prompt templates.
//!
//! Templates ship inside the binary; a configured directory may override any
//! of them by file name.

use std::path::{Path, PathBuf};

use crate::error::PromptError;

pub const SEGMENT_INPUT: &str = "segment_input.txt";
pub const LABEL_INPUT: &str = "label_input.txt";
pub const QUESTION_ABOUT_CONTEXT: &str = "question_about_context.txt";
pub const DECISION_MAKING: &str = "decision_making.txt";
pub const ACT: &str = "act.txt";
pub const MEMORIZE_OBJECT: &str = "memorize_object.txt";

const BUILTIN: &[(&str, &str)] = &[
    (SEGMENT_INPUT, include_str!("../../prompts/segment_input.txt")),
    (LABEL_INPUT, include_str!("../../prompts/label_input.txt")),
    (QUESTION_ABOUT_CONTEXT, include_str!("../../prompts/question_about_context.txt")),
    (DECISION_MAKING, include_str!("../../prompts/decision_making.txt")),
    (ACT, include_str!("../../prompts/act.txt")),
    (MEMORIZE_OBJECT, include_str!("../../prompts/memorize_object.txt")),
];

#[derive(Debug, Clone, Default)]
pub struct PromptStore {
    override_dir: Option<PathBuf>,
}

impl PromptStore {
    pub fn builtin() -> Self {
        Self::default()
    }

    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { override_dir: Some(dir.into()) }
    }

    pub fn override_dir(&self) -> Option<&Path> {
        self.override_dir.as_deref()
    }

    /// Look up a template by file name, preferring the override directory.
    pub fn load(&self, name: &str) -> Result<String, PromptError> {
        if !name.ends_with(".txt") {
            return Err(PromptError::InvalidName(name.to_owned()));
        }
        if let Some(dir) = &self.override_dir {
            let path = dir.join(name);
            if path.is_file() {
                return std::fs::read_to_string(&path).map_err(|e| PromptError::Unreadable {
                    name: name.to_owned(),
                    path,
                    reason: e.to_string(),
                });
            }
        }
        BUILTIN
            .iter()
            .find(|(builtin, _)| *builtin == name)
            .map(|(_, text)| (*text).to_owned())
            .ok_or_else(|| PromptError::NotFound { name: name.to_owned() })
    }
}
