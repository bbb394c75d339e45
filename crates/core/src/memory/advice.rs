use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::AdviceLabel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Advice {
    pub id: Uuid,
    pub kind: AdviceLabel,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Advice {
    pub fn new(kind: AdviceLabel, content: impl Into<String>) -> Self {
        Self { id: Uuid::new_v4(), kind, content: content.into(), timestamp: Utc::now() }
    }
}

/// Standing operator advice. Grows monotonically and is only ever read.
#[derive(Debug, Default)]
pub struct AdviceBook {
    entries: Vec<Advice>,
}

impl AdviceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, advice: Advice) {
        self.entries.push(advice);
    }

    pub fn of_kind(&self, kind: AdviceLabel) -> impl Iterator<Item = &Advice> {
        self.entries.iter().filter(move |a| a.kind == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Advice> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Methodology advice followed by limitations, as given to the decision engine.
    pub fn render(&self) -> String {
        let mut context = String::from("User advice:\n");
        let methodology: Vec<&str> = self.of_kind(AdviceLabel::Methodology).map(|a| a.content.as_str()).collect();
        if methodology.is_empty() {
            context.push_str("No advice provided\n");
        } else {
            context.push_str(&methodology.join("\n"));
            context.push('\n');
        }

        context.push_str("Limitations\n");
        let limitations: Vec<&str> = self.of_kind(AdviceLabel::Limitation).map(|a| a.content.as_str()).collect();
        if limitations.is_empty() {
            context.push_str("No limitations specified\n");
        } else {
            context.push_str(&limitations.join("\n"));
            context.push('\n');
        }
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_book_renders_placeholders() {
        let book = AdviceBook::new();
        assert_eq!(
            book.render(),
            "User advice:\nNo advice provided\nLimitations\nNo limitations specified\n"
        );
    }

    #[test]
    fn render_groups_by_kind() {
        let mut book = AdviceBook::new();
        book.add(Advice::new(AdviceLabel::Limitation, "You cannot use the knife."));
        book.add(Advice::new(AdviceLabel::Methodology, "Pick up the cup from the top."));
        book.add(Advice::new(AdviceLabel::Methodology, "Use both hands."));
        assert_eq!(
            book.render(),
            "User advice:\nPick up the cup from the top.\nUse both hands.\nLimitations\nYou cannot use the knife.\n"
        );
        assert_eq!(book.len(), 3);
    }
}
