use std::fmt;
use std::ops::AddAssign;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of discrete study item to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Flashcard,
    MultipleChoice,
    TrueFalse,
    ClinicalCase,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Flashcard => "flashcard",
            ItemKind::MultipleChoice => "multiple_choice",
            ItemKind::TrueFalse => "true_false",
            ItemKind::ClinicalCase => "clinical_case",
        }
    }

    /// Human phrasing used inside generation prompts.
    pub fn describe(&self) -> &'static str {
        match self {
            ItemKind::Flashcard => "flashcards with a front, back, topic and difficulty",
            ItemKind::MultipleChoice => {
                "multiple-choice questions with four options, a justification and a hint"
            }
            ItemKind::TrueFalse => "true/false questions with a justification",
            ItemKind::ClinicalCase => "case-study questions with a scenario and discussion",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "flashcard" | "flashcards" => Ok(ItemKind::Flashcard),
            "multiple_choice" | "mc" => Ok(ItemKind::MultipleChoice),
            "true_false" | "tf" => Ok(ItemKind::TrueFalse),
            "clinical_case" | "case" => Ok(ItemKind::ClinicalCase),
            other => Err(format!("unknown item kind: {other}")),
        }
    }
}

/// Request to generate a batch of discrete study items.
#[derive(Debug, Clone)]
pub struct ItemRequest {
    pub kind: ItemKind,
    pub count: u32,
    /// Difficulty override propagated into every generated item.
    pub difficulty: Option<String>,
    /// Cache key; multi-batch requests share a context cache under it.
    pub subject_id: Option<String>,
    /// Retrieved or assembled source context.
    pub context: String,
    /// Extra generation instructions (e.g. from a recovery strategy).
    pub instructions: Option<String>,
}

/// Request to generate free-form summary text.
#[derive(Debug, Clone)]
pub struct SummaryRequest {
    pub subject_id: Option<String>,
    pub content: String,
    pub desired_output_tokens: Option<u32>,
}

/// A single generated study item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedItem {
    pub prompt: String,
    pub answer: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
}

/// Aggregated token usage across provider calls, for billing display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cached_tokens: u64,
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cached_tokens += other.cached_tokens;
    }
}

/// Result of an item generation request.
#[derive(Debug, Clone, Serialize)]
pub struct ItemOutput {
    pub items: Vec<GeneratedItem>,
    pub usage: TokenUsage,
    pub batches: u32,
}

/// Result of a summary generation request.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryOutput {
    pub text: String,
    pub usage: TokenUsage,
    pub sections: u32,
}
