//! Output formatting for CLI commands.

use clap::ValueEnum;
use console::style;

use crate::models::{DifficultyTopic, ItemOutput, RetrievalResult, SummaryOutput, TokenUsage};
use crate::services::IngestReport;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub trait Formatter {
    fn search_results(&self, query: &str, results: &[RetrievalResult]) -> String;
    fn items(&self, output: &ItemOutput) -> String;
    fn summary(&self, output: &SummaryOutput) -> String;
    fn difficulties(&self, topics: &[DifficultyTopic]) -> String;
    fn ingest_report(&self, source_id: &str, report: &IngestReport) -> String;
    fn message(&self, message: &str) -> String;
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

fn usage_line(usage: &TokenUsage) -> String {
    format!(
        "tokens: {} in / {} out ({} cached)",
        usage.input_tokens, usage.output_tokens, usage.cached_tokens
    )
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn search_results(&self, query: &str, results: &[RetrievalResult]) -> String {
        if results.is_empty() {
            return format!("No relevant chunks found for: {query}\n");
        }

        let mut out = format!("Results for: {query}\n\n");
        for (i, result) in results.iter().enumerate() {
            out.push_str(&format!(
                "{} {} ({} tokens)\n",
                style(format!("{}.", i + 1)).bold(),
                style(format!("{:.1}%", result.similarity * 100.0)).green(),
                result.token_count
            ));
            let preview: String = result.content.chars().take(200).collect();
            out.push_str(&format!("   {}\n\n", preview.replace('\n', " ")));
        }
        let total: u32 = results.iter().map(|r| r.token_count).sum();
        out.push_str(&format!("{} chunks, {total} tokens\n", results.len()));
        out
    }

    fn items(&self, output: &ItemOutput) -> String {
        let mut out = String::new();
        for (i, item) in output.items.iter().enumerate() {
            out.push_str(&format!(
                "{} {}\n",
                style(format!("Q{}:", i + 1)).bold(),
                item.prompt
            ));
            out.push_str(&format!("    A: {}\n", item.answer));
            if let Some(topic) = &item.topic {
                out.push_str(&format!("    topic: {topic}"));
                if let Some(difficulty) = &item.difficulty {
                    out.push_str(&format!(", difficulty: {difficulty}"));
                }
                out.push('\n');
            }
            out.push('\n');
        }
        out.push_str(&format!(
            "{} items in {} batch(es), {}\n",
            output.items.len(),
            output.batches,
            usage_line(&output.usage)
        ));
        out
    }

    fn summary(&self, output: &SummaryOutput) -> String {
        format!(
            "{}\n\n---\n{} section(s), {}\n",
            output.text,
            output.sections,
            usage_line(&output.usage)
        )
    }

    fn difficulties(&self, topics: &[DifficultyTopic]) -> String {
        if topics.is_empty() {
            return "No unresolved difficulties.\n".to_string();
        }

        let mut out = String::new();
        for topic in topics {
            out.push_str(&format!(
                "{} level {} (streak {}/{})\n",
                style(&topic.topic).bold(),
                topic.level,
                topic.consecutive_correct,
                crate::models::AUTO_RESOLVE_THRESHOLD
            ));
        }
        out
    }

    fn ingest_report(&self, source_id: &str, report: &IngestReport) -> String {
        if report.chunks == 0 {
            return format!("Source {source_id}: no indexable content\n");
        }
        format!(
            "Source {source_id}: {} chunks, ~{} tokens embedded with {}\n",
            report.chunks, report.embedded_tokens, report.embedding_model
        )
    }

    fn message(&self, message: &str) -> String {
        format!("{message}\n")
    }
}

pub struct JsonFormatter;

impl JsonFormatter {
    fn serialize<T: serde::Serialize>(value: &T) -> String {
        serde_json::to_string_pretty(value)
            .map(|s| format!("{s}\n"))
            .unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}\n"))
    }
}

impl Formatter for JsonFormatter {
    fn search_results(&self, _query: &str, results: &[RetrievalResult]) -> String {
        Self::serialize(&results)
    }

    fn items(&self, output: &ItemOutput) -> String {
        Self::serialize(output)
    }

    fn summary(&self, output: &SummaryOutput) -> String {
        Self::serialize(output)
    }

    fn difficulties(&self, topics: &[DifficultyTopic]) -> String {
        Self::serialize(&topics)
    }

    fn ingest_report(&self, _source_id: &str, report: &IngestReport) -> String {
        Self::serialize(report)
    }

    fn message(&self, message: &str) -> String {
        Self::serialize(&serde_json::json!({ "message": message }))
    }
}
