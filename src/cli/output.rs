//! CLI output formatting utilities.

use crate::conversation::Answer;
use crate::pipeline::PipelineOutcome;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print the result of a pipeline run.
    pub fn outcome(outcome: &PipelineOutcome) {
        Self::success(&format!("Wrote {}", outcome.artifact.path.display()));
        Self::kv("Request", &outcome.request.summary());
        Self::kv("Research items", &outcome.research_items.to_string());
        if let Some(visual) = &outcome.content.visual_prompt {
            Self::kv("Visual theme", visual);
        }
    }

    /// Print an answer with its sources.
    pub fn answer(answer: &Answer) {
        println!("\n{}", answer.text);

        if !answer.sources.is_empty() {
            Self::header("Sources");
            for source in &answer.sources {
                println!(
                    "  {} {} ({}, score: {:.2})",
                    style("*").cyan(),
                    style(&source.title).bold(),
                    source.subject,
                    source.score
                );
                println!("    {}", style(content_preview(&source.url, 120)).dim());
            }
        }
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner_style);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Truncate content with ellipsis.
pub fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        let cut: String = content.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
