//! Context formatting for answers over research.

use crate::vector_store::SearchResult;

/// A passage used to answer a question.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub subject: String,
    pub title: String,
    pub url: String,
    pub content: String,
    pub score: f32,
}

impl From<SearchResult> for Source {
    fn from(result: SearchResult) -> Self {
        Self {
            subject: result.passage.subject,
            title: result.passage.title,
            url: result.passage.url,
            content: result.passage.content,
            score: result.score,
        }
    }
}

/// Format sources as numbered excerpts for the prompt.
pub fn format_context_for_prompt(sources: &[Source]) -> String {
    sources
        .iter()
        .enumerate()
        .map(|(i, source)| {
            format!(
                "---\n[{}] {} ({})\n{}\n---",
                i + 1,
                source.title,
                source.subject,
                source.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_context_numbers_sources() {
        let sources = vec![
            Source {
                subject: "AAPL".into(),
                title: "Apple beats".into(),
                url: "https://x/1".into(),
                content: "Revenue rose.".into(),
                score: 0.9,
            },
            Source {
                subject: "AAPL".into(),
                title: "Apple guides".into(),
                url: "https://x/2".into(),
                content: "Outlook is soft.".into(),
                score: 0.7,
            },
        ];

        let context = format_context_for_prompt(&sources);
        assert!(context.starts_with("---\n[1] Apple beats (AAPL)\nRevenue rose.\n---"));
        assert!(context.contains("[2] Apple guides"));
    }
}
