//! Prompt templates for Newsreel.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use crate::request::{Category, MediaFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub brief: BriefPrompts,
    pub intent: IntentPrompts,
    pub rag: RagPrompts,
}

/// Versioned category x format tables used to compose the brief prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BriefPrompts {
    /// Bumped whenever the wording of the tables changes.
    pub version: u32,
    pub market: String,
    pub ticker: String,
    pub news: String,
    pub text: String,
    pub audio: String,
    pub video: String,
    /// Meta-prompt turning a finished video script into a visual theme.
    pub visual: String,
}

impl Default for BriefPrompts {
    fn default() -> Self {
        Self {
            version: 1,
            market: "Based on the following research articles, summarize if {{subject}} is doing well. ".to_string(),
            ticker: "Based on the following research articles, summarize if {{subject}} is doing well. ".to_string(),
            news: "Based on the following research articles, summarize the state of {{subject}}. ".to_string(),
            text: "Format this summary in the style of a morning brew newsletter.".to_string(),
            audio: "Format this summary as a script for a podcast.".to_string(),
            video: "Format this summary as a script for an informative video.".to_string(),
            visual: r#"You write prompts for an image animation model. Read the video script below and reply with exactly one sentence describing a visual theme that fits its mood and subject.

Rules:
- Describe abstract scenery, motion, colour and lighting only
- The visual must not contain any words, letters, numbers, logos, charts with labels or on-screen text
- Do not mention the script, the company name or any ticker symbol
- Reply with the sentence only"#.to_string(),
        }
    }
}

impl BriefPrompts {
    /// Subject-framing sentence for a category (subject not yet interpolated).
    pub fn category(&self, category: Category) -> &str {
        match category {
            Category::Market => &self.market,
            Category::Ticker => &self.ticker,
            Category::News => &self.news,
        }
    }

    /// Style instructions for a format.
    pub fn format(&self, format: MediaFormat) -> &str {
        match format {
            MediaFormat::Text => &self.text,
            MediaFormat::Audio => &self.audio,
            MediaFormat::Video => &self.video,
        }
    }
}

/// Prompts for extracting a structured request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentPrompts {
    pub tool_description: String,
}

impl Default for IntentPrompts {
    fn default() -> Self {
        Self {
            tool_description: "Classify a request for a financial brief. Pick the output format the user wants \
                (text, audio, or video), whether the subject is the overall market, a single stock ticker, \
                or a news topic, and the subject itself (a ticker symbol such as AAPL for tickers)."
                .to_string(),
        }
    }
}

/// Prompts for answering questions over stored research.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagPrompts {
    pub system: String,
    pub user: String,
}

impl Default for RagPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are a helpful assistant that answers questions about companies and markets using research articles the user has already collected.

Guidelines:
- Answer using only the provided excerpts
- Cite sources by article title in square brackets, e.g. [Apple beats estimates]
- If the excerpts don't contain the answer, say so clearly
- Be concise"#.to_string(),

            user: r#"Question: {{question}}

Relevant research excerpts:

{{context}}

Please answer the question based on the above excerpts."#.to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts, overriding defaults with TOML files found in `custom_dir`.
    pub fn load(custom_dir: Option<&str>) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let brief_path = custom_path.join("brief.toml");
            if brief_path.exists() {
                let content = std::fs::read_to_string(&brief_path)?;
                prompts.brief = toml::from_str(&content)?;
            }

            let intent_path = custom_path.join("intent.toml");
            if intent_path.exists() {
                let content = std::fs::read_to_string(&intent_path)?;
                prompts.intent = toml::from_str(&content)?;
            }

            let rag_path = custom_path.join("rag.toml");
            if rag_path.exists() {
                let content = std::fs::read_to_string(&rag_path)?;
                prompts.rag = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert_eq!(prompts.brief.version, 1);
        for category in Category::ALL {
            assert!(prompts.brief.category(category).contains("{{subject}}"));
        }
        for format in MediaFormat::ALL {
            assert!(!prompts.brief.format(format).is_empty());
        }
        assert!(prompts.brief.visual.contains("must not contain any words"));
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }

    #[test]
    fn test_custom_brief_table_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("brief.toml"),
            "version = 2\nvideo = \"Write a sixty second explainer.\"\n",
        )
        .unwrap();

        let prompts = Prompts::load(dir.path().to_str()).unwrap();
        assert_eq!(prompts.brief.version, 2);
        assert_eq!(prompts.brief.format(MediaFormat::Video), "Write a sixty second explainer.");
        // untouched keys fall back to the defaults
        assert!(prompts.brief.format(MediaFormat::Text).contains("morning brew"));
    }
}
