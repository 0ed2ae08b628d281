//! Configuration settings for Newsreel.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub credentials: CredentialSettings,
    pub completion: CompletionSettings,
    pub speech: SpeechSettings,
    pub animation: AnimationSettings,
    pub market_data: MarketDataSettings,
    pub research: ResearchSettings,
    pub intent: IntentSettings,
    pub output: OutputSettings,
    pub index: IndexSettings,
    pub timeouts: TimeoutSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Root directory holding `research/`, `storage/` and `output/`.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.newsreel".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// API keys. Either may be left empty and supplied through the environment.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CredentialSettings {
    pub openai_api_key: Option<String>,
    pub stability_api_key: Option<String>,
}

/// Resolved credentials handed to capability constructors.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub openai_api_key: Option<String>,
    pub stability_api_key: Option<String>,
}

impl Credentials {
    /// Resolve credentials from settings, falling back to `OPENAI_API_KEY`
    /// and `STABILITY_KEY`.
    pub fn resolve(settings: &CredentialSettings) -> Self {
        Self {
            openai_api_key: non_empty(settings.openai_api_key.clone())
                .or_else(|| non_empty(std::env::var("OPENAI_API_KEY").ok())),
            stability_api_key: non_empty(settings.stability_api_key.clone())
                .or_else(|| non_empty(std::env::var("STABILITY_KEY").ok())),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Completion model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionSettings {
    /// Model used for content generation and intent extraction.
    pub model: String,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo-0125".to_string(),
        }
    }
}

/// Text-to-speech settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechSettings {
    pub model: String,
    pub voice: String,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            model: "tts-1".to_string(),
            voice: "alloy".to_string(),
        }
    }
}

/// Frame rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationSettings {
    /// Base URL of the Stability REST API.
    pub api_base: String,
    /// Text-to-image engine id.
    pub engine: String,
    pub width: u32,
    pub height: u32,
    /// Number of frames rendered per video.
    pub max_frames: u32,
    /// Seed of the first frame; each following frame steps it by one.
    pub seed: u32,
    pub cfg_scale: f32,
    pub steps: u32,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.stability.ai".to_string(),
            engine: "stable-diffusion-v1-6".to_string(),
            width: 512,
            height: 512,
            max_frames: 72,
            seed: 0,
            cfg_scale: 7.0,
            steps: 30,
        }
    }
}

/// Market news lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketDataSettings {
    /// Search endpoint returning a `news` array.
    pub search_url: String,
    /// Number of news items requested per ticker.
    pub news_count: u32,
}

impl Default for MarketDataSettings {
    fn default() -> Self {
        Self {
            search_url: "https://query1.finance.yahoo.com/v1/finance/search".to_string(),
            news_count: 8,
        }
    }
}

/// Research scraping settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchSettings {
    /// CSS class of the primary article content container.
    pub content_class: String,
    /// User agent sent with article requests.
    pub user_agent: String,
    /// Maximum article pages fetched at once.
    pub max_concurrent_fetches: usize,
}

impl Default for ResearchSettings {
    fn default() -> Self {
        Self {
            content_class: "caas-body".to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            max_concurrent_fetches: 4,
        }
    }
}

/// Intent resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentSettings {
    /// Attempts before giving up on a request (clamped to 1..=10).
    pub max_attempts: usize,
}

impl Default for IntentSettings {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl IntentSettings {
    pub fn attempts(&self) -> usize {
        self.max_attempts.clamp(1, 10)
    }
}

/// Media output settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OutputSettings {
    /// Write each run into its own subdirectory of `output/`.
    pub unique_per_request: bool,
}

/// Conversation index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub embedding_model: String,
    pub dimensions: u32,
    /// Model used to answer questions.
    pub model: String,
    /// Maximum passages included as context.
    pub max_context_chunks: usize,
    /// Minimum similarity for a passage to be used.
    pub min_score: f32,
    /// Approximate passage length in characters.
    pub passage_chars: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            embedding_model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            model: "gpt-4o-mini".to_string(),
            max_context_chunks: 6,
            min_score: 0.3,
            passage_chars: 1200,
        }
    }
}

/// Per-capability timeouts in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub completion_secs: u64,
    pub speech_secs: u64,
    /// Applies to each rendered frame.
    pub frame_secs: u64,
    pub market_data_secs: u64,
    pub scrape_secs: u64,
    /// Applies to each ffmpeg/ffprobe invocation.
    pub encode_secs: u64,
    /// Applies to each embedding request of the conversation index.
    pub embedding_secs: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            completion_secs: 120,
            speech_secs: 180,
            frame_secs: 60,
            market_data_secs: 20,
            scrape_secs: 20,
            encode_secs: 600,
            embedding_secs: 60,
        }
    }
}

impl TimeoutSettings {
    pub fn completion(&self) -> Duration {
        Duration::from_secs(self.completion_secs)
    }

    pub fn speech(&self) -> Duration {
        Duration::from_secs(self.speech_secs)
    }

    pub fn frame(&self) -> Duration {
        Duration::from_secs(self.frame_secs)
    }

    pub fn market_data(&self) -> Duration {
        Duration::from_secs(self.market_data_secs)
    }

    pub fn scrape(&self) -> Duration {
        Duration::from_secs(self.scrape_secs)
    }

    pub fn encode(&self) -> Duration {
        Duration::from_secs(self.encode_secs)
    }

    pub fn embedding(&self) -> Duration {
        Duration::from_secs(self.embedding_secs)
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory holding a `brief.toml` that overrides the prompt tables.
    pub custom_dir: Option<String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::NewsreelError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("newsreel")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Directory of persisted research documents.
    pub fn research_dir(&self) -> PathBuf {
        self.data_dir().join("research")
    }

    /// Directory of the persisted conversation index.
    pub fn storage_dir(&self) -> PathBuf {
        self.data_dir().join("storage")
    }

    /// Directory of generated media.
    pub fn output_dir(&self) -> PathBuf {
        self.data_dir().join("output")
    }

    /// Resolved API credentials.
    pub fn credentials(&self) -> Credentials {
        Credentials::resolve(&self.credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [general]
            data_dir = "/srv/newsreel"

            [intent]
            max_attempts = 5
            "#,
        )
        .unwrap();

        assert_eq!(settings.intent.attempts(), 5);
        assert_eq!(settings.completion.model, "gpt-3.5-turbo-0125");
        assert_eq!(settings.research_dir(), PathBuf::from("/srv/newsreel/research"));
        assert_eq!(settings.output_dir(), PathBuf::from("/srv/newsreel/output"));
    }

    #[test]
    fn test_attempts_are_clamped() {
        let mut intent = IntentSettings::default();
        intent.max_attempts = 0;
        assert_eq!(intent.attempts(), 1);
        intent.max_attempts = 50;
        assert_eq!(intent.attempts(), 10);
    }

    #[test]
    fn test_configured_key_wins_over_environment() {
        let creds = Credentials::resolve(&CredentialSettings {
            openai_api_key: Some("sk-config".to_string()),
            stability_api_key: Some("  ".to_string()),
        });
        assert_eq!(creds.openai_api_key.as_deref(), Some("sk-config"));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut settings = Settings::default();
        settings.animation.max_frames = 24;
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.animation.max_frames, 24);
    }
}
