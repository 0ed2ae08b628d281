//! Configuration module for Newsreel.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{BriefPrompts, IntentPrompts, Prompts, RagPrompts};
pub use settings::{
    AnimationSettings, CompletionSettings, CredentialSettings, Credentials, GeneralSettings,
    IndexSettings, IntentSettings, MarketDataSettings, OutputSettings, PromptSettings,
    ResearchSettings, Settings, SpeechSettings, TimeoutSettings,
};
