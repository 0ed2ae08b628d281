//! CLI module for Newsreel.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Newsreel - researched market briefs as text, podcast, or video
///
/// Describe what you want in plain language ("AAPL as a video") and Newsreel
/// gathers research, writes the brief, and renders it.
#[derive(Parser, Debug)]
#[command(name = "newsreel")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the web interface
    Web {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "5000")]
        port: u16,
    },

    /// Request briefs interactively; prefix a line with '?' to ask about past research
    Chat,

    /// Generate a brief from saved research without fetching anything
    Debug {
        /// Research document to use (defaults to the saved document for the subject)
        #[arg(short, long)]
        research: Option<String>,

        /// Output format (text, audio, video)
        #[arg(short, long, default_value = "video")]
        format: String,

        /// Request category (market, ticker, news)
        #[arg(long, default_value = "ticker")]
        category: String,

        /// Subject of the brief
        #[arg(short, long, default_value = "AAPL")]
        subject: String,
    },

    /// Ask a question about collected research
    Ask {
        /// The question to ask
        question: String,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
