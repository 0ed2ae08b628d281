//! Newsreel - researched market briefs as text, podcast, or video
//!
//! Newsreel turns a plain-language request ("AAPL as a video") into a short
//! market brief. It gathers research, writes a script with a language model,
//! and renders it as a text file, a narrated MP3, or a narrated, looped
//! animation. Collected research can be queried afterwards.
//!
//! # Architecture
//!
//! - `request` - The resolved request passed between stages
//! - `intent` - Free text to a request, with bounded retries
//! - `research` - Article discovery, scraping and persistence
//! - `generation` - Prompt tables to script and visual prompt
//! - `synthesis` - Text, speech and video artifacts
//! - `conversation` - Question answering over collected research
//! - `capability` - Narrow traits over external services and their adapters
//! - `embedding` / `vector_store` - Retrieval index building blocks
//! - `pipeline` - Stage coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use newsreel::config::Settings;
//! use newsreel::pipeline::Pipeline;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let pipeline = Pipeline::new(settings)?;
//!
//!     let outcome = pipeline
//!         .run_message("AAPL as a podcast", &CancellationToken::new())
//!         .await?;
//!     println!("Wrote {}", outcome.artifact.path.display());
//!
//!     Ok(())
//! }
//! ```

pub mod capability;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod intent;
pub mod openai;
pub mod pipeline;
pub mod request;
pub mod research;
pub mod synthesis;
pub mod vector_store;

pub use error::{NewsreelError, Result};
