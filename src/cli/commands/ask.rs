//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::Pipeline;
use anyhow::Result;
use tokio_util::sync::CancellationToken;

/// Run the ask command.
pub async fn run_ask(question: &str, settings: Settings, cancel: CancellationToken) -> Result<()> {
    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Ask, &settings.credentials()) {
        Output::info("Run 'newsreel doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let pipeline = Pipeline::new(settings)?;

    let spinner = Output::spinner("Searching past research...");
    let result = pipeline.ask(question, &cancel).await;
    spinner.finish_and_clear();

    Output::answer(&result?);
    Ok(())
}
