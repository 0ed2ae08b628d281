//! Debug command: generation and synthesis from saved research.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::NewsreelError;
use crate::pipeline::Pipeline;
use crate::request::{Category, MediaFormat, MediaRequest};
use crate::research::{ResearchDocument, ResearchStore, MARKET_STUB, NEWS_STUB};
use console::style;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Run the debug command.
pub async fn run_debug(
    research: Option<String>,
    format: &str,
    category: &str,
    subject: &str,
    settings: Settings,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let format: MediaFormat = format.parse().map_err(NewsreelError::InvalidInput)?;
    let category: Category = category.parse().map_err(NewsreelError::InvalidInput)?;
    let request = MediaRequest::new(format, category, subject)?;

    if let Err(e) = preflight::check(Operation::Produce, &settings.credentials()) {
        Output::info("Run 'newsreel doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let pipeline = Pipeline::new(settings)?;
    let document = load_research(&pipeline, research, &request).await?;
    info!("Using {} research item(s) for {}", document.len(), request.subject());

    let spinner = Output::spinner(&request.summary());
    let result = pipeline.render(document, request, &cancel).await;
    spinner.finish_and_clear();
    let outcome = result?;

    Output::header("Script");
    println!("{}", outcome.content.script);
    if let Some(visual) = &outcome.content.visual_prompt {
        Output::header("Visual prompt");
        println!("{}", style(visual).dim());
    }
    println!();
    Output::outcome(&outcome);

    Ok(())
}

/// Research from an explicit file, else the saved document for the subject,
/// else the category stub.
async fn load_research(
    pipeline: &Pipeline,
    research: Option<String>,
    request: &MediaRequest,
) -> crate::Result<ResearchDocument> {
    if let Some(path) = research {
        let path = Settings::expand_path(&path);
        return Ok(ResearchDocument::Articles(ResearchStore::read(&path).await?));
    }

    if let Some(articles) = pipeline.research_store().load(request.subject()).await? {
        return Ok(ResearchDocument::Articles(articles));
    }

    Output::warning(&format!(
        "No saved research for {}; using placeholder research.",
        request.subject()
    ));
    let stub = match request.category() {
        Category::News => NEWS_STUB,
        _ => MARKET_STUB,
    };
    Ok(ResearchDocument::Stub(stub.to_string()))
}
