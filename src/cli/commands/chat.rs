//! Interactive chat command.
//!
//! Each line is a request for a brief. When the request can't be understood
//! the user is asked to rephrase until the intent budget runs out. Lines
//! starting with `?` are questions for the conversation index.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::NewsreelError;
use crate::intent::MessageSource;
use crate::pipeline::Pipeline;
use crate::request::MediaRequest;
use async_trait::async_trait;
use console::style;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio_util::sync::CancellationToken;

/// Run the interactive chat command.
pub async fn run_chat(settings: Settings, cancel: CancellationToken) -> anyhow::Result<()> {
    let warnings = match preflight::check(Operation::Produce, &settings.credentials()) {
        Ok(warnings) => warnings,
        Err(e) => {
            Output::info("Run 'newsreel doctor' for detailed diagnostics.");
            return Err(e.into());
        }
    };
    for warning in &warnings {
        Output::warning(warning);
    }

    let pipeline = Pipeline::new(settings)?;

    println!("\n{}", style("Newsreel Chat").bold().cyan());
    println!(
        "{}\n",
        style("Ask for a brief (\"AAPL as a podcast\"), '? question' to ask about past research, or 'exit' to quit.")
            .dim()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        prompt("You:");
        let Some(input) = read_line(&mut lines, &cancel).await? else {
            break;
        };
        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        let request = cancel.child_token();

        if let Some(question) = input.strip_prefix('?') {
            let spinner = Output::spinner("Searching past research...");
            let result = pipeline.ask(question.trim(), &request).await;
            spinner.finish_and_clear();
            match result {
                Ok(answer) => Output::answer(&answer),
                Err(e) => report(&e),
            }
            println!();
            continue;
        }

        let mut source = ConsoleSource::new(input.to_string(), &mut lines, request.clone());
        match pipeline.run(&mut source, &request).await {
            Ok(outcome) => Output::outcome(&outcome),
            Err(NewsreelError::Cancelled) if cancel.is_cancelled() => break,
            Err(e) => report(&e),
        }
        println!();
    }

    Ok(())
}

fn prompt(label: &str) {
    print!("{} ", style(label).green().bold());
    std::io::stdout().flush().ok();
}

fn report(err: &NewsreelError) {
    Output::error(&err.user_message());
    tracing::debug!("{}", err);
}

/// Next input line, or `None` on end of input or cancellation.
async fn read_line<R>(lines: &mut Lines<R>, cancel: &CancellationToken) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Ok(None),
        line = lines.next_line() => line,
    }
}

/// Feeds the intent resolver from the console: the line already typed first,
/// then a fresh line for every retry.
struct ConsoleSource<'a, R> {
    first: Option<String>,
    lines: &'a mut Lines<R>,
    cancel: CancellationToken,
}

impl<'a, R> ConsoleSource<'a, R> {
    fn new(first: String, lines: &'a mut Lines<R>, cancel: CancellationToken) -> Self {
        Self {
            first: Some(first),
            lines,
            cancel,
        }
    }
}

#[async_trait]
impl<'a, R> MessageSource for ConsoleSource<'a, R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_message(&mut self, _attempt: usize) -> Option<String> {
        if let Some(first) = self.first.take() {
            return Some(first);
        }
        prompt("Rephrase:");
        match read_line(&mut *self.lines, &self.cancel).await {
            Ok(Some(line)) if !line.trim().is_empty() => Some(line.trim().to_string()),
            _ => None,
        }
    }

    fn report_failure(&mut self, attempt: usize, reason: &str) {
        tracing::debug!("Attempt {} failed: {}", attempt, reason);
        Output::warning("I couldn't tell which format and subject you meant. Try e.g. \"TSLA as a video\".");
    }

    fn confirm(&mut self, request: &MediaRequest) {
        Output::info(&request.summary());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_console_source_reads_rephrasings() {
        let input = Builder::new().read(b"TSLA as a video\n\n").build();
        let mut lines = BufReader::new(input).lines();
        let mut source = ConsoleSource::new("tell me stuff".to_string(), &mut lines, CancellationToken::new());

        assert_eq!(source.next_message(1).await.as_deref(), Some("tell me stuff"));
        assert_eq!(source.next_message(2).await.as_deref(), Some("TSLA as a video"));
        // A blank line gives up.
        assert_eq!(source.next_message(3).await, None);
    }

    #[tokio::test]
    async fn test_console_source_ends_with_input() {
        let mut lines = BufReader::new(Builder::new().build()).lines();
        let mut source = ConsoleSource::new("AAPL".to_string(), &mut lines, CancellationToken::new());

        assert_eq!(source.next_message(1).await.as_deref(), Some("AAPL"));
        assert_eq!(source.next_message(2).await, None);
    }

    #[tokio::test]
    async fn test_read_line_stops_on_cancel() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut lines = BufReader::new(Builder::new().read(b"AAPL\n").build()).lines();

        assert_eq!(read_line(&mut lines, &cancel).await.unwrap(), None);
        // Drain the queued line so the mock sees its script consumed.
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("AAPL"));
    }
}
