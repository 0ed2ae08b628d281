//! Newsreel CLI entry point.

use anyhow::Result;
use clap::Parser;
use newsreel::cli::{commands, Cli, Commands, Output};
use newsreel::config::Settings;
use newsreel::NewsreelError;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<NewsreelError>() {
            Some(err) => {
                Output::error(&err.user_message());
                tracing::debug!("{}", err);
                let code = err.exit_code();
                if code != 0 {
                    std::process::exit(code);
                }
            }
            None => {
                Output::error(&format!("{:#}", e));
                std::process::exit(1);
            }
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("newsreel={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let config_path = cli.config.as_deref().map(Settings::expand_path);
    let settings = Settings::load_from(config_path.as_ref())?;

    // Ensure data directories exist
    for dir in [settings.research_dir(), settings.storage_dir(), settings.output_dir()] {
        std::fs::create_dir_all(dir)?;
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight work");
            on_signal.cancel();
        }
    });

    // Execute command
    match cli.command {
        Commands::Web { host, port } => {
            commands::run_web(&host, port, settings, cancel).await?;
        }

        Commands::Chat => {
            commands::run_chat(settings, cancel).await?;
        }

        Commands::Debug {
            research,
            format,
            category,
            subject,
        } => {
            commands::run_debug(research, &format, &category, &subject, settings, cancel).await?;
        }

        Commands::Ask { question } => {
            commands::run_ask(&question, settings, cancel).await?;
        }

        Commands::Doctor => {
            commands::run_doctor(&settings)?;
        }

        Commands::Config { action } => {
            commands::run_config(&action, settings, config_path)?;
        }
    }

    Ok(())
}
