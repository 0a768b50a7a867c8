use anyhow::Context;
use clap::Parser;
use quote_sync::cli::{Cli, Commands};
use quote_sync::config::{AppConfig, LoggingConfig};
use quote_sync::coordination::{install_signal_handlers, GracefulShutdown};
use quote_sync::services::{serve, PipelineOutcome, QuoteSyncPipeline};
use quote_sync::{CapabilityRegistry, Notification, QuoteStore, QuoteSyncError};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config_dir)
        .with_context(|| format!("failed to load configuration from {}", cli.config_dir))?;
    init_logging(&config.logging);

    let registry = CapabilityRegistry::from_config(&config)?;

    let shutdown = Arc::new(GracefulShutdown::new());
    for resource in registry.managed_resources() {
        shutdown.register(resource).await;
    }
    install_signal_handlers(Arc::clone(&shutdown));

    let result = run(cli.command, &config, &registry, &shutdown).await;

    shutdown.begin_draining();
    shutdown.execute().await;

    if let Err(e) = &result {
        error!(kind = e.kind(), "Exiting with error: {}", e);
    }
    Ok(result?)
}

async fn run(
    command: Option<Commands>,
    config: &AppConfig,
    registry: &CapabilityRegistry,
    shutdown: &Arc<GracefulShutdown>,
) -> quote_sync::Result<()> {
    let pipeline = registry.pipeline();

    match command.unwrap_or(Commands::Serve { bind: None }) {
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());

            let signal = {
                let shutdown = Arc::clone(shutdown);
                async move {
                    let signal = shutdown.wait_for_shutdown().await;
                    info!("Stopping server ({} shutdown)", signal);
                    shutdown.begin_draining();
                }
            };
            serve(&bind, Arc::new(pipeline), signal).await
        }
        Commands::Sync { symbol } => {
            let notification = Notification::new(symbol)?;
            interruptible(shutdown, async {
                report(pipeline.process(&notification).await?);
                Ok::<_, QuoteSyncError>(())
            })
            .await
        }
        Commands::Notify { body, envelope } => {
            interruptible(shutdown, async {
                let outcome = if envelope {
                    pipeline.run_envelope(&body).await?
                } else {
                    pipeline.run(&body).await?
                };
                report(outcome);
                Ok::<_, QuoteSyncError>(())
            })
            .await
        }
        Commands::Quote { symbol } => {
            interruptible(shutdown, print_quote(&pipeline, &symbol)).await
        }
    }
}

/// One-shot work that a signal cuts short; resources are released either way
async fn interruptible(
    shutdown: &GracefulShutdown,
    work: impl Future<Output = quote_sync::Result<()>>,
) -> quote_sync::Result<()> {
    shutdown.run_until_shutdown(work).await.unwrap_or(Ok(()))
}

fn report(outcome: PipelineOutcome) {
    match outcome {
        PipelineOutcome::Updated(event) => {
            println!("updated {}: close {}", event.symbol, event.quote.close);
        }
        PipelineOutcome::Skipped { symbol } => println!("skipped {}: no quote found", symbol),
    }
}

async fn print_quote(pipeline: &QuoteSyncPipeline, symbol: &str) -> quote_sync::Result<()> {
    let store: &Arc<dyn QuoteStore> = pipeline.store();
    let quote = store.get_quote(symbol).await?;
    println!(
        "{} @ {}: open {} high {} low {} close {} volume {}",
        symbol, quote.timestamp, quote.open, quote.high, quote.low, quote.close, quote.volume
    );
    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
