//! Adaptive Translation - self-training recipe translation memory

use adaptive_translation::cli;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // WARN by default; --verbose adds engine info logs; RUST_LOG overrides
    let level = if cli.verbose { tracing::Level::INFO } else { tracing::Level::WARN };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(level.into())
        )
        .init();

    cli::run(cli).await
}
