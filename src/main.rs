use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    novelbind::logging::init().context("init logging")?;

    let cli = novelbind::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        novelbind::cli::Command::Download(args) => {
            novelbind::download::run(args).await.context("download")?;
        }
        novelbind::cli::Command::Discover(args) => {
            novelbind::crawl::run(args).await.context("discover")?;
        }
        novelbind::cli::Command::Chapter(args) => {
            novelbind::download::run_chapter(args).await.context("chapter")?;
        }
    }

    Ok(())
}
