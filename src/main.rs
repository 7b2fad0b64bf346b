use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use media_indexer::cli::{self, Cli, Command};
use media_indexer::{Config, EntityKind, Indexer, run_with_shutdown};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(cli.log_level()))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "media-indexer exited with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> media_indexer::Result<()> {
    let config_path = PathBuf::from("config.yaml");
    let config = Config::load(&config_path)?;
    let indexer = Indexer::new(config).await?;

    match cli.command {
        Command::Start => {
            let indexer = std::sync::Arc::new(indexer);
            let api_handle = indexer.spawn_api_server();
            run_with_shutdown((*indexer).clone()).await?;
            api_handle.abort();
            Ok(())
        }
        Command::Download { kind, filter } => {
            cli::require_video_kind(&kind)?;
            let ids = cli::parse_id_filter(&filter)?;
            for id in ids.ids {
                indexer.downloader.ensure_entity_cached(EntityKind::Video, id).await?;
                if let Some(video) = indexer.store.get_video(id).await? {
                    indexer.downloader.enqueue_video_with_images(&video).await?;
                }
            }
            Ok(())
        }
        Command::DownloadRecent { kind } => {
            cli::require_video_kind(&kind)?;
            let job_uuid = media_indexer::indexer::start_quick_or_full(&indexer.jobs, &indexer.store).await?;
            tracing::info!(job_uuid, "started recency index update");
            Ok(())
        }
    }
}
