use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use rowpipe::channel::FileChannel;
use rowpipe::config::Settings;
use rowpipe::error::Result;

#[derive(Parser)]
#[command(name = "rowpipe", version, about = "Stream rows of new CSV files onto a topic")]
struct Cli {
    /// Settings file (TOML)
    #[arg(short, long, global = true, env = "ROWPIPE_CONFIG")]
    config: Option<PathBuf>,

    /// Topic to publish to, overrides settings
    #[arg(short, long, global = true)]
    topic: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch a directory and ingest every file created in it
    Watch {
        /// Directory to watch, overrides settings
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
    /// Ingest a single file now and print its summary
    Ingest { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(topic) = cli.topic {
        settings.channel.topic = topic;
    }
    rowpipe::logging::init(&settings.logging.level);

    tokio::fs::create_dir_all(&settings.channel.spool_dir).await?;
    let channel = Arc::new(FileChannel::new(&settings.channel.spool_dir));
    let ingestor = settings.ingestor(settings.publisher(channel));

    match cli.command {
        Command::Watch { dir } => {
            if let Some(dir) = dir {
                settings.watch.directory = dir;
            }
            let abort = ingestor.cancel_token();
            let mut handle = settings.watcher(ingestor).spawn()?;

            tokio::select! {
                res = tokio::signal::ctrl_c() => res?,
                // The loop only ends by itself when the watch is lost.
                res = handle.stopped() => return res,
            }

            tracing::info!("shutting down, waiting for in-flight files (Ctrl-C again to abort them)");
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("aborting in-flight files");
                    abort.cancel();
                }
            });
            handle.shutdown().await?;
        }
        Command::Ingest { file } => {
            let summary = ingestor.process(&file).await?;
            println!(
                "{}: {} lines, {} forwarded, {} rejected, {} delivered, {} failed",
                summary.path.display(),
                summary.lines,
                summary.forwarded,
                summary.rejected,
                summary.delivered,
                summary.failed
            );
        }
    }

    Ok(())
}
