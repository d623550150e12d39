use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

use sftp_session::logging::init_logging;
use sftp_session::ssh::SshConnector;
use sftp_session::{Args, ClientOptions, Command, FileStore, SftpClient, load_config_with_fallback};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref());

    let (config, source) = load_config_with_fallback(&args.config)?;
    info!("Loaded configuration from {}", source.description());

    let client = SftpClient::connect(
        SshConnector,
        config.connection.clone(),
        ClientOptions::from(&config.session),
    )
    .await?;
    let store = FileStore::new(Arc::new(client), config.session.root_path.clone());

    let result = run(&store, args.command).await;

    if args.print_stats {
        let snapshot = store.client().stats().snapshot();
        eprintln!("{}", serde_json::to_string_pretty(&snapshot)?);
    }
    if let Err(e) = store.client().close().await {
        debug!("Ignoring error while closing session: {}", e);
    }

    result
}

async fn run(store: &FileStore<SshConnector>, command: Command) -> Result<()> {
    let mut stdout = tokio::io::stdout();

    match command {
        Command::List { path } => {
            let entries = store.list(path.as_deref()).await?;
            let json = serde_json::to_string_pretty(&entries)?;
            stdout.write_all(json.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
        }
        Command::Get { file, output } => {
            let data = store.get(&file).await?;
            match output {
                Some(path) => tokio::fs::write(&path, &data)
                    .await
                    .with_context(|| format!("Failed to write '{}'", path.display()))?,
                None => stdout.write_all(&data).await?,
            }
        }
        Command::Put { file, input } => {
            let data = match input {
                Some(path) => tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("Failed to read '{}'", path.display()))?,
                None => {
                    let mut data = Vec::new();
                    tokio::io::stdin().read_to_end(&mut data).await?;
                    data
                }
            };
            let created = store.create(&file, &data).await?;
            let json = serde_json::to_string_pretty(&created)?;
            stdout.write_all(json.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
        }
        Command::Delete { file } => {
            store.delete(&file).await?;
            info!("Deleted {}", file);
        }
        Command::Ping => {
            let cwd = store.client().ping().await?;
            stdout.write_all(format!("{}\n", cwd).as_bytes()).await?;
        }
    }

    stdout.flush().await?;
    Ok(())
}

