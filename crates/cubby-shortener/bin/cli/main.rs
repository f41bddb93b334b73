mod cli;

use crate::cli::{Command, StorageBackendArg, CLI};
use clap::Parser;
use cubby_core::{DeleteTask, ShortKey};
use cubby_shortener::{StorageSettings, UrlStore};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = CLI::try_parse()?;

    let settings = match config.storage {
        StorageBackendArg::InMemory => StorageSettings::InMemory,
        StorageBackendArg::File => {
            let path = config
                .file_path
                .clone()
                .ok_or("file path is required when storage backend is file")?;
            StorageSettings::AppendFile { path }
        }
        StorageBackendArg::Postgres => {
            let dsn = config
                .database_dsn
                .clone()
                .ok_or("database dsn is required when storage backend is postgres")?;
            StorageSettings::Postgres { dsn }
        }
    };

    info!(storage_backend = %config.storage, "opening storage backend");
    let store = UrlStore::new(settings.open().await?);

    match config.command {
        Command::Ping => {
            store.ping().await?;
            println!("ok");
        }
        Command::Shorten {
            original_url,
            owner,
        } => {
            let (key, outcome) = store.shorten(&original_url, &owner).await?;
            if outcome.is_duplicate() {
                info!(key = %key, "url was already shortened");
            }
            println!("{}", key.to_url(&config.base_url));
        }
        Command::Resolve { short_key } => {
            let record = store.get(&ShortKey::new(short_key)).await?;
            println!("{}", record.original_url);
        }
        Command::List { owner } => {
            for record in store.list_owned(&owner).await? {
                println!(
                    "{}\t{}",
                    record.short_key.to_url(&config.base_url),
                    record.original_url
                );
            }
        }
        Command::Delete { owner, short_keys } => {
            for raw in short_keys {
                store
                    .enqueue_delete(DeleteTask {
                        owner_id: owner.clone(),
                        short_key: ShortKey::new(raw),
                    })
                    .await?;
            }
            store.shutdown().await;
        }
    }

    store.close().await?;
    Ok(())
}
