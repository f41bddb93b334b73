use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const STORAGE_BACKEND_ENV: &str = "CUBBY_STORAGE_BACKEND";
pub const DATABASE_DSN_ENV: &str = "CUBBY_DATABASE_DSN";
pub const FILE_PATH_ENV: &str = "CUBBY_FILE_PATH";
pub const BASE_URL_ENV: &str = "CUBBY_BASE_URL";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "file")]
    File,
    #[value(name = "postgres")]
    Postgres,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::File => write!(f, "file"),
            StorageBackendArg::Postgres => write!(f, "postgres"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "cubby")]
pub struct CLI {
    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = DATABASE_DSN_ENV, required_if_eq("storage", "postgres"))]
    pub database_dsn: Option<String>,

    #[arg(long, env = FILE_PATH_ENV, required_if_eq("storage", "file"))]
    pub file_path: Option<PathBuf>,

    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Checks that the configured backend is reachable.
    Ping,
    /// Shortens one URL and prints its short form.
    Shorten {
        original_url: String,
        #[arg(long, default_value = "")]
        owner: String,
    },
    /// Resolves a short key back to its original URL.
    Resolve { short_key: String },
    /// Lists every record an owner has saved.
    List { owner: String },
    /// Queues short keys for soft deletion and waits for the flush.
    Delete {
        owner: String,
        #[arg(required = true)]
        short_keys: Vec<String>,
    },
}
