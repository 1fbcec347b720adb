use crate::{client::poller::DEFAULT_POLL_INTERVAL, services::azure_blob_store::StorageCredentials};
use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::{env, path::PathBuf, time::Duration};

/// Storage backend the server talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Azure Blob Storage (or an emulator via `--blob-endpoint`).
    Azure,
    /// SQLite + local disk, for development.
    Local,
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub backend: Backend,
    /// `None` when the account name or key is missing; storage-backed
    /// handlers then answer 500 instead of the server refusing to start.
    pub credentials: Option<StorageCredentials>,
    pub blob_endpoint: Option<String>,
    pub upload_container: String,
    pub storage_dir: String,
    pub database_url: String,
    pub max_upload_bytes: usize,
}

/// Settings for the CLI client subcommands.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server: String,
    pub poll_interval: Duration,
    pub knowledge_base: Option<String>,
    pub select: bool,
}

/// What the process was asked to do.
#[derive(Debug)]
pub enum Mode {
    Serve,
    Migrate,
    Watch(ClientConfig),
    Upload(ClientConfig, Vec<PathBuf>),
    CreateKnowledgeBase(ClientConfig, String),
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Knowledge-base document upload service")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Host to bind to (overrides KB_UPLOADER_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides KB_UPLOADER_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Storage backend (overrides KB_UPLOADER_BACKEND)
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// Storage account name (overrides AZURE_STORAGE_ACCOUNT)
    #[arg(long)]
    pub storage_account: Option<String>,

    /// Storage account key, base64 (overrides AZURE_STORAGE_ACCESS_KEY)
    #[arg(long)]
    pub storage_key: Option<String>,

    /// Blob service endpoint (overrides AZURE_STORAGE_BLOB_ENDPOINT)
    #[arg(long)]
    pub blob_endpoint: Option<String>,

    /// Container receiving uploads (overrides UPLOAD_CONTAINER)
    #[arg(long)]
    pub upload_container: Option<String>,

    /// Directory for local-backend payloads (overrides KB_UPLOADER_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Local-backend database URL (overrides KB_UPLOADER_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Largest accepted request body in bytes (overrides KB_UPLOADER_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Run local-backend migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the HTTP API (the default)
    Serve,
    /// Poll the server and print the selected knowledge base's files
    Watch {
        #[command(flatten)]
        client: ClientArgs,

        /// Seconds between polls
        #[arg(long, default_value_t = 30)]
        interval: u64,
    },
    /// Upload documents, then report their status after a short delay
    Upload {
        #[command(flatten)]
        client: ClientArgs,

        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Create a knowledge base
    CreateKnowledgeBase {
        #[command(flatten)]
        connection: ServerArgs,

        /// Display name, e.g. "Project X"
        name: String,

        /// Persist the new knowledge base as the selection for later runs
        #[arg(long)]
        select: bool,
    },
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ServerArgs {
    /// Server base URL (overrides KB_UPLOADER_SERVER)
    #[arg(long)]
    pub server: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ClientArgs {
    #[command(flatten)]
    pub connection: ServerArgs,

    /// Knowledge base to use; defaults to the persisted selection
    #[arg(long = "knowledge-base")]
    pub knowledge_base: Option<String>,

    /// Persist --knowledge-base as the selection for later runs
    #[arg(long, requires = "knowledge_base")]
    pub select: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and the mode.
    pub fn from_env_and_args() -> Result<(Self, Mode)> {
        // Parse CLI once
        let args = Args::parse();
        Self::resolve(args, |key| env::var(key).ok())
    }

    /// Merge parsed arguments over values from `lookup` (the environment in
    /// production).
    pub fn resolve(args: Args, lookup: impl Fn(&str) -> Option<String>) -> Result<(Self, Mode)> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // --- Environment fallback ---
        let env_host = non_empty("KB_UPLOADER_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let env_port = match non_empty("KB_UPLOADER_PORT") {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing KB_UPLOADER_PORT value `{}`", value))?,
            None => 3000,
        };
        let env_backend = match non_empty("KB_UPLOADER_BACKEND") {
            Some(value) => Backend::from_str(&value, true)
                .map_err(|_| anyhow::anyhow!("unknown KB_UPLOADER_BACKEND `{}`", value))?,
            None => Backend::Azure,
        };
        let env_max_upload = match non_empty("KB_UPLOADER_MAX_UPLOAD_BYTES") {
            Some(value) => value
                .parse::<usize>()
                .with_context(|| format!("parsing KB_UPLOADER_MAX_UPLOAD_BYTES value `{}`", value))?,
            None => 100 * 1024 * 1024,
        };

        let account = args
            .storage_account
            .or_else(|| non_empty("AZURE_STORAGE_ACCOUNT"));
        let access_key = args
            .storage_key
            .or_else(|| non_empty("AZURE_STORAGE_ACCESS_KEY"));
        let credentials = match (account, access_key) {
            (Some(account), Some(access_key)) => Some(StorageCredentials {
                account,
                access_key,
            }),
            _ => None,
        };

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            backend: args.backend.unwrap_or(env_backend),
            credentials,
            blob_endpoint: args
                .blob_endpoint
                .or_else(|| non_empty("AZURE_STORAGE_BLOB_ENDPOINT")),
            upload_container: args
                .upload_container
                .or_else(|| non_empty("UPLOAD_CONTAINER"))
                .unwrap_or_else(|| "uploads".into()),
            storage_dir: args
                .storage_dir
                .or_else(|| non_empty("KB_UPLOADER_STORAGE_DIR"))
                .unwrap_or_else(|| "./data/blobs".into()),
            database_url: args
                .database_url
                .or_else(|| non_empty("KB_UPLOADER_DATABASE_URL"))
                .unwrap_or_else(|| "sqlite://./data/meta/blobs.db".into()),
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
        };

        let server = |connection: ServerArgs| {
            connection
                .server
                .or_else(|| non_empty("KB_UPLOADER_SERVER"))
                .unwrap_or_else(|| "http://127.0.0.1:3000".into())
                .trim_end_matches('/')
                .to_string()
        };
        let client = |client: ClientArgs, poll_interval: Duration| ClientConfig {
            server: server(client.connection),
            poll_interval,
            knowledge_base: client.knowledge_base,
            select: client.select,
        };
        let default_interval = DEFAULT_POLL_INTERVAL;

        let mode = match args.command {
            _ if args.migrate => Mode::Migrate,
            None | Some(Command::Serve) => Mode::Serve,
            Some(Command::Watch { client: c, interval }) => {
                Mode::Watch(client(c, Duration::from_secs(interval.max(1))))
            }
            Some(Command::Upload { client: c, files }) => {
                Mode::Upload(client(c, default_interval), files)
            }
            Some(Command::CreateKnowledgeBase {
                connection,
                name,
                select,
            }) => Mode::CreateKnowledgeBase(
                ClientConfig {
                    server: server(connection),
                    poll_interval: default_interval,
                    knowledge_base: None,
                    select,
                },
                name,
            ),
        };

        Ok((cfg, mode))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
