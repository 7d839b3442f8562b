//! blobgate command-line interface.

use std::path::PathBuf;
use std::process::ExitCode;

use blobgate::config::Settings;
use blobgate::logging::{self, LogFormat};
use blobgate::services::metadata::DEFAULT_PER_PAGE;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "blobgate")]
#[command(about = "Blob storage gateway over database, local, FTP and S3 backends", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (default: ./blobgate.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log format, overriding [logging] format
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a new blob
    Put {
        /// Blob identifier
        id: String,

        /// Base64 payload
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        data: Option<String>,

        /// Read raw bytes from a file instead
        #[arg(long)]
        file: Option<PathBuf>,

        /// Backend for this blob (default: configured default backend)
        #[arg(long)]
        backend: Option<String>,
    },
    /// Fetch a blob and its content
    Get {
        /// Blob identifier
        id: String,

        /// Write decoded bytes to this file instead of printing Base64
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Delete a blob
    Delete {
        /// Blob identifier
        id: String,
    },
    /// List blob records, newest first
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = DEFAULT_PER_PAGE)]
        per_page: u32,
    },
    /// Show the default backend and its resolved options
    Backend,
    /// Report records whose content is missing or unreachable
    Audit,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        },
    };
    logging::init(cli.log_format.unwrap_or(settings.logging.format));

    let result = match cli.command {
        Commands::Put {
            id,
            data,
            file,
            backend,
        } => commands::blob::put(settings, &id, data, file, backend.as_deref()),
        Commands::Get { id, output } => commands::blob::get(settings, &id, output),
        Commands::Delete { id } => commands::blob::delete(settings, &id),
        Commands::List { page, per_page } => commands::blob::list(settings, page, per_page),
        Commands::Backend => commands::admin::backend(settings),
        Commands::Audit => commands::admin::audit(settings),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => commands::report_error(&e),
    }
}
