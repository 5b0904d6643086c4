//! gitblob - blob storage on a GitHub repository
//!
//! This is the command-line entry point. The connection comes from
//! `--config <file>` or from the `GITBLOB_*` environment variables.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use gitblob::storage::BranchName;
use gitblob::{
    logging, BlobStorage, BlobStorageExt, GitHubBlobStorage, GitHubConnection, ListOptions, StorageResult,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Connection file (TOML); the GITBLOB_* environment is used otherwise
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Branch to work on, overrides the configured one
    #[arg(long, global = true)]
    branch: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a folder
    Ls {
        #[arg(default_value = "")]
        folder: String,
        /// Descend into sub-folders
        #[arg(short, long)]
        recursive: bool,
        /// Only names starting with this
        #[arg(long)]
        prefix: Option<String>,
        /// Stop after this many entries
        #[arg(long)]
        max: Option<usize>,
    },
    /// Print a file to stdout
    Cat { path: String },
    /// Write a file from a local file or stdin
    Put {
        path: String,
        file: Option<PathBuf>,
        /// Record the write as an append
        #[arg(long)]
        append: bool,
    },
    /// Delete files, absent ones included
    Rm {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Report whether paths exist
    Exists {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Print blob metadata as JSON
    Stat {
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = logging::init(args.verbose) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    match run(args, &cancel).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn connection(args: &Args) -> StorageResult<GitHubConnection> {
    let mut connection = match &args.config {
        Some(path) => GitHubConnection::load(path)?,
        None => GitHubConnection::from_env()?,
    };
    if let Some(branch) = &args.branch {
        connection.branch = BranchName::new(branch.as_str())?;
    }
    Ok(connection)
}

async fn run(args: Args, cancel: &CancellationToken) -> StorageResult<ExitCode> {
    let storage = GitHubBlobStorage::new(&connection(&args)?)?;
    let mut stdout = tokio::io::stdout();

    match args.command {
        Command::Ls {
            folder,
            recursive,
            prefix,
            max,
        } => {
            let mut options = ListOptions::in_folder(&folder)?.recurse(recursive);
            if let Some(prefix) = prefix {
                options = options.prefix(prefix);
            }
            if let Some(max) = max {
                options = options.max_results(max);
            }

            for blob in storage.list(&options, cancel).await? {
                let size = blob.size.map(|s| s.to_string()).unwrap_or_default();
                let marker = if blob.is_folder() { "d" } else { "f" };
                println!("{} {:>10} {}", marker, size, blob.path);
            }
        }
        Command::Cat { path } => match storage.read_bytes(&path, cancel).await? {
            Some(bytes) => {
                stdout.write_all(&bytes).await?;
                stdout.flush().await?;
            }
            None => {
                eprintln!("{}: not found", path);
                return Ok(ExitCode::FAILURE);
            }
        },
        Command::Put { path, file, append } => {
            let content = match file {
                Some(file) => tokio::fs::read(file).await?,
                None => {
                    let mut buffer = Vec::new();
                    tokio::io::stdin().read_to_end(&mut buffer).await?;
                    buffer
                }
            };
            storage.write(&path, &content, append, cancel).await?;
        }
        Command::Rm { paths } => {
            let paths: Vec<&str> = paths.iter().map(String::as_str).collect();
            storage.delete(&paths, cancel).await?;
        }
        Command::Exists { paths } => {
            let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
            let flags = storage.exists(&refs, cancel).await?;
            for (path, found) in paths.iter().zip(&flags) {
                println!("{}\t{}", path, found);
            }
            if flags.iter().any(|found| !found) {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Stat { paths } => {
            let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
            let blobs = storage.get_blobs(&refs, cancel).await?;
            println!("{}", serde_json::to_string_pretty(&blobs)?);
        }
    }

    Ok(ExitCode::SUCCESS)
}
