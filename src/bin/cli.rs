//! FileDB CLI
//!
//! Command-line interface for inspecting and editing a FileDB file.

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use filedb::{Config, FileDb, Result, DEFAULT_EXPORT_PATTERN};
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

/// FileDB CLI
#[derive(Parser, Debug)]
#[command(name = "filedb")]
#[command(about = "Store many files inside one paged file")]
#[command(version)]
struct Args {
    /// Database file
    #[arg(short, long, default_value = "./storage.filedb")]
    db: PathBuf,

    /// Max index pages kept in memory
    #[arg(short, long, default_value = "200")]
    cache_pages: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store a file
    Store {
        /// File to store
        file: PathBuf,

        /// Logical name (defaults to the file's name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Write a stored file to stdout or to a path
    Read {
        /// Entry id
        id: Uuid,

        /// Output path (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete an entry
    Delete {
        /// Entry id
        id: Uuid,
    },

    /// List live entries
    List,

    /// Print layout counters
    Info,

    /// Compact the file
    Shrink,

    /// Write every entry to a directory
    Export {
        /// Target directory
        dir: PathBuf,

        /// File name pattern ({id}, {filename}, {extension})
        #[arg(short, long, default_value = DEFAULT_EXPORT_PATTERN)]
        pattern: String,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,filedb=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let read_only = matches!(
        args.command,
        Commands::Read { .. } | Commands::List | Commands::Info | Commands::Export { .. }
    );
    let mut builder = Config::builder()
        .path(&args.db)
        .cache_capacity(args.cache_pages);
    if read_only {
        builder = builder.read_only();
    }
    let mut db = FileDb::open(builder.build())?;

    match args.command {
        Commands::Store { file, name } => {
            let name = name.unwrap_or_else(|| {
                file.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });
            let mut reader = BufReader::new(File::open(&file)?);
            let entry = db.store(&name, &mut reader)?;
            println!("{}", entry.id);
        }
        Commands::Read { id, output } => {
            let found = match output {
                Some(path) => {
                    let mut out = File::create(&path)?;
                    db.read(id, &mut out)?
                }
                None => {
                    let stdout = io::stdout();
                    let mut out = stdout.lock();
                    let found = db.read(id, &mut out)?;
                    out.flush()?;
                    found
                }
            };
            if found.is_none() {
                eprintln!("not found: {}", id);
            }
        }
        Commands::Delete { id } => {
            if !db.delete(id)? {
                eprintln!("not found: {}", id);
            }
        }
        Commands::List => {
            for entry in db.list_files()? {
                println!(
                    "{}\t{}\t{}\t{}",
                    entry.id,
                    entry.file_length,
                    entry.mime_type,
                    entry.full_name()
                );
            }
        }
        Commands::Info => {
            let stats = db.stats()?;
            println!("last page:        {}", stats.last_page_id);
            println!("index pages:      {}", stats.index_pages);
            println!("live entries:     {}", stats.live_entries);
            println!("deleted entries:  {}", stats.deleted_entries);
            println!("free data pages:  {}", stats.free_data_pages);
        }
        Commands::Shrink => {
            let report = db.shrink()?;
            println!(
                "{} entries, last page {} -> {}",
                report.entries, report.last_page_id_before, report.last_page_id_after
            );
        }
        Commands::Export { dir, pattern } => {
            for path in db.export(&dir, &pattern)? {
                println!("{}", path.display());
            }
        }
    }

    db.close()
}
