use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::path::PathBuf;

use safehash::config::Config;
use safehash::detector::{DetectError, Detection, DuplicateDetector};
use safehash::discovery::discover_images;
use safehash::export::{export_records, ExportFormat};
use safehash::logging;
use safehash::{FingerprintRecord, Store};

enum Command {
    Submit { files: Vec<PathBuf> },
    Scan { directory: PathBuf },
    List { limit: Option<usize>, search: Option<String> },
    Show { id: i64 },
    Export { output: PathBuf, format: ExportFormat, limit: Option<usize> },
    Stats,
}

struct Cli {
    config_path: Option<PathBuf>,
    command: Command,
}

fn die(msg: &str) -> ! {
    eprintln!("Error: {msg}");
    std::process::exit(1);
}

fn expect_value(args: &[String], i: &mut usize, flag: &str) -> String {
    *i += 1;
    match args.get(*i) {
        Some(value) => value.clone(),
        None => die(&format!("{flag} requires a value")),
    }
}

fn parse_args() -> Cli {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut config_path: Option<PathBuf> = None;
    let mut limit: Option<usize> = None;
    let mut search: Option<String> = None;
    let mut format: Option<ExportFormat> = None;
    let mut positional: Vec<String> = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("safehash {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                config_path = Some(PathBuf::from(expect_value(&args, &mut i, "--config")));
            }
            "--limit" => {
                let value = expect_value(&args, &mut i, "--limit");
                match value.parse() {
                    Ok(n) => limit = Some(n),
                    Err(_) => die("--limit expects a number"),
                }
            }
            "--search" => {
                search = Some(expect_value(&args, &mut i, "--search"));
            }
            "--format" => {
                let value = expect_value(&args, &mut i, "--format");
                match ExportFormat::parse(&value) {
                    Some(f) => format = Some(f),
                    None => die("--format expects json or csv"),
                }
            }
            other if other.starts_with('-') => {
                die(&format!("Unknown argument: {other}"));
            }
            other => positional.push(other.to_string()),
        }
        i += 1;
    }

    let command = match positional.first().map(String::as_str) {
        Some("submit") => {
            if positional.len() < 2 {
                die("submit requires at least one file");
            }
            Command::Submit {
                files: positional[1..].iter().map(PathBuf::from).collect(),
            }
        }
        Some("scan") => match positional.get(1) {
            Some(dir) => Command::Scan { directory: PathBuf::from(dir) },
            None => die("scan requires a directory"),
        },
        Some("list") => Command::List { limit, search },
        Some("show") => match positional.get(1).and_then(|v| v.parse().ok()) {
            Some(id) => Command::Show { id },
            None => die("show requires a numeric record id"),
        },
        Some("export") => {
            let output = match positional.get(1) {
                Some(path) => PathBuf::from(path),
                None => die("export requires an output path"),
            };
            // Without an explicit --format, take it from the output extension.
            let format = format
                .or_else(|| {
                    output
                        .extension()
                        .and_then(|ext| ExportFormat::parse(&ext.to_string_lossy()))
                })
                .unwrap_or(ExportFormat::Json);
            Command::Export { output, format, limit }
        }
        Some("stats") => Command::Stats,
        Some(other) => die(&format!("Unknown command: {other}")),
        None => {
            print_help();
            std::process::exit(1);
        }
    };

    Cli { config_path, command }
}

fn print_help() {
    println!(
        r#"safehash - image fingerprinting and exact re-upload detection

Stores hashes only, never the image bytes.

USAGE:
    safehash [OPTIONS] <COMMAND>

COMMANDS:
    submit <FILE>...    Fingerprint files, flagging exact re-uploads
    scan <DIR>          Discover images under a directory and submit them
    list                Show recent fingerprint records, newest first
    show <ID>           Show one record in full
    export <PATH>       Export records to JSON or CSV
    stats               Show how many records are stored

OPTIONS:
    --config, -c PATH   Path to config file
    --limit N           Cap the number of records read (list, export)
    --search Q          Substring filter over filename and hashes (list)
    --format F          Export format: json or csv
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    SAFEHASH_LOG        Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/safehash/config.toml"#
    );
}

fn main() -> Result<()> {
    let cli = parse_args();

    // Initialize logging (uses journald on Linux, file fallback otherwise)
    let _ = logging::init(Some(Config::config_dir().join("logs")));

    // Load configuration
    let config = match &cli.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    // Open the fingerprint store
    let store = Store::open(&config.db_path)?;
    store.initialize()?;

    match cli.command {
        Command::Submit { files } => run_submit(&store, &files),
        Command::Scan { directory } => run_scan(&store, &config, &directory),
        Command::List { limit, search } => run_list(&store, &config, limit, search.as_deref()),
        Command::Show { id } => run_show(&store, id),
        Command::Export { output, format, limit } => {
            run_export(&store, &config, &output, format, limit)
        }
        Command::Stats => run_stats(&store),
    }
}

fn run_submit(store: &Store, files: &[PathBuf]) -> Result<()> {
    let detector = DuplicateDetector::new(store);
    let mut rejected = 0;

    for path in files {
        let bytes = std::fs::read(path)
            .with_context(|| format!("could not read {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        match detector.submit(&bytes, &filename, Utc::now()) {
            Ok(Detection::Stored(record)) => {
                println!("stored: {} (record {})", filename, record.id);
                println!("  content hash:    {}", record.content_hash);
                println!("  perceptual hash: {}", record.perceptual_hash);
            }
            Ok(Detection::Duplicate(record)) => {
                println!(
                    "duplicate: {} matches record {} ({}, first uploaded {})",
                    filename, record.id, record.filename, record.uploaded_at
                );
            }
            Err(e @ DetectError::Storage(_)) => return Err(e.into()),
            Err(e) => {
                eprintln!("rejected: {} ({e})", path.display());
                rejected += 1;
            }
        }
    }

    if rejected > 0 {
        bail!("{rejected} submission(s) were rejected");
    }
    Ok(())
}

fn run_scan(store: &Store, config: &Config, directory: &PathBuf) -> Result<()> {
    let images = discover_images(directory, &config.scanner.image_extensions)?;
    if images.is_empty() {
        println!("no image files found under {}", directory.display());
        return Ok(());
    }

    let detector = DuplicateDetector::new(store);
    let mut stored = 0;
    let mut duplicates = 0;
    let mut rejected = 0;

    for path in &images {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("skipping unreadable file {}: {e}", path.display());
                rejected += 1;
                continue;
            }
        };
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        match detector.submit(&bytes, &filename, Utc::now()) {
            Ok(Detection::Stored(_)) => stored += 1,
            Ok(Detection::Duplicate(record)) => {
                println!("duplicate: {} matches record {}", path.display(), record.id);
                duplicates += 1;
            }
            Err(e @ DetectError::Storage(_)) => return Err(e.into()),
            Err(e) => {
                eprintln!("rejected: {} ({e})", path.display());
                rejected += 1;
            }
        }
    }

    println!(
        "scanned {} file(s): {stored} stored, {duplicates} duplicate(s), {rejected} rejected",
        images.len()
    );
    Ok(())
}

fn run_list(
    store: &Store,
    config: &Config,
    limit: Option<usize>,
    search: Option<&str>,
) -> Result<()> {
    let limit = limit.unwrap_or(config.listing.default_limit);
    let mut records = store.list_recent(limit)?;

    // Substring filtering is a display concern, so it stays out of the store.
    if let Some(query) = search {
        let needle = query.to_lowercase();
        records.retain(|r| {
            r.filename.to_lowercase().contains(&needle)
                || r.content_hash.contains(&needle)
                || r.perceptual_hash.contains(&needle)
        });
    }

    if records.is_empty() {
        println!("no records to show");
        return Ok(());
    }

    println!("showing {} record(s), latest first", records.len());
    println!(
        "{:>5}  {:<25}  {:<28}  {:<15}  {}",
        "id", "uploaded_at", "filename", "content_hash", "perceptual_hash"
    );
    for record in &records {
        println!(
            "{:>5}  {:<25}  {:<28}  {:<12}...  {}",
            record.id,
            record.uploaded_at,
            record.filename,
            &record.content_hash[..12],
            record.perceptual_hash
        );
    }
    Ok(())
}

fn run_show(store: &Store, id: i64) -> Result<()> {
    match store.get_by_id(id)? {
        Some(record) => {
            print_record(&record);
            Ok(())
        }
        None => bail!("no record with id {id}"),
    }
}

fn print_record(record: &FingerprintRecord) {
    println!("id:              {}", record.id);
    println!("filename:        {}", record.filename);
    println!("uploaded_at:     {}", record.uploaded_at);
    println!("content_hash:    {}", record.content_hash);
    println!("perceptual_hash: {}", record.perceptual_hash);
}

fn run_export(
    store: &Store,
    config: &Config,
    output: &PathBuf,
    format: ExportFormat,
    limit: Option<usize>,
) -> Result<()> {
    let limit = limit.unwrap_or(config.listing.default_limit);
    let records = store.list_recent(limit)?;
    let count = export_records(&records, output, format)?;
    println!(
        "exported {count} record(s) to {} ({})",
        output.display(),
        format.name()
    );
    Ok(())
}

fn run_stats(store: &Store) -> Result<()> {
    println!("{} fingerprint record(s) stored", store.count()?);
    Ok(())
}
