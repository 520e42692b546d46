use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use tagsheet::batch::{self, BatchRequest};
use tagsheet::config::Config;
use tagsheet::mapping::{normalize, ColumnChoice, ColumnMapping, Field};
use tagsheet::metadata::MetadataStandard;
use tagsheet::table::Table;

#[derive(Parser, Debug)]
#[command(
    name = "tagsheet",
    version,
    about = "Batch-write IPTC or EXIF titles, descriptions, and keywords into JPEGs from a CSV table"
)]
struct Cli {
    /// CSV file with a header row and one row per image
    #[arg(value_name = "CSV")]
    csv: Option<PathBuf>,

    /// Folder containing the JPG files
    #[arg(value_name = "FOLDER")]
    folder: Option<PathBuf>,

    /// Metadata standard to write: iptc or exif (default from config)
    #[arg(short, long, value_name = "STANDARD")]
    standard: Option<MetadataStandard>,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// Header of the filename column (overrides auto-detection)
    #[arg(long, value_name = "HEADER")]
    filename_column: Option<String>,

    /// Header of the title column, or "none" to leave titles untouched
    #[arg(long, value_name = "HEADER")]
    title_column: Option<String>,

    /// Header of the description column, or "none" to leave descriptions untouched
    #[arg(long, value_name = "HEADER")]
    description_column: Option<String>,

    /// Header of the keywords column, or "none" to leave keywords untouched
    #[arg(long, value_name = "HEADER")]
    keywords_column: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    let (Some(csv_path), Some(folder)) = (cli.csv.as_deref(), cli.folder.as_deref()) else {
        anyhow::bail!("A CSV file and an image folder are required. Use --help for usage.");
    };
    if !folder.is_dir() {
        anyhow::bail!("Folder does not exist: {}", folder.display());
    }

    let config = Config::load(cli.config.as_deref())?;
    let standard = cli.standard.unwrap_or(config.standard);

    let table = Table::from_path(csv_path)
        .with_context(|| format!("Failed to load CSV {}", csv_path.display()))?;
    log::info!(
        "Loaded {} data row(s), {} column(s)",
        table.rows().len(),
        table.headers().len()
    );

    // Explicit column selections win; the resolver fills the rest.
    let mut mapping = ColumnMapping::default();
    let overrides = [
        (Field::Filename, &cli.filename_column),
        (Field::Title, &cli.title_column),
        (Field::Description, &cli.description_column),
        (Field::Keywords, &cli.keywords_column),
    ];
    for (field, header) in overrides {
        if let Some(header) = header {
            let choice = parse_column_override(table.headers(), header)
                .with_context(|| format!("No column matching {header:?} for {field}"))?;
            mapping.set(field, choice);
        }
    }
    mapping.resolve(table.headers(), &config.columns);

    let writer = standard.writer();
    let request = BatchRequest {
        table: &table,
        mapping: &mapping,
        folder,
    };
    let result = batch::run(&request, writer.as_ref()).context("Cannot start processing")?;

    println!("Successfully processed: {} files", result.processed);
    println!("Errors: {}", result.errors);
    Ok(())
}

/// Turn a `--*-column` value into a choice: the literal "none" skips the
/// field, anything else must match a header after normalization.
fn parse_column_override(headers: &[String], value: &str) -> Option<ColumnChoice> {
    let wanted = normalize(value);
    if wanted == "none" {
        return Some(ColumnChoice::Skip);
    }
    headers
        .iter()
        .position(|h| normalize(h) == wanted)
        .map(ColumnChoice::Column)
}
