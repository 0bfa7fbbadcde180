use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use spreadsheet_intake::config::IntakeConfig;
use spreadsheet_intake::ingestion::{ArtifactNaming, LoadOptions, Loader, Source, TracingObserver};
use spreadsheet_intake::types::TabularResult;
use spreadsheet_intake::{logging, LoadResult};

/// Load CSV/XLS/XLSX resources by URI, whatever their file name claims.
#[derive(Debug, Parser)]
#[command(name = "spreadsheet-intake", version)]
#[command(about = "Fetch a spreadsheet by URI, sniff its format, and print it as a table", long_about = None)]
struct Cli {
    /// TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for downloaded artifacts (overrides the config file).
    #[arg(long, global = true)]
    prefix: Option<PathBuf>,

    /// Give every fetch its own artifact instead of reusing the per-URI name.
    #[arg(long, global = true)]
    unique_artifacts: bool,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load a resource and print it.
    Load {
        /// `file://`, `http://` or `https://` URI.
        uri: String,

        /// Read the first sheet whose name contains this text.
        #[arg(long)]
        sheet: Option<String>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        output: OutputFormat,

        /// Delete the downloaded artifact after loading.
        #[arg(long)]
        discard_artifact: bool,
    },

    /// List a workbook's sheets and show which one would be read.
    Sheets {
        uri: String,

        #[arg(long)]
        sheet: Option<String>,
    },

    /// Copy a resource to a local file as-is.
    Get { uri: String, file: PathBuf },

    /// Upload a local file to a `file://` or `http(s)://` URI.
    Put { file: PathBuf, uri: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(&cli.log);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("spreadsheet-intake error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> LoadResult<()> {
    let mut options = match &cli.config {
        Some(path) => IntakeConfig::load(path)?.into_load_options(),
        None => LoadOptions {
            observer: Some(std::sync::Arc::new(TracingObserver)),
            ..Default::default()
        },
    };
    if let Some(prefix) = cli.prefix {
        options.fetch.prefix = prefix;
    }
    if cli.unique_artifacts {
        options.fetch.naming = ArtifactNaming::Unique;
    }

    match cli.command {
        Command::Load {
            uri,
            sheet,
            output,
            discard_artifact,
        } => {
            if sheet.is_some() {
                options.sheet_hint = sheet;
            }
            let loader = Loader::new(options)?;
            let outcome = loader.load_outcome(&uri)?;
            let format = outcome.artifact.format;
            if let Some(hint) = loader.sheet_hint().filter(|_| !format.is_workbook()) {
                tracing::warn!(%hint, %format, "sheet hint ignored");
            }
            write_table(&outcome.table, output)?;
            if discard_artifact {
                outcome.artifact.discard()?;
            }
        }
        Command::Sheets { uri, sheet } => {
            if sheet.is_some() {
                options.sheet_hint = sheet;
            }
            let loader = Loader::new(options)?;
            let artifact = loader.fetcher().fetch(&Source::parse(&uri)?)?;
            let mut out = io::stdout().lock();
            match loader.catalog(&artifact)? {
                Some(catalog) => {
                    let chosen = catalog.resolve(loader.sheet_hint());
                    writeln!(out, "format: {}", artifact.format)?;
                    for entry in catalog.entries() {
                        let marker = if entry.name == chosen.name { '*' } else { ' ' };
                        let mut flags = Vec::new();
                        if entry.active {
                            flags.push("active");
                        }
                        if !entry.visible {
                            flags.push("hidden");
                        }
                        writeln!(out, "{marker} {} {}", entry.name, flags.join(","))?;
                    }
                    writeln!(out, "selected: {} ({})", chosen.name, chosen.reason)?;
                }
                None => writeln!(out, "format: {} (no sheets)", artifact.format)?,
            }
        }
        Command::Get { uri, file } => {
            let source = Source::parse(&uri)?;
            let loader = Loader::new(options)?;
            loader.fetcher().download_to(&source, &file)?;
        }
        Command::Put { file, uri } => {
            let target = Source::parse(&uri)?;
            let loader = Loader::new(options)?;
            loader.fetcher().upload_file(&target, &file)?;
        }
    }
    Ok(())
}

fn write_table(table: &TabularResult, format: OutputFormat) -> LoadResult<()> {
    let stdout = io::stdout().lock();
    match format {
        OutputFormat::Json => {
            let mut out = io::BufWriter::new(stdout);
            serde_json::to_writer_pretty(&mut out, table).map_err(io::Error::from)?;
            writeln!(out)?;
            out.flush()?;
        }
        OutputFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(stdout);
            wtr.write_record(&table.columns)?;
            for row in &table.rows {
                wtr.write_record(row.iter().map(|v| v.to_cell_string()))?;
            }
            wtr.flush()?;
        }
    }
    Ok(())
}
