//! Paybatch CLI - batch CSV exchange for employee, NIC/Tax and timesheet records
//!
//! # Main Commands
//!
//! ```bash
//! paybatch serve                                  # Start HTTP server (port 3000)
//! paybatch import staff.csv -k employee           # Validate a CSV, print the report
//! paybatch upload staff.csv -k employee           # Validate and submit in chunks
//! paybatch export -k nic-tax --records april.json # Records JSON to CSV
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! paybatch parse input.csv          # Just parse CSV to JSON rows
//! paybatch columns -k timesheet     # Show the fixed column order of a kind
//! ```

use clap::{Parser, Subcommand};
use paybatch::mapper::schema;
use paybatch::pipeline::{
    export_from_api, load_locations, load_locations_file, read_records_json,
};
use paybatch::{
    decode_content, detect_encoding, export_records, import_file, parse_file_auto, parse_str,
    to_csv, upload_bytes, write_export, ApiClient, Config, ImportOptions, LocationCodeMap,
    Orchestrator, RecordKind, WriteMode,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "paybatch")]
#[command(about = "Import, submit and export payroll CSV batches", long_about = None)]
struct Cli {
    /// Remote API base URL (overrides PAYBATCH_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a CSV file and output JSON rows
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse and validate a CSV file, output the import report
    Import {
        /// Input CSV file
        input: PathBuf,

        /// Record kind: employee, nic-tax or timesheet
        #[arg(short, long)]
        kind: RecordKind,

        /// create or update
        #[arg(short, long, default_value = "create")]
        mode: WriteMode,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Location directory JSON file (default: fetched from the API)
        #[arg(short, long)]
        locations: Option<PathBuf>,

        /// Output file for the report (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a CSV file and submit its records in chunks
    Upload {
        /// Input CSV file
        input: PathBuf,

        /// Record kind: employee, nic-tax or timesheet
        #[arg(short, long)]
        kind: RecordKind,

        /// create or update
        #[arg(short, long, default_value = "create")]
        mode: WriteMode,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Location directory JSON file (default: fetched from the API)
        #[arg(short, long)]
        locations: Option<PathBuf>,

        /// Records per request (default depends on kind and mode)
        #[arg(long)]
        chunk_size: Option<usize>,
    },

    /// Export records to CSV
    Export {
        /// Record kind: employee, nic-tax or timesheet
        #[arg(short, long)]
        kind: RecordKind,

        /// Records JSON file (default: fetched from the API)
        #[arg(short, long)]
        records: Option<PathBuf>,

        /// Only these ids when fetching from the API
        #[arg(long, value_delimiter = ',')]
        ids: Vec<String>,

        /// Location directory JSON file (default: fetched from the API)
        #[arg(short, long)]
        locations: Option<PathBuf>,

        /// Add the employeeId column (employee update templates)
        #[arg(long)]
        with_id: bool,

        /// Record set name used in the file name
        #[arg(short, long, default_value = "export")]
        name: String,

        /// Directory for the CSV file; prints to stdout when omitted
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },

    /// Show the fixed column order of a record kind
    Columns {
        /// Record kind: employee, nic-tax or timesheet
        #[arg(short, long)]
        kind: RecordKind,

        /// Include the employeeId column
        #[arg(long)]
        with_id: bool,

        /// Print an empty CSV template instead of one column per line
        #[arg(long)]
        template: bool,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Location directory JSON file (default: fetched per request)
        #[arg(short, long)]
        locations: Option<PathBuf>,
    },
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match load_config(cli.api_url) {
        Ok(config) => run(cli.command, config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(api_url: Option<String>) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = Config::from_env()?;
    if let Some(url) = api_url {
        config.api_url = Some(url.trim_end_matches('/').to_string());
    }
    Ok(config)
}

async fn run(command: Commands, config: Config) -> CliResult {
    match command {
        Commands::Parse {
            input,
            delimiter,
            output,
        } => cmd_parse(&input, delimiter, output.as_deref()),

        Commands::Import {
            input,
            kind,
            mode,
            delimiter,
            locations,
            output,
        } => {
            let options = ImportOptions::new(kind)
                .with_mode(mode)
                .with_delimiter(delimiter)
                .with_batch_size(config.parse_batch_size);
            cmd_import(&input, &options, locations.as_deref(), output.as_deref(), &config).await
        }

        Commands::Upload {
            input,
            kind,
            mode,
            delimiter,
            locations,
            chunk_size,
        } => {
            let options = ImportOptions::new(kind)
                .with_mode(mode)
                .with_delimiter(delimiter)
                .with_batch_size(config.parse_batch_size);
            cmd_upload(&input, &options, locations.as_deref(), chunk_size, &config).await
        }

        Commands::Export {
            kind,
            records,
            ids,
            locations,
            with_id,
            name,
            out_dir,
        } => {
            cmd_export(
                kind,
                records.as_deref(),
                &ids,
                locations.as_deref(),
                with_id,
                &name,
                out_dir.as_deref(),
                &config,
            )
            .await
        }

        Commands::Columns {
            kind,
            with_id,
            template,
        } => cmd_columns(kind, with_id, template),

        Commands::Serve { port, locations } => {
            let locations = match locations {
                Some(path) => Some(load_locations_file(path)?),
                None => None,
            };
            let state = paybatch::server::AppState::new(config, locations);
            paybatch::server::start_server(port, state).await
        }
    }
}

async fn location_map(path: Option<&Path>, config: &Config) -> Result<LocationCodeMap, Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            let map = load_locations_file(p)?;
            eprintln!("   Locations: {} (from {})", map.len(), p.display());
            Ok(map)
        }
        None => {
            let client = ApiClient::from_config(config)?;
            Ok(load_locations(&client).await?)
        }
    }
}

fn cmd_parse(input: &Path, delimiter: Option<char>, output: Option<&Path>) -> CliResult {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let parsed = match delimiter {
        Some(d) => {
            let bytes = fs::read(input)?;
            let encoding = detect_encoding(&bytes);
            let mut parsed = parse_str(&decode_content(&bytes, &encoding)?, d)?;
            parsed.encoding = encoding;
            parsed
        }
        None => parse_file_auto(input)?,
    };

    eprintln!("   Encoding: {}", parsed.encoding);
    eprintln!(
        "   Delimiter: '{}'{}",
        format_delimiter(parsed.delimiter),
        if delimiter.is_none() { " (auto-detected)" } else { "" }
    );
    eprintln!("   Columns: {}", parsed.headers.join(", "));
    eprintln!("✅ Parsed {} rows", parsed.rows.len());

    let rows: Vec<_> = parsed.rows.iter().map(|r| r.to_json()).collect();
    let json = serde_json::to_string_pretty(&rows)?;
    write_output(&json, output)?;

    Ok(())
}

async fn cmd_import(
    input: &Path,
    options: &ImportOptions,
    locations: Option<&Path>,
    output: Option<&Path>,
    config: &Config,
) -> CliResult {
    eprintln!("📄 Importing {} CSV: {}", options.kind, input.display());

    let locations = location_map(locations, config).await?;
    let report = import_file(input, options, &locations).await?;

    eprintln!("   Encoding: {}", report.encoding);
    eprintln!("   Columns: {}", report.headers.len());
    print_row_errors(&report.errors);
    if report.invalid == 0 {
        eprintln!("✅ All {} rows valid", report.valid);
    } else {
        eprintln!("⚠️  {} valid, {} invalid", report.valid, report.invalid);
    }

    let json = serde_json::to_string_pretty(&report)?;
    write_output(&json, output)?;

    Ok(())
}

async fn cmd_upload(
    input: &Path,
    options: &ImportOptions,
    locations: Option<&Path>,
    chunk_size: Option<usize>,
    config: &Config,
) -> CliResult {
    eprintln!("📤 Uploading {} CSV ({}): {}", options.kind, options.mode, input.display());

    let client = ApiClient::from_config(config)?;
    let locations = location_map(locations, config).await?;
    let chunk_size = chunk_size.unwrap_or_else(|| config.chunk_size_for(options.kind, options.mode));

    let orchestrator = Orchestrator::new(client).with_retry(config.retry_policy());
    let mut progress = orchestrator.subscribe();
    let printer = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let p = progress.borrow_and_update().clone();
            eprintln!("   [{:>3}%] {} ({}/{} records)", p.percent, p.status, p.succeeded, p.total);
        }
    });

    let bytes = tokio::fs::read(input).await?;
    let result = upload_bytes(bytes, options, &locations, &orchestrator, chunk_size).await;
    drop(orchestrator);
    let _ = printer.await;

    let (report, upload) = result?;
    print_row_errors(&report.errors);
    if report.invalid > 0 {
        eprintln!("⚠️  {} invalid rows were not submitted", report.invalid);
    }
    eprintln!("✨ {}: {} of {} records submitted", upload.status, upload.succeeded, upload.total);

    println!("{}", serde_json::to_string_pretty(&upload)?);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn cmd_export(
    kind: RecordKind,
    records: Option<&Path>,
    ids: &[String],
    locations: Option<&Path>,
    with_id: bool,
    name: &str,
    out_dir: Option<&Path>,
    config: &Config,
) -> CliResult {
    let locations = location_map(locations, config).await?;

    let exported = match records {
        Some(path) => {
            eprintln!("📄 Exporting {} records from: {}", kind, path.display());
            let records = read_records_json(kind, &fs::read_to_string(path)?)?;
            export_records(kind, &records, &locations, with_id)?
        }
        None => {
            let client = ApiClient::from_config(config)?;
            export_from_api(&client, kind, ids, &locations, with_id).await?
        }
    };

    if !exported.unresolved.is_empty() {
        eprintln!(
            "⚠️  Unknown location ids written raw: {}",
            exported.unresolved.join(", ")
        );
    }

    match out_dir {
        Some(dir) => {
            let path = write_export(&exported, dir, kind.as_str(), name)?;
            eprintln!("💾 {} rows written to: {}", exported.rows.len(), path.display());
        }
        None => print!("{}", to_csv(&exported)?),
    }
    Ok(())
}

fn cmd_columns(kind: RecordKind, with_id: bool, template: bool) -> CliResult {
    if template {
        let empty = export_records(kind, &[], &LocationCodeMap::default(), with_id)?;
        print!("{}", to_csv(&empty)?);
        return Ok(());
    }

    let columns = if with_id && kind == RecordKind::Employee {
        schema::employee_update_columns()
    } else {
        schema::columns(kind).to_vec()
    };
    for column in columns {
        println!("{}", column);
    }
    Ok(())
}

fn print_row_errors(errors: &[paybatch::RowValidationError]) {
    for err in errors.iter().take(10) {
        eprintln!("   ❌ {}", err);
    }
    if errors.len() > 10 {
        eprintln!("   ... and {} more", errors.len() - 10);
    }
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> CliResult {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
