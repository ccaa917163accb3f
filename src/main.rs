use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use mdgeo::config::FileConfig;
use mdgeo::{AddressRecord, GeoPoint, GeocodeClient, OpenDataClient, PartialAddress, SoqlQuery};

/// Geocode Maryland addresses and query Socrata open-data endpoints
///
/// Examples:
///   # Batch geocode two addresses
///   mdgeo geocode "501 E Pratt St, Baltimore, MD 21202" "45 Calvert St, Annapolis, MD"
///
///   # Batch geocode records from a JSON file ([{"id": 1, "street": ..., "city": ..., "zip": ...}])
///   mdgeo geocode --input addresses.json
///
///   # Nearest address to a point
///   mdgeo reverse --lat 39.2866 --lon -76.6050 --distance 50
///
///   # Ranked candidates for a partial address
///   mdgeo candidates --address "501 E Pratt" --city Baltimore
///
///   # SoQL query against a dataset
///   mdgeo query https://opendata.maryland.gov/resource/ryxx-aeaf --where "year = '2023'" --limit 50000
#[derive(Parser, Debug)]
#[command(name = "mdgeo")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file (optional, auto-searches mdgeo.toml if not provided)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Per-request timeout in seconds (overrides the config file)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Enable verbose logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Socrata application token (overrides the config file)
    #[arg(long, global = true, env = "SOCRATA_APP_TOKEN", hide_env_values = true)]
    app_token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Batch geocode addresses
    Geocode(GeocodeArgs),
    /// Find the nearest address to a latitude/longitude
    Reverse(ReverseArgs),
    /// List ranked address candidates for a partial address
    Candidates(CandidatesArgs),
    /// Run a SoQL query against a Socrata resource endpoint
    Query(QueryArgs),
}

#[derive(Args, Debug)]
struct GeocodeArgs {
    /// Single-line addresses; ids are assigned 1, 2, 3... in order
    addresses: Vec<String>,

    /// JSON file holding an array of address records
    #[arg(short = 'i', long, conflicts_with = "addresses")]
    input: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ReverseArgs {
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,

    #[arg(long, allow_hyphen_values = true)]
    lon: f64,

    /// Search radius in meters (defaults to the configured radius)
    #[arg(short = 'd', long)]
    distance: Option<f64>,
}

#[derive(Args, Debug)]
struct CandidatesArgs {
    /// Free-text address
    single_line: Option<String>,

    #[arg(long)]
    address: Option<String>,

    #[arg(long)]
    city: Option<String>,

    #[arg(long, alias = "zip")]
    postal: Option<String>,

    /// Maximum candidates to return
    #[arg(short = 'm', long)]
    max: Option<u32>,
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// Resource endpoint, e.g. https://opendata.maryland.gov/resource/ryxx-aeaf
    endpoint: String,

    #[arg(long)]
    select: Option<String>,

    #[arg(long = "where")]
    filter: Option<String>,

    #[arg(long)]
    order: Option<String>,

    #[arg(long)]
    group: Option<String>,

    #[arg(long)]
    having: Option<String>,

    /// Full-text search ($q)
    #[arg(short = 'q', long = "search")]
    search: Option<String>,

    #[arg(long)]
    limit: Option<u64>,

    #[arg(long)]
    offset: Option<u64>,

    /// Page through every matching row ($limit becomes the page size)
    #[arg(long)]
    all: bool,
}

impl QueryArgs {
    fn soql(&self) -> SoqlQuery {
        SoqlQuery {
            select: self.select.clone(),
            filter: self.filter.clone(),
            order: self.order.clone(),
            group: self.group.clone(),
            having: self.having.clone(),
            search: self.search.clone(),
            limit: self.limit,
            offset: self.offset,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    mdgeo::logging::init(cli.verbose);

    let config = load_config(&cli)?;
    let timeout = config.timeout();

    match cli.command {
        Command::Geocode(args) => run_geocode(&config, timeout, args),
        Command::Reverse(args) => run_reverse(&config, timeout, args),
        Command::Candidates(args) => run_candidates(&config, timeout, args),
        Command::Query(args) => run_query(&config, timeout, args),
    }
}

/// Config file (explicit or searched) with command-line overrides applied
fn load_config(cli: &Cli) -> Result<FileConfig> {
    let mut config = if let Some(ref config_path) = cli.config {
        if !config_path.exists() {
            bail!("Config file not found: {:?}", config_path);
        }
        FileConfig::from_path(config_path).context("Failed to load config file")?
    } else {
        FileConfig::load().unwrap_or_default()
    };
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = timeout;
    }
    if cli.app_token.is_some() {
        config.socrata.app_token = cli.app_token.clone();
    }
    Ok(config)
}

fn run_geocode(config: &FileConfig, timeout: Duration, args: GeocodeArgs) -> Result<()> {
    let records: Vec<AddressRecord> = if let Some(ref path) = args.input {
        let contents = std::fs::read_to_string(path)
            .context(format!("Failed to read address file: {:?}", path))?;
        serde_json::from_str(&contents).context("Failed to parse address file")?
    } else {
        args.addresses
            .iter()
            .zip(1..)
            .map(|(line, id)| AddressRecord::single_line(id, line))
            .collect()
    };
    if records.is_empty() {
        bail!("Provide at least one address or --input");
    }

    let client = GeocodeClient::new(&config.geocoder, timeout)
        .context("Failed to create geocode client")?;

    let spinner = create_spinner(&format!("Geocoding {} addresses...", records.len()));
    let results = client
        .geocode_batch(&records)
        .context("Batch geocode failed")?;
    finish_spinner(
        &spinner,
        format!("Matched {} of {} addresses", results.len(), records.len()),
    );

    print_json(&results)
}

fn run_reverse(config: &FileConfig, timeout: Duration, args: ReverseArgs) -> Result<()> {
    let client = GeocodeClient::new(&config.geocoder, timeout)
        .context("Failed to create geocode client")?;
    let point = GeoPoint::from_lat_lon(args.lat, args.lon);

    let spinner = create_spinner("Looking up nearest address...");
    let candidate = client.reverse_geocode(point, args.distance);
    let candidate = match candidate {
        Ok(candidate) => candidate,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e).context(format!(
                "Reverse geocode failed for ({:.5}, {:.5})",
                args.lat, args.lon
            ));
        }
    };
    finish_spinner(&spinner, format!("Found: {}", candidate.address));

    print_json(&candidate)
}

fn run_candidates(config: &FileConfig, timeout: Duration, args: CandidatesArgs) -> Result<()> {
    let query = PartialAddress {
        single_line: args.single_line,
        address: args.address,
        city: args.city,
        postal: args.postal,
    };
    if query.is_empty() {
        bail!("Provide a single-line address or at least one of --address, --city, --postal");
    }

    let client = GeocodeClient::new(&config.geocoder, timeout)
        .context("Failed to create geocode client")?;

    let spinner = create_spinner("Finding address candidates...");
    let candidates = client
        .find_candidates(&query, args.max)
        .context("Candidate lookup failed")?;
    finish_spinner(&spinner, format!("Found {} candidates", candidates.len()));

    print_json(&candidates)
}

fn run_query(config: &FileConfig, timeout: Duration, args: QueryArgs) -> Result<()> {
    let client = OpenDataClient::new(&config.socrata, timeout)
        .context("Failed to create open data client")?;

    let soql = args.soql();
    client
        .build_url(&args.endpoint, &soql)
        .context("Invalid query endpoint")?;

    let spinner = create_spinner(if args.all {
        "Paging through open data endpoint..."
    } else {
        "Querying open data endpoint..."
    });
    let rows = if args.all {
        client.query_all(&args.endpoint, &soql)
    } else {
        client.query(&args.endpoint, &soql)
    }
    .context(format!("Query against {} failed", args.endpoint))?;
    finish_spinner(&spinner, format!("Fetched {} rows", rows.len()));

    print_json(&rows)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", out);
    Ok(())
}

/// Spinner on stderr; stdout stays clean for the JSON output
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn finish_spinner(pb: &ProgressBar, message: String) {
    let secs = pb.elapsed().as_secs_f32();
    pb.set_style(
        ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.finish_with_message(format!("{message} [{secs:.1}s]"));
}
