//! Kasabi CLI
//!
//! Command-line client for querying and updating Kasabi datasets.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{ArgAction, Parser, Subcommand};
use kasabi::{
    serialize_graph, ClientConfig, Dataset, Error, Graph, HttpTransport, JobType, Outcome,
    RdfSyntax, ReconcileOptions, ReconcileQuery, ResponseMode, SearchOptions, TypeStrict,
    DEFAULT_LIMIT,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kasabi")]
#[command(about = "Query and update datasets on the Kasabi data platform")]
#[command(version)]
struct Cli {
    /// API key sent with every request
    #[arg(long, env = "KASABI_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Dataset URI prefix (default: http://data.kasabi.com/dataset/)
    #[arg(long, env = "KASABI_PLATFORM", global = true)]
    platform: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 10, global = true)]
    timeout: u64,

    /// Print response bodies as received, without decoding
    #[arg(long, global = true)]
    raw: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the APIs the dataset declares
    Capabilities {
        /// Dataset slug or URI
        dataset: String,
    },

    /// Describe a resource via SPARQL
    Describe { dataset: String, uri: String },

    /// Run a SPARQL SELECT query, printing rows as JSON
    Select { dataset: String, query: String },

    /// Run a SPARQL ASK query
    Ask { dataset: String, query: String },

    /// Look up a resource by URI
    Lookup { dataset: String, uri: String },

    /// Full-text search
    Search {
        dataset: String,
        query: String,

        #[arg(long)]
        max: Option<u32>,

        #[arg(long)]
        offset: Option<u32>,

        #[arg(long)]
        sort: Option<String>,
    },

    /// Facet counts for a search
    Facet {
        dataset: String,
        query: String,

        /// Comma-separated field names
        #[arg(long, required = true, value_delimiter = ',')]
        fields: Vec<String>,

        #[arg(long)]
        top: Option<u32>,
    },

    /// Reconcile one or more labels against the dataset
    Reconcile {
        dataset: String,

        #[arg(required = true)]
        labels: Vec<String>,

        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: u32,

        /// Restrict candidates to this type
        #[arg(long = "type")]
        entity_type: Option<String>,

        /// any, all or should
        #[arg(long, default_value = "any", value_parser = parse_type_strict)]
        type_strict: TypeStrict,
    },

    /// Store an RDF file in the dataset
    Store {
        dataset: String,
        file: PathBuf,

        /// Content type (default: inferred from the file extension)
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Show dataset status
    Status { dataset: String },

    /// Show attribution information
    Attribution { dataset: String },

    /// Schedule a job (reset, snapshot or reindex)
    Schedule {
        dataset: String,

        #[arg(value_parser = parse_job_type)]
        job_type: JobType,

        /// Start time, RFC 3339 (default: now)
        #[arg(long, value_parser = parse_start)]
        at: Option<DateTime<Utc>>,
    },

    /// Show the state of a scheduled job
    JobStatus { dataset: String, job_uri: String },
}

impl Commands {
    fn dataset(&self) -> &str {
        match self {
            Commands::Capabilities { dataset }
            | Commands::Describe { dataset, .. }
            | Commands::Select { dataset, .. }
            | Commands::Ask { dataset, .. }
            | Commands::Lookup { dataset, .. }
            | Commands::Search { dataset, .. }
            | Commands::Facet { dataset, .. }
            | Commands::Reconcile { dataset, .. }
            | Commands::Store { dataset, .. }
            | Commands::Status { dataset }
            | Commands::Attribution { dataset }
            | Commands::Schedule { dataset, .. }
            | Commands::JobStatus { dataset, .. } => dataset,
        }
    }
}

fn parse_type_strict(s: &str) -> Result<TypeStrict, String> {
    TypeStrict::parse(s).ok_or_else(|| format!("expected any, all or should, got {:?}", s))
}

fn parse_job_type(s: &str) -> Result<JobType, String> {
    JobType::parse(s).ok_or_else(|| format!("expected reset, snapshot or reindex, got {:?}", s))
}

fn parse_start(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 time: {}", e))
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn fail(e: Error) -> u8 {
    eprintln!("Error: {}", e);
    e.exit_code() as u8
}

fn open_dataset(cli: &Cli) -> Result<Dataset, u8> {
    let Some(api_key) = cli.api_key.as_deref() else {
        eprintln!("Error: no API key given (use --api-key or KASABI_API_KEY)");
        return Err(2);
    };

    let mut config = ClientConfig::new().timeout(Duration::from_secs(cli.timeout));
    if let Some(platform) = &cli.platform {
        config = config.platform(platform.as_str());
    }
    let transport = HttpTransport::new(&config).map_err(fail)?;
    Dataset::with_config(cli.command.dataset(), api_key, &config, Arc::new(transport)).map_err(fail)
}

fn run(cli: Cli) -> Result<(), u8> {
    let dataset = open_dataset(&cli)?;
    let mode = ResponseMode::from_raw_flag(cli.raw);

    match cli.command {
        Commands::Capabilities { .. } => {
            let capabilities = dataset.capabilities().map_err(fail)?;
            for kind in capabilities.kinds() {
                for endpoint in capabilities.endpoints(kind) {
                    println!("{}\t{}", kind, endpoint);
                }
            }
            Ok(())
        }
        Commands::Describe { uri, .. } => {
            emit(dataset.describe(&uri, mode).map_err(fail)?, print_graph)
        }
        Commands::Select { query, .. } => emit(dataset.select(&query, mode).map_err(fail)?, |r| {
            print_json(&r.rows)
        }),
        Commands::Ask { query, .. } => emit(dataset.ask(&query, mode).map_err(fail)?, |answer| {
            println!("{}", answer);
            Ok(())
        }),
        Commands::Lookup { uri, .. } => emit(dataset.lookup(&uri, mode).map_err(fail)?, print_graph),
        Commands::Search {
            query,
            max,
            offset,
            sort,
            ..
        } => {
            let options = SearchOptions { max, offset, sort };
            emit(dataset.search(&query, &options, mode).map_err(fail)?, print_graph)
        }
        Commands::Facet {
            query, fields, top, ..
        } => {
            let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
            emit(
                dataset.facet(&query, &fields, top, mode).map_err(fail)?,
                |facets| print_json(&facets),
            )
        }
        Commands::Reconcile {
            mut labels,
            limit,
            entity_type,
            type_strict,
            ..
        } => {
            let mut options = ReconcileOptions::new().limit(limit).type_strict(type_strict);
            options.entity_type = entity_type;
            let query = if labels.len() == 1 {
                ReconcileQuery::Label(labels.remove(0))
            } else {
                ReconcileQuery::Labels(labels)
            };
            emit(
                dataset.reconcile(query, &options, mode).map_err(fail)?,
                |json| print_json(&json),
            )
        }
        Commands::Store {
            file, content_type, ..
        } => emit(
            dataset
                .store_file(&file, None, content_type.as_deref())
                .map_err(fail)?,
            |body| {
                if !body.is_empty() {
                    println!("{}", body);
                }
                Ok(())
            },
        ),
        Commands::Status { .. } => emit(dataset.status(mode).map_err(fail)?, |json| print_json(&json)),
        Commands::Attribution { .. } => {
            emit(dataset.attribution(mode).map_err(fail)?, |json| print_json(&json))
        }
        Commands::Schedule { job_type, at, .. } => emit(
            dataset.schedule_job(job_type, at, mode).map_err(fail)?,
            |job| {
                if let Some(uri) = &job.uri {
                    println!("{}", uri);
                }
                match &job.body {
                    Some(body) => print_json(body),
                    None => Ok(()),
                }
            },
        ),
        Commands::JobStatus { job_uri, .. } => {
            emit(dataset.job_status(&job_uri, mode).map_err(fail)?, |json| print_json(&json))
        }
    }
}

/// Print a decoded result, or the body of a raw or failed response.
///
/// A non-success status exits 1.
fn emit<T>(outcome: Outcome<T>, print: impl FnOnce(T) -> Result<(), u8>) -> Result<(), u8> {
    match outcome {
        Outcome::Success(value) => print(value),
        Outcome::Raw { status, body } => {
            print!("{}", body);
            if kasabi::is_success(status) {
                Ok(())
            } else {
                eprintln!("Error: platform returned HTTP {}", status);
                Err(1)
            }
        }
        Outcome::Failure { status, body } => {
            eprintln!("Error: platform returned HTTP {}", status);
            if !body.is_empty() {
                eprintln!("{}", body);
            }
            Err(1)
        }
    }
}

fn print_graph(graph: Graph) -> Result<(), u8> {
    let text = serialize_graph(&graph, RdfSyntax::NTriples).map_err(fail)?;
    print!("{}", text);
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), u8> {
    let text = serde_json::to_string_pretty(value).map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;
    println!("{}", text);
    Ok(())
}
