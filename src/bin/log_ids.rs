use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use log_ids::{Diagnostics, IdIndexer, IndexerConfig, PairingMode, RunReport};
use tracing_subscriber::EnvFilter;

/// Exit status for every failure after argument parsing.
const FAILURE: u8 = 255;

#[derive(Parser)]
#[command(author, version, about = "Extract event and model ids from a JSON-lines log into <file>.ids", long_about = None)]
#[command(after_help = "ENVIRONMENT VARIABLES:
    LOG_IDS_SUFFIX       Output suffix appended to the input path [default: .ids]
    LOG_IDS_EVENT_KEY    Key holding the event id [default: _eventid]
    LOG_IDS_MODEL_KEY    Key holding the model id [default: _modelid]
    LOG_IDS_PAIRING      strict|lenient
    LOG_IDS_DIAGNOSTICS  collapsed|detailed
    RUST_LOG             Log filter, e.g. log_ids=debug

EXAMPLES:
    log-ids events.json                        # writes events.json.ids
    log-ids --pairing lenient events.json      # legacy key/value association
    log-ids --summary events.json              # print run statistics as JSON")]
struct Args {
    /// Line-delimited JSON file to index
    input: PathBuf,

    /// Suffix appended to the input path to name the output file
    #[arg(long)]
    suffix: Option<String>,

    /// Key whose string value is the event id
    #[arg(long)]
    event_key: Option<String>,

    /// Key whose string value is the model id
    #[arg(long)]
    model_key: Option<String>,

    /// Key/value association: strict or lenient
    #[arg(long)]
    pairing: Option<PairingMode>,

    /// Report malformed lines as collapsed (like a missing event id) or detailed
    #[arg(long)]
    diagnostics: Option<Diagnostics>,

    /// Print a JSON summary of the run to stdout
    #[arg(long)]
    summary: bool,
}

impl Args {
    fn apply(&self, config: &mut IndexerConfig) {
        if let Some(suffix) = &self.suffix {
            config.output_suffix = suffix.clone();
        }
        if let Some(key) = &self.event_key {
            config.keys.event = key.clone().into_bytes();
        }
        if let Some(key) = &self.model_key {
            config.keys.model = key.clone().into_bytes();
        }
        if let Some(mode) = self.pairing {
            config.pairing = mode;
        }
        if let Some(mode) = self.diagnostics {
            config.diagnostics = mode;
        }
    }
}

fn run(args: &Args) -> anyhow::Result<RunReport> {
    let mut config = IndexerConfig::from_env().context("invalid environment configuration")?;
    args.apply(&mut config);
    config.validate().context("invalid command line configuration")?;

    let mut indexer = IdIndexer::new(config);
    let report = indexer.index_file(&args.input)?;
    Ok(report)
}

fn main() -> ExitCode {
    let args = Args::parse();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    match run(&args) {
        Ok(report) => {
            if args.summary {
                match serde_json::to_string(&report) {
                    Ok(json) => println!("{}", json),
                    Err(e) => eprintln!("Warning: failed to render summary: {}", e),
                }
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{:#}", err);
            ExitCode::from(FAILURE)
        }
    }
}
