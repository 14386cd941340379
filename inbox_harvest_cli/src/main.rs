use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use dotenv::dotenv;
use inbox_harvest_cli::{
    classify,
    harvester::{self, HarvestConfig},
    store::{self, FirebaseStore, RecordStore, DEFAULT_COLLECTION},
    utils,
    viewport::HtmlViewport,
    StoredRecord,
};
use std::{collections::BTreeMap, path::PathBuf, time::Duration};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scroll through a rendered inbox page and collect every distinct row
    Harvest(HarvestArgs),
    /// Split rows from an inbox snapshot into records and store them
    Upload(UploadArgs),
    /// Classify stored records into unit, date, hour, topic and audience
    Classify(ClassifyArgs),
}

#[derive(ClapArgs, Debug)]
struct StoreArgs {
    /// Realtime Database base URL
    #[arg(long, env = "FIREBASE_URL")]
    firebase_url: Option<String>,

    /// Collection the records live in
    #[arg(long, default_value = DEFAULT_COLLECTION)]
    collection: String,
}

impl StoreArgs {
    fn open(&self) -> Result<FirebaseStore> {
        let Some(url) = self.firebase_url.as_deref() else {
            bail!("FIREBASE_URL is not set (use --firebase-url or .env)");
        };
        Ok(FirebaseStore::new(url)?)
    }
}

#[derive(ClapArgs, Debug)]
struct HarvestArgs {
    /// Saved inbox page to scroll through
    #[arg(short, long)]
    snapshot: PathBuf,

    /// Rows visible at once
    #[arg(long, default_value_t = 20)]
    page_size: usize,

    /// Stop after this many distinct rows
    #[arg(short, long, default_value_t = 2000)]
    target: usize,

    /// Stop after this many rounds without a new row
    #[arg(long, default_value_t = 150)]
    max_stable: usize,

    /// Pause after each scroll, in milliseconds
    #[arg(long, default_value_t = 800)]
    settle_ms: u64,

    /// Where to write the collected rows
    #[arg(short, long, default_value = "emails_full.html")]
    out: PathBuf,

    /// Also store the collected rows
    #[arg(long)]
    upload: bool,

    /// Number of concurrent store requests
    #[arg(short, long, default_value_t = 5)]
    concurrent: usize,

    #[command(flatten)]
    store: StoreArgs,
}

#[derive(ClapArgs, Debug)]
struct UploadArgs {
    /// Inbox snapshot written by `harvest`
    #[arg(short, long, default_value = "emails_full.html")]
    input: PathBuf,

    /// Number of concurrent store requests
    #[arg(short, long, default_value_t = 5)]
    concurrent: usize,

    #[command(flatten)]
    store: StoreArgs,
}

#[derive(ClapArgs, Debug)]
struct ClassifyArgs {
    /// JSON map of id -> record; read from the store when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Where to write the classified records
    #[arg(short, long, default_value = "classified.json")]
    out: PathBuf,

    #[command(flatten)]
    store: StoreArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("inbox_harvest_cli=info".parse()?),
        )
        .init();

    match Args::parse().command {
        Command::Harvest(args) => run_harvest(args).await,
        Command::Upload(args) => run_upload(args).await,
        Command::Classify(args) => run_classify(args).await,
    }
}

async fn run_harvest(args: HarvestArgs) -> Result<()> {
    let html = std::fs::read_to_string(&args.snapshot)
        .with_context(|| format!("reading {}", args.snapshot.display()))?;
    let mut viewport = HtmlViewport::from_html(&html, args.page_size);

    viewport.ensure_ready()?;

    let config = HarvestConfig {
        target_count: args.target,
        max_stable_rounds: args.max_stable,
        settle_delay: Duration::from_millis(args.settle_ms),
    };
    let report = harvester::harvest(&mut viewport, &config).await?;

    info!(
        rows = report.items.len(),
        rounds = report.rounds.len(),
        termination = ?report.termination,
        "harvest finished"
    );
    utils::save_snapshot(&report.items, &args.out)?;

    if args.upload {
        let records: Vec<StoredRecord> = report.items.iter().map(StoredRecord::from).collect();
        store_records(&args.store, &records, args.concurrent).await?;
    }
    Ok(())
}

async fn run_upload(args: UploadArgs) -> Result<()> {
    let html = std::fs::read_to_string(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let viewport = HtmlViewport::from_html(&html, 1);

    let records: Vec<StoredRecord> = viewport.rows().iter().map(StoredRecord::from).collect();
    if records.is_empty() {
        warn!(path = %args.input.display(), "snapshot has no rows");
        return Ok(());
    }
    store_records(&args.store, &records, args.concurrent).await
}

async fn store_records(store_args: &StoreArgs, records: &[StoredRecord], concurrent: usize) -> Result<()> {
    let store = store_args.open()?;
    let summary = store::upload(&store, &store_args.collection, records, concurrent).await;

    info!(
        stored = summary.stored,
        failed = summary.failures.len(),
        collection = %store_args.collection,
        "upload finished"
    );
    if !summary.failures.is_empty() {
        bail!("{} of {} records were not stored", summary.failures.len(), records.len());
    }
    Ok(())
}

async fn run_classify(args: ClassifyArgs) -> Result<()> {
    let records: BTreeMap<String, StoredRecord> = match &args.input {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            store::decode_collection(serde_json::from_str(&text)?)
        }
        None => args.store.open()?.get_all(&args.store.collection).await?,
    };

    if records.is_empty() {
        warn!("no records to classify");
        return Ok(());
    }

    let classified = classify::classify(records.values());
    info!(records = classified.len(), "classified records");
    utils::save_json(&classified, &args.out)?;
    Ok(())
}
