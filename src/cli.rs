// src/cli.rs
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, bail};
use serde_json::Value;

use crate::bridge::{Controller, LogNotifier, reset_values};
use crate::bus;
use crate::config::consts::{LOCAL_FILE, RATES_URL, SNAPSHOT_FILE, STORE_DIR, SYNC_FILE};
use crate::config::{AlertSettings, Settings};
use crate::currency::{self, Currency, CurrencyNormalizer, OpenErApi};
use crate::filter;
use crate::listing::SnapshotFile;
use crate::model::{Status, Study};
use crate::pipeline::{PassOutcome, Pipeline, Trigger};
use crate::progress::Progress;
use crate::store::{JsonFileStore, KvStore, StudyStore, write_key};
use crate::watcher::{ChangeWatcher, FileChangeSource};

#[derive(Parser, Debug)]
#[command(name = "study_watch", version, about = "Watch a study listing for new paid studies")]
pub struct Cli {
    /// Directory holding settings, persisted studies and the log
    #[arg(long, global = true, env = "STUDY_WATCH_STORE", default_value = STORE_DIR)]
    pub store: PathBuf,

    /// HTML snapshot of the listing page [default: <store>/page.html]
    #[arg(long, global = true, env = "STUDY_WATCH_PAGE")]
    pub page: Option<PathBuf>,

    /// Exchange-rate endpoint
    #[arg(long, global = true, default_value = RATES_URL)]
    pub rates_url: String,

    /// Debug logging, echoed to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Watch the snapshot and announce new studies until Ctrl-C
    Watch,
    /// Run one extraction pass and print what was accepted
    Scan,
    /// Show the current studies window
    List {
        /// Case-insensitive match on title or researcher
        #[arg(long)]
        search: Option<String>,
    },
    /// Show the study history ledger
    History {
        /// Only the newest N entries
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Mark a study completed (approved)
    Complete { id: String },
    /// Record an approval outcome
    Outcome {
        id: String,
        status: Status,
        /// Amount actually paid
        #[arg(long)]
        pay: Option<f64>,
    },
    /// Drop the whole history ledger
    ClearHistory,
    /// Show exchange rates, refreshing them when stale
    Rates {
        /// Refresh even if the cached rates are fresh
        #[arg(long)]
        force: bool,
    },
    /// Counters and earnings
    Stats,
    /// Clear current studies and restore default settings
    Reset,
    /// Write one setting; VALUE is JSON, bare words are taken as strings
    Set { key: String, value: String },
}

struct Stores {
    sync: Arc<dyn KvStore>,
    local: Arc<dyn KvStore>,
    studies: StudyStore,
}

impl Stores {
    fn open(dir: &std::path::Path) -> Self {
        let sync: Arc<dyn KvStore> = Arc::new(JsonFileStore::new(dir.join(SYNC_FILE)));
        let local: Arc<dyn KvStore> = Arc::new(JsonFileStore::new(dir.join(LOCAL_FILE)));
        let studies = StudyStore::new(Arc::clone(&local));
        Self { sync, local, studies }
    }

    fn rates(&self) -> Arc<CurrencyNormalizer> {
        Arc::new(CurrencyNormalizer::new(Arc::clone(&self.local)))
    }
}

/// Prints a pass as it goes.
#[derive(Default)]
struct CliProgress {
    total: usize,
    done: usize,
}

impl Progress for CliProgress {
    fn begin(&mut self, total: usize) {
        self.total = total;
        eprintln!("{total} listed");
    }
    fn log(&mut self, msg: &str) {
        eprintln!("{msg}");
    }
    fn item_done(&mut self, id: &str) {
        self.done += 1;
        eprintln!("new: {id} ({}/{})", self.done, self.total);
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let echo = cli.verbose || matches!(cli.command, Command::Watch);
    crate::log::init(&cli.store, cli.verbose, echo)?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(execute(cli))
}

async fn execute(cli: Cli) -> Result<()> {
    let stores = Stores::open(&cli.store);
    let page = cli.page.clone().unwrap_or_else(|| cli.store.join(SNAPSHOT_FILE));

    match cli.command {
        Command::Watch => {
            let (tx, rx) = bus::channel();
            let pipeline = Pipeline::new(
                SnapshotFile::new(&page),
                Arc::clone(&stores.sync),
                stores.studies.clone(),
                stores.rates(),
            )
            .with_bus(tx);
            let watcher = ChangeWatcher::new(Arc::new(pipeline), Arc::new(FileChangeSource::new(&page)));
            let controller = Controller::new(watcher, Arc::new(LogNotifier), Arc::new(OpenErApi::new(&cli.rates_url)?));
            eprintln!("watching {} (Ctrl-C to stop)", page.display());
            controller
                .run(rx, async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await?;
        }

        Command::Scan => {
            let rates = stores.rates();
            rates.load_cached()?;
            let pipeline = Pipeline::new(SnapshotFile::new(&page), Arc::clone(&stores.sync), stores.studies.clone(), rates);
            let mut progress = CliProgress::default();
            match pipeline.run_pass(Trigger::Manual, Some(&mut progress))? {
                PassOutcome::Delta { extracted, accepted } => {
                    println!("{extracted} new, {} accepted", accepted.len());
                    print_studies(&accepted);
                }
                PassOutcome::NoListing { cleared } => {
                    println!("no studies listed{}", if cleared { " (current window cleared)" } else { "" });
                }
                other => println!("{other:?}"),
            }
        }

        Command::List { search } => {
            let settings = Settings::load(&*stores.sync)?;
            let current = stores.studies.current_studies()?;
            let shown: Vec<Study> = match search.as_deref() {
                Some(term) => filter::search(&current, term).into_iter().cloned().collect(),
                None => current,
            };
            print_studies(&shown);

            let rates = stores.rates();
            rates.load_cached()?;
            let total = currency::earnings_total(
                shown.iter().filter_map(|s| s.reward.as_deref()),
                &rates.table(),
                settings.currency,
            );
            println!("{} studies, {} total", shown.len(), currency::format(total, settings.currency));
        }

        Command::History { limit } => {
            let history = stores.studies.history()?;
            let skip = limit.map_or(0, |n| history.studies.len().saturating_sub(n));
            for e in history.studies.iter().skip(skip) {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    e.id(),
                    e.status,
                    if e.completed { "done" } else { "-" },
                    e.first_seen.format("%Y-%m-%d %H:%M"),
                    e.study.title.as_deref().unwrap_or("?"),
                );
            }
            println!("{} entries, updated {}", history.studies.len(), history.last_updated.to_rfc3339());
        }

        Command::Complete { id } => {
            if !stores.studies.mark_completed(&id, Utc::now())? {
                bail!("no study `{id}` in history");
            }
            println!("{id} completed");
        }

        Command::Outcome { id, status, pay } => {
            if !stores.studies.record_outcome(&id, status, pay)? {
                bail!("no study `{id}` in history");
            }
            println!("{id} {status}");
        }

        Command::ClearHistory => {
            stores.studies.clear_history(Utc::now())?;
            println!("history cleared");
        }

        Command::Rates { force } => {
            let rates = stores.rates();
            let provider = OpenErApi::new(&cli.rates_url)?;
            let outcome = if force {
                rates.refresh(&provider, Utc::now()).await
            } else {
                rates.refresh_if_stale(&provider, Utc::now()).await
            };
            let table = rates.table();
            println!("{outcome:?}, last update {}", rates.last_update().map_or(s!("never"), |t| t.to_rfc3339()));
            for c in Currency::ALL {
                println!("{}\t{:>8.4}\t{}", c.code(), table.rate(c), c.name());
            }
        }

        Command::Stats => {
            let settings = Settings::load(&*stores.sync)?;
            let history = stores.studies.history()?;
            let rates = stores.rates();
            rates.load_cached()?;

            let completed = history.studies.iter().filter(|e| e.completed).count();
            let approved: Vec<&str> = history
                .studies
                .iter()
                .filter(|e| e.status == Status::Approved)
                .filter_map(|e| e.study.reward.as_deref())
                .collect();
            let earned = currency::earnings_total(approved.iter().copied(), &rates.table(), settings.currency);

            println!("announced: {}", stores.studies.counter()?);
            println!("current:   {}", stores.studies.current_studies()?.len());
            println!("history:   {}", history.studies.len());
            println!("completed: {completed}");
            println!("approved:  {} ({})", approved.len(), currency::format(earned, settings.currency));
        }

        Command::Reset => {
            reset_values(&*stores.sync, &stores.studies)?;
            println!("defaults restored");
        }

        Command::Set { key, value } => {
            if !Settings::KEYS.contains(&key.as_str()) && !AlertSettings::KEYS.contains(&key.as_str()) {
                tracing::warn!(%key, "not a known setting, writing anyway");
            }
            let value: Value = serde_json::from_str(&value).unwrap_or(Value::String(value));
            write_key(&*stores.sync, &key, &value)?;
            println!("{key} = {value}");
        }
    }
    Ok(())
}

fn print_studies(studies: &[Study]) {
    for s in studies {
        println!(
            "{}\t{}\t{}\t{}\t{} | {}",
            s.id,
            s.reward.as_deref().unwrap_or("-"),
            s.reward_per_hour.as_deref().unwrap_or("-"),
            s.time.as_deref().unwrap_or("-"),
            s.title.as_deref().unwrap_or("?"),
            s.researcher.as_deref().unwrap_or("?"),
        );
    }
}
