//! CLI commands for RonyBase using clap.

pub mod filter;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;

use crate::config::{load_config, StoreConfig};
use crate::db::AsyncStore;

use filter::{Condition, Filter};

/// RonyBase - JSON document collections on local disk.
#[derive(Parser, Debug)]
#[command(name = "ronybase")]
#[command(version)]
#[command(about = "RonyBase - JSON document collections on local disk", long_about = None)]
pub struct Commands {
    /// Storage directory (default: ./db)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Write through a temp file and rename it over the collection
    #[arg(long, global = true)]
    pub atomic: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Reload a collection from disk and print its size
    Load {
        /// Collection name
        collection: String,
    },

    /// Insert one JSON record
    Insert {
        /// Collection name
        collection: String,

        /// Record as JSON
        record: String,
    },

    /// Print all records
    All {
        /// Collection name
        collection: String,

        /// Print on a single line
        #[arg(long)]
        compact: bool,
    },

    /// Print records matching the filters
    Find {
        /// Collection name
        collection: String,

        #[command(flatten)]
        filter: FilterArgs,

        /// Print on a single line
        #[arg(long)]
        compact: bool,
    },

    /// Merge a JSON patch into matching records
    Update {
        /// Collection name
        collection: String,

        /// Patch object as JSON
        patch: String,

        #[command(flatten)]
        filter: FilterArgs,

        /// Update every record when no filter is given
        #[arg(long)]
        all: bool,
    },

    /// Delete matching records
    Delete {
        /// Collection name
        collection: String,

        #[command(flatten)]
        filter: FilterArgs,

        /// Delete every record when no filter is given
        #[arg(long)]
        all: bool,
    },

    /// Print the number of records
    Count {
        /// Collection name
        collection: String,
    },

    /// List collections under the storage directory
    Collections,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Field equals value: FIELD=VALUE (VALUE is parsed as JSON, else taken as a string)
    #[arg(long = "where", value_name = "FIELD=VALUE", value_parser = filter::parse_eq)]
    pub eq: Vec<Condition>,

    /// String field matches regex: FIELD~REGEX
    #[arg(long = "match", value_name = "FIELD~REGEX", value_parser = filter::parse_match)]
    pub pattern: Vec<Condition>,
}

impl FilterArgs {
    pub fn to_filter(&self) -> Filter {
        Filter::new(self.eq.iter().chain(&self.pattern).cloned().collect())
    }
}

impl Commands {
    /// Resolve the store configuration from `--config`, `--root` and `--atomic`.
    pub fn store_config(&self) -> Result<StoreConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => StoreConfig::from_cwd()?,
        };
        if let Some(root) = &self.root {
            config.root = root.clone();
        }
        if self.atomic {
            config.atomic_writes = true;
        }
        Ok(config)
    }

    /// Run the command.
    pub async fn run(&self) -> Result<()> {
        let store: AsyncStore = AsyncStore::open(self.store_config()?).await?;
        let mut out = std::io::stdout();
        self.execute(&store, &mut out).await
    }

    /// Run the command against an open store, writing results to `out`.
    pub async fn execute<W: Write>(&self, store: &AsyncStore, out: &mut W) -> Result<()> {
        match &self.command {
            Command::Load { collection } => {
                let count = store.load(collection).await?;
                writeln!(out, "Loaded {} records from {}", count, collection)?;
            }
            Command::Insert { collection, record } => {
                let record: Value = serde_json::from_str(record)
                    .with_context(|| format!("Invalid JSON record: {}", record))?;
                store.insert(collection, record).await?;
                writeln!(out, "Inserted into {}", collection)?;
            }
            Command::All { collection, compact } => {
                let records = store.get_all(collection).await?;
                print_records(out, &records, *compact)?;
            }
            Command::Find { collection, filter, compact } => {
                let filter = filter.to_filter();
                let records = store
                    .find(collection, move |record| filter.matches(record))
                    .await?;
                print_records(out, &records, *compact)?;
            }
            Command::Update { collection, patch, filter, all } => {
                let patch: Value = serde_json::from_str(patch)
                    .with_context(|| format!("Invalid JSON patch: {}", patch))?;
                if !patch.is_object() {
                    bail!("Patch must be a JSON object");
                }
                let filter = require_filter(filter, *all, "update")?;
                let updated = store
                    .update(collection, move |record| filter.matches(record), patch)
                    .await?;
                writeln!(out, "Updated {} records in {}", updated, collection)?;
            }
            Command::Delete { collection, filter, all } => {
                let filter = require_filter(filter, *all, "delete")?;
                let removed = store
                    .delete(collection, move |record| filter.matches(record))
                    .await?;
                writeln!(out, "Deleted {} records from {}", removed, collection)?;
            }
            Command::Count { collection } => {
                writeln!(out, "{}", store.count(collection).await?)?;
            }
            Command::Collections => {
                for name in store.list_collections().await? {
                    writeln!(out, "{}", name)?;
                }
            }
        }
        Ok(())
    }
}

/// Refuse to touch every record unless `--all` was given explicitly.
fn require_filter(args: &FilterArgs, all: bool, action: &str) -> Result<Filter> {
    let filter = args.to_filter();
    if filter.is_empty() && !all {
        bail!(
            "Refusing to {} every record without a filter; pass --where/--match or --all",
            action
        );
    }
    Ok(filter)
}

fn print_records<W: Write>(out: &mut W, records: &[Value], compact: bool) -> Result<()> {
    let rendered = if compact {
        serde_json::to_string(records)?
    } else {
        serde_json::to_string_pretty(records)?
    };
    writeln!(out, "{}", rendered)?;
    Ok(())
}
