//! # HPKV Command Line
//!
//! Purpose: Drive the REST and WebSocket clients from a shell, either as a
//! full CRUD walkthrough or one operation at a time.
//!
//! ## Design Principles
//! 1. **Environment at the Edge**: Only this binary reads `HPKV_BASE_URL` and
//!    `HPKV_API_KEY`; the library crates take a `ClientConfig`.
//! 2. **Blocking by Default**: REST commands run on the main thread. A Tokio
//!    runtime is built only for `ws-crud`, since the blocking HTTP client
//!    must not run inside one.
//! 3. **Values on Stdout, Diagnostics via Tracing**: Structured values are
//!    printed as pretty JSON; logs go through `tracing`.

mod demo;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hpkv_client::{ClientConfig, HpkvResult, RangeQuery, RecordValue, RestClient};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// HPKV CLI
#[derive(Parser, Debug)]
#[command(name = "hpkv")]
#[command(about = "Client for the HPKV key-value service")]
struct Args {
    /// Base URL of the service
    #[arg(long, env = "HPKV_BASE_URL")]
    base_url: String,

    /// API key
    #[arg(long, env = "HPKV_API_KEY", hide_env_values = true)]
    api_key: String,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Fail WebSocket requests that get no response within this many milliseconds
    #[arg(long)]
    response_timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the CRUD walkthrough over REST
    Crud,

    /// Run the CRUD walkthrough over WebSocket
    WsCrud,

    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair (JSON values are stored as JSON)
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Atomically add to a numeric value, creating it at 0 if missing
    Incr {
        /// The counter key
        key: String,

        /// Amount to add (negative to subtract)
        #[arg(long, default_value_t = 1, allow_hyphen_values = true)]
        by: i64,
    },

    /// List records between two keys
    Range {
        /// First key (inclusive)
        start: String,

        /// Last key (inclusive)
        end: String,

        /// Maximum number of records
        #[arg(long)]
        limit: Option<u32>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,hpkv_client=debug")),
        )
        .with_target(true)
        .init();

    let args = Args::parse();
    let config = ClientConfig::builder()
        .base_url(args.base_url)
        .api_key(args.api_key)
        .request_timeout(Some(Duration::from_secs(args.timeout_secs)))
        .response_timeout(args.response_timeout_ms.map(Duration::from_millis))
        .build()
        .context("invalid configuration")?;
    info!(base_url = config.base_url(), "using HPKV service");

    match args.command {
        Commands::Crud => demo::run_rest(&RestClient::new(&config)?),
        Commands::WsCrud => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to start async runtime")?;
            runtime.block_on(demo::run_ws(&config))
        }
        Commands::Get { key } => {
            let client = RestClient::new(&config)?;
            match found(client.try_read(&key)).with_context(|| format!("failed to read {}", key))? {
                Some(value) => print_value(&value),
                None => {
                    println!("(not found)");
                    Ok(())
                }
            }
        }
        Commands::Set { key, value } => {
            let client = RestClient::new(&config)?;
            client
                .try_create(&key, RecordValue::from_wire(value))
                .with_context(|| format!("failed to write {}", key))?;
            println!("OK");
            Ok(())
        }
        Commands::Del { key } => {
            let client = RestClient::new(&config)?;
            let deleted = found(client.try_delete(&key))
                .with_context(|| format!("failed to delete {}", key))?;
            println!("{}", if deleted.is_some() { "OK" } else { "(not found)" });
            Ok(())
        }
        Commands::Incr { key, by } => {
            let client = RestClient::new(&config)?;
            let result = client
                .increment_or_init(&key, by)
                .with_context(|| format!("failed to increment {}", key))?;
            match result.new_value {
                Some(value) => println!("{}", value),
                None => println!("OK"),
            }
            Ok(())
        }
        Commands::Range { start, end, limit } => {
            let client = RestClient::new(&config)?;
            let mut query = RangeQuery::new(start, end);
            if let Some(limit) = limit {
                query = query.with_limit(limit);
            }
            let page = client.range(&query).context("range query failed")?;
            for record in &page.records {
                println!("{} = {}", record.key, render(&record.value)?);
            }
            println!(
                "({} records{})",
                page.count,
                if page.truncated { ", truncated" } else { "" }
            );
            Ok(())
        }
    }
}

/// Separates a missing record from real failures.
fn found<T>(result: HpkvResult<T>) -> HpkvResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

fn render(value: &RecordValue) -> Result<String> {
    Ok(match value {
        RecordValue::Json(json) => serde_json::to_string_pretty(json)?,
        RecordValue::Text(text) => text.clone(),
    })
}

fn print_value(value: &RecordValue) -> Result<()> {
    println!("{}", render(value)?);
    Ok(())
}
