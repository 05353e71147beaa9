//! Strongbox: order retry scheduling for the secrets service
//!
//! Main binary with subcommands:
//! - `retry-scheduler`: Run the periodic retry scheduler
//! - `list`: Show stored retry records
//! - `purge`: Remove a retry record by id
//! - `schedule`: Store a retry record by hand

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use strongbox_scheduler::{DEFAULT_INITIAL_DELAY_SECS, DEFAULT_PERIODIC_INTERVAL_MAX_SECS};
use strongbox_store::DEFAULT_LIMIT_PAGING;

mod admin;
mod daemon;

#[derive(Parser)]
#[command(name = "strongbox")]
#[command(about = "Retry scheduler for secrets service order tasks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the retry scheduler until interrupted
    RetryScheduler {
        /// Path of the retry task store file
        #[arg(long, env = "STRONGBOX_STORE_PATH")]
        store_path: PathBuf,

        /// Base URL of the worker task queue
        #[arg(long, env = "STRONGBOX_QUEUE_URL")]
        queue_url: String,

        /// Seconds to wait before the first check cycle
        #[arg(
            long,
            env = "STRONGBOX_RETRY_INITIAL_DELAY_SECONDS",
            default_value_t = DEFAULT_INITIAL_DELAY_SECS
        )]
        initial_delay_seconds: f64,

        /// Base interval in seconds between check cycles (jittered by ±20%)
        #[arg(
            long,
            env = "STRONGBOX_RETRY_PERIODIC_INTERVAL_MAX_SECONDS",
            default_value_t = DEFAULT_PERIODIC_INTERVAL_MAX_SECS
        )]
        periodic_interval_max_seconds: f64,

        /// Due records dispatched per cycle
        #[arg(long, default_value_t = DEFAULT_LIMIT_PAGING)]
        page_limit: usize,
    },

    /// List every stored retry record, oldest first
    List {
        /// Path of the retry task store file
        #[arg(long, env = "STRONGBOX_STORE_PATH")]
        store_path: PathBuf,
    },

    /// Remove a retry record without dispatching it
    Purge {
        /// Path of the retry task store file
        #[arg(long, env = "STRONGBOX_STORE_PATH")]
        store_path: PathBuf,

        /// Id of the record to remove
        id: String,
    },

    /// Store a retry record for a queue operation
    Schedule {
        /// Path of the retry task store file
        #[arg(long, env = "STRONGBOX_STORE_PATH")]
        store_path: PathBuf,

        /// Queue operation name (e.g. process_type_order)
        #[arg(long)]
        task: String,

        /// Positional arguments as a JSON array
        #[arg(long, default_value = "[]")]
        args: String,

        /// Keyword arguments as a JSON object
        #[arg(long, default_value = "{}")]
        kwargs: String,

        /// Order the retry belongs to
        #[arg(long)]
        order_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "strongbox=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::RetryScheduler {
            store_path,
            queue_url,
            initial_delay_seconds,
            periodic_interval_max_seconds,
            page_limit,
        } => {
            daemon::run(daemon::DaemonConfig {
                store_path,
                queue_url,
                initial_delay_seconds,
                periodic_interval_max_seconds,
                page_limit,
            })
            .await
        }

        Commands::List { store_path } => {
            let records = admin::list(&store_path)
                .await
                .map_err(|e| miette::miette!("{}", e))?;
            for record in records {
                println!(
                    "{}",
                    serde_json::to_string(&record).map_err(|e| miette::miette!("{}", e))?
                );
            }
            Ok(())
        }

        Commands::Purge { store_path, id } => {
            admin::purge(&store_path, &id)
                .await
                .map_err(|e| miette::miette!("failed to purge {}: {}", id, e))?;
            println!("purged {}", id);
            Ok(())
        }

        Commands::Schedule {
            store_path,
            task,
            args,
            kwargs,
            order_id,
        } => {
            let request = admin::ScheduleRequest::parse(&task, &args, &kwargs, order_id)
                .map_err(|e| miette::miette!("{}", e))?;
            let id = admin::schedule(&store_path, request)
                .await
                .map_err(|e| miette::miette!("failed to schedule {}: {}", task, e))?;
            println!("{}", id);
            Ok(())
        }
    }
}
