use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use s3_explorer::infrastructure::storage;
use s3_explorer::services::projector::filter_entries;
use s3_explorer::utils::format::{format_bytes, summarize_failures};
use s3_explorer::utils::keys::{DELIMITER, breadcrumbs, display_name};
use s3_explorer::{
    BatchReport, CancellationFlag, Entry, ExplorerConfig, ObjectStore, Pager, ProgressCallback,
    ProgressSnapshot, StoreConfig, TransferCoordinator, TransferItem,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Failed item names printed before collapsing into "and N more"
const FAILURES_SHOWN: usize = 5;

#[derive(Parser)]
#[command(name = "s3-explorer", version, about = "Browse and transfer objects in S3-compatible storage")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List buckets
    Buckets,
    /// List one folder level, one page at a time
    Ls {
        bucket: String,
        #[arg(default_value = "")]
        prefix: String,
        #[arg(long)]
        marker: Option<String>,
        #[arg(long)]
        page_size: Option<usize>,
        /// Case-insensitive name filter applied to the page
        #[arg(long)]
        filter: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Create an empty folder, renamed if the name is taken
    Mkdir {
        bucket: String,
        prefix: String,
        name: String,
    },
    /// Upload local files and directories into a prefix
    Upload {
        bucket: String,
        prefix: String,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Download keys (folders end in '/') into a local directory
    Download {
        bucket: String,
        dest: PathBuf,
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Delete keys; folders are removed with everything below them
    Rm {
        bucket: String,
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Copy keys into another prefix of the same bucket
    Cp {
        bucket: String,
        dest_prefix: String,
        #[arg(required = true)]
        keys: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "s3_explorer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let store_config = StoreConfig::from_env()?;
    let config = ExplorerConfig::from_env();
    info!(
        "⚙️  Transfer workers={}, scan workers={}, pager={:?}",
        config.transfer_concurrency, config.scan_concurrency, config.pager_strategy
    );

    let store: Arc<dyn ObjectStore> = storage::setup_storage(&store_config).await;

    match cli.command {
        Command::Buckets => {
            for bucket in store.list_buckets().await? {
                println!("{bucket}");
            }
        }
        Command::Ls {
            bucket,
            prefix,
            marker,
            page_size,
            filter,
            json,
        } => {
            let pager = Pager::new(store.clone(), config.pager_strategy);
            let page = pager
                .fetch_page(
                    &bucket,
                    &prefix,
                    marker.as_deref(),
                    page_size.unwrap_or(config.page_size),
                )
                .await?;
            let entries = match filter.as_deref() {
                Some(term) => filter_entries(&page.entries, term),
                None => page.entries.clone(),
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                let trail: Vec<String> = breadcrumbs(&prefix).into_iter().map(|c| c.label).collect();
                println!("{bucket}{DELIMITER}{}", trail.join(" / "));
                for entry in &entries {
                    print_entry(entry);
                }
            }
            if let Some(next) = page.next_marker {
                println!("-- more: --marker {next}");
            }
        }
        Command::Mkdir {
            bucket,
            prefix,
            name,
        } => {
            let coordinator = TransferCoordinator::new(store.clone(), bucket, config);
            let created = coordinator.ops().create_folder(&prefix, &name).await?;
            println!("{created}");
        }
        Command::Upload {
            bucket,
            prefix,
            paths,
        } => {
            let mut items = Vec::with_capacity(paths.len());
            for path in &paths {
                let meta = tokio::fs::metadata(path)
                    .await
                    .with_context(|| format!("Cannot read {}", path.display()))?;
                if meta.is_dir() {
                    items.push(TransferItem::upload_folder(path, &prefix));
                } else {
                    items.push(TransferItem::upload(path, &prefix, meta.len()));
                }
            }
            run_batch(store, bucket, config, items).await?;
        }
        Command::Download { bucket, dest, keys } => {
            let items = keys
                .iter()
                .map(|key| TransferItem::download(&entry_for_key(key), &dest))
                .collect();
            run_batch(store, bucket, config, items).await?;
        }
        Command::Rm { bucket, keys } => {
            let items = keys
                .iter()
                .map(|key| TransferItem::delete(&entry_for_key(key)))
                .collect();
            run_batch(store, bucket, config, items).await?;
        }
        Command::Cp {
            bucket,
            dest_prefix,
            keys,
        } => {
            let items = keys
                .iter()
                .map(|key| TransferItem::copy(&entry_for_key(key), &dest_prefix))
                .collect();
            run_batch(store, bucket, config, items).await?;
        }
    }

    Ok(())
}

fn entry_for_key(key: &str) -> Entry {
    if key.ends_with(DELIMITER) {
        Entry::folder(display_name(key), key)
    } else {
        Entry::file(display_name(key), key, 0, None)
    }
}

fn print_entry(entry: &Entry) {
    if entry.is_folder {
        println!("{:>10}  {:19}  {}{}", "-", "", entry.name, DELIMITER);
    } else {
        println!(
            "{:>10}  {:19}  {}",
            format_bytes(entry.size),
            entry.last_modified_display(),
            entry.name
        );
    }
}

async fn run_batch(
    store: Arc<dyn ObjectStore>,
    bucket: String,
    config: ExplorerConfig,
    items: Vec<TransferItem>,
) -> anyhow::Result<()> {
    let coordinator = TransferCoordinator::new(store, bucket, config);
    let cancel = CancellationFlag::new();

    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("🛑 Cancelling, waiting for running transfers...");
            on_ctrl_c.cancel();
        }
    });

    let on_progress: ProgressCallback = Arc::new(|snapshot: ProgressSnapshot| {
        info!(
            "📦 {}/{} items, {} of {} ({:.0}%)",
            snapshot.completed_items,
            snapshot.total_items,
            format_bytes(snapshot.transferred_bytes),
            format_bytes(snapshot.total_bytes),
            snapshot.fraction() * 100.0
        );
    });

    let report: BatchReport = coordinator
        .run_batch(items, Some(on_progress), &cancel)
        .await?;

    if report.is_success() {
        info!(
            "✅ {} items done ({})",
            report.succeeded,
            format_bytes(report.progress.transferred_bytes)
        );
        Ok(())
    } else {
        anyhow::bail!(
            "{} of {} items failed: {}",
            report.failures.len(),
            report.progress.total_items,
            summarize_failures(&report.failures, FAILURES_SHOWN)
        )
    }
}
