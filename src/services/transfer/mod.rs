//! Bulk transfers: a read-only scan phase that fixes the byte total, then a
//! fixed pool of workers draining one shared queue.

pub mod ops;
pub mod progress;
pub mod scan;

use crate::config::ExplorerConfig;
use crate::error::Result;
use crate::models::{BatchReport, FailureRecord, TransferItem};
use crate::services::expander::RecursiveExpander;
use crate::services::name_resolver::NameResolver;
use crate::services::pager::Pager;
use crate::services::storage::ObjectStore;
use ops::TransferOps;
use progress::{CancellationFlag, ProgressCallback, ProgressTracker, spawn_delivery};
use scan::{PlannedItem, Scanner};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use tokio::sync::{Mutex, mpsc};
use tracing::Instrument;
use uuid::Uuid;

const CANCELLED_ERROR: &str = "cancelled";
const WORKER_LOST_ERROR: &str = "transfer worker stopped unexpectedly";

pub struct TransferCoordinator {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    config: ExplorerConfig,
    expander: Arc<RecursiveExpander>,
}

impl TransferCoordinator {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>, config: ExplorerConfig) -> Self {
        let pager = Arc::new(Pager::new(store.clone(), config.pager_strategy));
        Self {
            expander: Arc::new(RecursiveExpander::new(pager)),
            store,
            bucket: bucket.into(),
            config,
        }
    }

    pub fn with_concurrency(mut self, transfer: usize, scan: usize) -> Self {
        self.config.transfer_concurrency = transfer.max(1);
        self.config.scan_concurrency = scan.max(1);
        self
    }

    /// Single-item operations with their own name resolver, for actions outside a batch
    pub fn ops(&self) -> TransferOps {
        TransferOps::new(
            self.store.clone(),
            self.bucket.clone(),
            Arc::new(self.new_resolver()),
            self.expander.clone(),
        )
    }

    fn new_resolver(&self) -> NameResolver {
        NameResolver::new(
            self.store.clone(),
            self.bucket.clone(),
            self.config.max_name_probes,
        )
    }

    /// Runs one batch to completion.
    ///
    /// Scan failures (and cancellation during the scan) abort before anything is written.
    /// Per-item failures after that never abort; they end up in the report.
    pub async fn run_batch(
        &self,
        items: Vec<TransferItem>,
        on_progress: Option<ProgressCallback>,
        cancel: &CancellationFlag,
    ) -> Result<BatchReport> {
        if items.is_empty() {
            return Ok(BatchReport::empty());
        }

        let batch_id = Uuid::new_v4();
        let kind = items[0].kind;
        let span = tracing::info_span!("transfer_batch", %batch_id, %kind);
        self.run(batch_id, items, on_progress, cancel.clone())
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        batch_id: Uuid,
        items: Vec<TransferItem>,
        on_progress: Option<ProgressCallback>,
        cancel: CancellationFlag,
    ) -> Result<BatchReport> {
        // One resolver per batch so reservations are shared by the scan and every worker.
        let resolver = Arc::new(self.new_resolver());
        let scanner = Scanner::new(self.bucket.clone(), resolver.clone(), self.expander.clone());

        tracing::info!("🔍 Scanning {} selected items", items.len());
        let planned = match scanner
            .plan_batch(&items, self.config.scan_concurrency, &cancel)
            .await
        {
            Ok(planned) => planned,
            Err(e) => {
                tracing::error!("Scan aborted: {}", e);
                return Err(e);
            }
        };

        let total_bytes: u64 = planned.iter().map(|p| p.size).sum();
        let total_items = planned.len();
        tracing::info!(
            "🚀 Transferring {} items ({} bytes) with {} workers",
            total_items,
            total_bytes,
            self.config.transfer_concurrency.min(total_items)
        );

        if total_items == 0 {
            return Ok(BatchReport {
                batch_id,
                progress: ProgressTracker::new(total_bytes, total_items, None).snapshot(),
                succeeded: 0,
                failures: Vec::new(),
            });
        }

        let (updates, delivery) = match on_progress {
            Some(callback) => {
                let (updates, delivery) = spawn_delivery(callback);
                (Some(updates), Some(delivery))
            }
            None => (None, None),
        };
        let tracker = Arc::new(ProgressTracker::new(total_bytes, total_items, updates));

        let (tx, rx) = mpsc::channel::<PlannedItem>(total_items);
        for item in planned {
            if tx.send(item).await.is_err() {
                break;
            }
        }
        drop(tx);
        let queue = Arc::new(Mutex::new(rx));

        let ops = Arc::new(TransferOps::new(
            self.store.clone(),
            self.bucket.clone(),
            resolver,
            self.expander.clone(),
        ));

        let tally = Arc::new(StdMutex::new(Tally::default()));
        let worker_count = self.config.transfer_concurrency.clamp(1, total_items);
        let mut handles = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let worker = Worker {
                id,
                queue: queue.clone(),
                ops: ops.clone(),
                tracker: tracker.clone(),
                tally: tally.clone(),
                cancel: cancel.clone(),
            };
            handles.push(tokio::spawn(worker.run().in_current_span()));
        }

        for (id, handle) in handles.into_iter().enumerate() {
            if let Err(e) = handle.await {
                tracing::error!("❌ Transfer worker {} stopped unexpectedly: {}", id, e);
                let mut tally = Tally::lock(&tally);
                if let Some(item_name) = tally.in_flight.remove(&id) {
                    tracker.record_failure();
                    tally.failures.push(FailureRecord {
                        item_name,
                        error: format!("{WORKER_LOST_ERROR}: {e}"),
                    });
                }
            }
        }

        // only left over when every worker died
        {
            let mut rx = queue.lock().await;
            let mut tally = Tally::lock(&tally);
            while let Ok(item) = rx.try_recv() {
                tracker.record_failure();
                tally.failures.push(FailureRecord {
                    item_name: item.name,
                    error: WORKER_LOST_ERROR.to_string(),
                });
            }
        }

        let (succeeded, failures) = {
            let mut tally = Tally::lock(&tally);
            (tally.succeeded, std::mem::take(&mut tally.failures))
        };

        let progress = tracker.snapshot();
        // the last sender goes with the tracker, which lets delivery drain and finish
        drop(tracker);
        if let Some(delivery) = delivery {
            if let Err(e) = delivery.await {
                tracing::warn!("Progress callback stopped: {}", e);
            }
        }

        if failures.is_empty() {
            tracing::info!("✅ Batch finished: {} items, {} bytes", succeeded, progress.transferred_bytes);
        } else {
            tracing::warn!(
                "⚠️ Batch finished with {} failures ({} succeeded)",
                failures.len(),
                succeeded
            );
        }

        Ok(BatchReport {
            batch_id,
            progress,
            succeeded,
            failures,
        })
    }
}

/// Results shared by the workers, so a worker that dies keeps what it already did
#[derive(Default)]
struct Tally {
    succeeded: usize,
    failures: Vec<FailureRecord>,
    /// Item each worker is executing, by worker id
    in_flight: HashMap<usize, String>,
}

impl Tally {
    fn lock(tally: &StdMutex<Tally>) -> MutexGuard<'_, Tally> {
        tally.lock().unwrap_or_else(|e| e.into_inner())
    }
}

struct Worker {
    id: usize,
    queue: Arc<Mutex<mpsc::Receiver<PlannedItem>>>,
    ops: Arc<TransferOps>,
    tracker: Arc<ProgressTracker>,
    tally: Arc<StdMutex<Tally>>,
    cancel: CancellationFlag,
}

impl Worker {
    /// Pops until the queue is drained
    async fn run(self) {
        loop {
            let next = self.queue.lock().await.recv().await;
            let Some(item) = next else {
                break;
            };

            if self.cancel.is_cancelled() {
                self.tracker.record_failure();
                Tally::lock(&self.tally).failures.push(FailureRecord {
                    item_name: item.name,
                    error: CANCELLED_ERROR.to_string(),
                });
                continue;
            }

            Tally::lock(&self.tally)
                .in_flight
                .insert(self.id, item.name.clone());
            let outcome = self.ops.execute(&item.op).await;

            let mut tally = Tally::lock(&self.tally);
            tally.in_flight.remove(&self.id);
            match outcome {
                Ok(()) => {
                    self.tracker.record_success(item.size);
                    tally.succeeded += 1;
                }
                Err(e) => {
                    tracing::warn!("Transfer of {} failed: {}", item.name, e);
                    self.tracker.record_failure();
                    tally.failures.push(FailureRecord {
                        item_name: item.name,
                        error: e.to_string(),
                    });
                }
            }
        }
    }
}
