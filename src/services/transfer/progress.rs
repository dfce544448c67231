use crate::models::ProgressSnapshot;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub type ProgressCallback = Arc<dyn Fn(ProgressSnapshot) + Send + Sync>;

pub type ProgressSender = mpsc::UnboundedSender<ProgressSnapshot>;

/// Runs `callback` on a blocking thread for every snapshot, in send order.
///
/// The returned handle finishes once every sender is dropped and the backlog is delivered.
pub fn spawn_delivery(callback: ProgressCallback) -> (ProgressSender, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<ProgressSnapshot>();
    let handle = tokio::task::spawn_blocking(move || {
        while let Some(snapshot) = rx.blocking_recv() {
            callback(snapshot);
        }
    });
    (tx, handle)
}

/// Shared stop switch for a running batch. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Byte and item counters for one batch.
///
/// `total_bytes` is fixed at construction; `transferred_bytes` only grows, through
/// atomic adds of the sizes of items that finished successfully.
pub struct ProgressTracker {
    total_bytes: u64,
    total_items: usize,
    transferred_bytes: AtomicU64,
    completed_items: AtomicUsize,
    updates: Option<ProgressSender>,
    // Snapshot and send happen together so the queue never goes backwards.
    emit_lock: Mutex<()>,
}

impl ProgressTracker {
    pub fn new(total_bytes: u64, total_items: usize, updates: Option<ProgressSender>) -> Self {
        Self {
            total_bytes,
            total_items,
            transferred_bytes: AtomicU64::new(0),
            completed_items: AtomicUsize::new(0),
            updates,
            emit_lock: Mutex::new(()),
        }
    }

    pub fn record_success(&self, bytes: u64) {
        self.transferred_bytes.fetch_add(bytes, Ordering::SeqCst);
        self.completed_items.fetch_add(1, Ordering::SeqCst);
        self.emit();
    }

    /// Failed or cancelled items count as completed but move no bytes
    pub fn record_failure(&self) {
        self.completed_items.fetch_add(1, Ordering::SeqCst);
        self.emit();
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            transferred_bytes: self.transferred_bytes.load(Ordering::SeqCst),
            total_bytes: self.total_bytes,
            completed_items: self.completed_items.load(Ordering::SeqCst),
            total_items: self.total_items,
        }
    }

    fn emit(&self) {
        if let Some(updates) = &self.updates {
            let _guard = self.emit_lock.lock().unwrap_or_else(|e| e.into_inner());
            // a closed channel means the callback is gone; counting carries on
            let _ = updates.send(self.snapshot());
        }
    }
}
