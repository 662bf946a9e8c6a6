use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{watch, Notify};
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info, warn};

use pulse_core::{load_state, save_state, AggregateStore};

/// Debounced writer of the aggregate store. Requests arriving while a write
/// is already pending are folded into it.
#[derive(Clone)]
pub struct Saver {
    inner: Arc<SaverInner>,
}

struct SaverInner {
    pending: AtomicBool,
    wake: Notify,
    writes: AtomicUsize,
    shutdown: watch::Sender<bool>,
}

impl Saver {
    pub fn spawn(
        store: Arc<AggregateStore>,
        path: PathBuf,
        debounce: Duration,
    ) -> (Self, JoinHandle<()>) {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let saver = Self {
            inner: Arc::new(SaverInner {
                pending: AtomicBool::new(false),
                wake: Notify::new(),
                writes: AtomicUsize::new(0),
                shutdown,
            }),
        };
        let handle = tokio::spawn(run(saver.clone(), store, path, debounce, shutdown_rx));
        (saver, handle)
    }

    pub fn schedule(&self) {
        if !self.inner.pending.swap(true, Ordering::AcqRel) {
            self.inner.wake.notify_one();
        }
    }

    pub fn writes(&self) -> usize {
        self.inner.writes.load(Ordering::Acquire)
    }

    /// Stops the background task after one last write.
    pub fn shutdown(&self) {
        let _ = self.inner.shutdown.send(true);
    }
}

async fn run(
    saver: Saver,
    store: Arc<AggregateStore>,
    path: PathBuf,
    debounce: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = saver.inner.wake.notified() => {}
            _ = shutdown.changed() => break,
        }
        tokio::select! {
            _ = tokio::time::sleep(debounce) => {}
            _ = shutdown.changed() => break,
        }
        saver.inner.pending.store(false, Ordering::Release);
        if let Err(err) = write_store(&store, &path).await {
            warn!(path = %path.display(), error = %err, "state save failed, will retry");
            saver.schedule();
        } else {
            saver.inner.writes.fetch_add(1, Ordering::AcqRel);
            debug!(path = %path.display(), version = store.version(), "state saved");
        }
    }
    saver.inner.pending.store(false, Ordering::Release);
    match write_store(&store, &path).await {
        Ok(()) => {
            saver.inner.writes.fetch_add(1, Ordering::AcqRel);
            info!(path = %path.display(), version = store.version(), "final state flush");
        }
        Err(err) => error!(path = %path.display(), error = %err, "final state flush failed"),
    }
}

async fn write_store(store: &AggregateStore, path: &Path) -> Result<()> {
    let state = store.to_persisted();
    let path = path.to_path_buf();
    task::spawn_blocking(move || save_state(&path, &state))
        .await
        .context("save task panicked")??;
    Ok(())
}

/// Loads a previous state file into `store`. A missing or unreadable file
/// leaves the store empty.
pub fn restore_store(store: &AggregateStore, path: &Path) {
    match load_state(path) {
        Ok(Some(state)) => store.restore(state),
        Ok(None) => info!(path = %path.display(), "no saved state, starting empty"),
        Err(err) => warn!(path = %path.display(), error = %err, "could not load saved state"),
    }
}
