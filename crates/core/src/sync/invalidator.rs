//! Debounced invalidation of the snapshot.
//!
//! Push notifications arrive in bursts (a bulk lot import, a price tick across
//! many assets). The invalidator turns each burst into a single silent refresh
//! issued one debounce window after the *first* notification. Notifications
//! that arrive while a window is pending are absorbed and do not extend it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use super::worker::RefreshTrigger;

/// Cloneable sender side handed to the subscription pump.
#[derive(Debug, Clone)]
pub struct InvalidationNotifier {
    tx: mpsc::UnboundedSender<()>,
}

impl InvalidationNotifier {
    #[cfg(test)]
    pub(crate) fn for_test(tx: mpsc::UnboundedSender<()>) -> Self {
        Self { tx }
    }

    /// Records one change notification. Never blocks.
    pub fn notify(&self) {
        // A closed channel means the invalidator was torn down.
        let _ = self.tx.send(());
    }
}

/// Collapses bursts of notifications into one delayed silent refresh.
#[derive(Debug)]
pub struct DebouncedInvalidator {
    notifier: InvalidationNotifier,
    pending: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl DebouncedInvalidator {
    pub fn start(window: Duration, trigger: RefreshTrigger) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(debounce_loop(rx, window, pending.clone(), trigger));

        Self {
            notifier: InvalidationNotifier { tx },
            pending,
            handle,
        }
    }

    pub fn notifier(&self) -> InvalidationNotifier {
        self.notifier.clone()
    }

    pub fn notify(&self) {
        self.notifier.notify();
    }

    /// Whether a debounce window is currently open.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    /// Cancels any pending window without firing it.
    pub fn stop(&self) {
        self.handle.abort();
        self.pending.store(false, Ordering::SeqCst);
    }
}

impl Drop for DebouncedInvalidator {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn debounce_loop(
    mut rx: mpsc::UnboundedReceiver<()>,
    window: Duration,
    pending: Arc<AtomicBool>,
    trigger: RefreshTrigger,
) {
    // idle: wait for the first notification of a burst
    while rx.recv().await.is_some() {
        pending.store(true, Ordering::SeqCst);
        let deadline = Instant::now() + window;
        let timer = sleep_until(deadline);
        tokio::pin!(timer);
        let mut absorbed = 0usize;

        // pending: absorb notifications until the window closes
        loop {
            tokio::select! {
                _ = &mut timer => break,
                message = rx.recv() => match message {
                    Some(()) => absorbed += 1,
                    None => {
                        pending.store(false, Ordering::SeqCst);
                        return;
                    }
                },
            }
        }

        pending.store(false, Ordering::SeqCst);
        debug!(
            "Debounce window elapsed ({} notification(s)), requesting silent refresh",
            absorbed + 1
        );
        if !trigger.silent() {
            return;
        }
    }
}
