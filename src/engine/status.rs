// src/engine/status.rs

//! Run-scoped shared state: halt flag, interrupt signal and the blacklist of
//! units that must not be built because something they depend on failed.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tracing::{debug, info};

use crate::types::BuildUnit;

#[derive(Debug, Default)]
pub struct BuildStatus {
    halted: AtomicBool,
    interrupted: AtomicBool,
    interrupt: Notify,
    blacklist: Mutex<HashSet<BuildUnit>>,
}

impl BuildStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop new submissions. Running build actions are left alone.
    pub fn halt(&self) {
        if !self.halted.swap(true, Ordering::SeqCst) {
            info!("reactor halted; no further modules will be started");
        }
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Operator abort. Wakes the coordinator, which records the interrupt
    /// and halts the run.
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
        self.interrupt.notify_waiters();
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Resolves once [`BuildStatus::interrupt`] has been called (immediately
    /// if it already was).
    pub async fn wait_for_interrupt(&self) {
        loop {
            let notified = self.interrupt.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_interrupted() {
                return;
            }
            notified.await;
        }
    }

    pub fn blacklist<I>(&self, units: I)
    where
        I: IntoIterator<Item = BuildUnit>,
    {
        let mut guard = self.blacklist.lock().unwrap_or_else(|e| e.into_inner());
        for unit in units {
            debug!(unit = %unit, "blacklisting unit after upstream failure");
            guard.insert(unit);
        }
    }

    pub fn is_blacklisted(&self, unit: &BuildUnit) -> bool {
        self.blacklist
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(unit)
    }
}

/// Cloneable handle for halting or interrupting a run from outside the
/// scheduler (signal handlers, build actions, tests).
#[derive(Debug, Clone)]
pub struct HaltHandle {
    status: Arc<BuildStatus>,
}

impl HaltHandle {
    pub fn new(status: Arc<BuildStatus>) -> Self {
        Self { status }
    }

    pub fn halt(&self) {
        self.status.halt();
    }

    pub fn interrupt(&self) {
        self.status.interrupt();
    }

    pub fn is_halted(&self) -> bool {
        self.status.is_halted()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn interrupt_wakes_a_waiting_coordinator() {
        let status = Arc::new(BuildStatus::new());
        let handle = HaltHandle::new(Arc::clone(&status));

        let waiter = {
            let status = Arc::clone(&status);
            tokio::spawn(async move { status.wait_for_interrupt().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.interrupt();

        tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("waiter should wake")
            .expect("waiter should not panic");
        assert!(status.is_interrupted());
        // Interrupting does not halt by itself; the coordinator does that.
        assert!(!status.is_halted());
    }

    #[tokio::test]
    async fn wait_returns_immediately_after_earlier_interrupt() {
        let status = BuildStatus::new();
        status.interrupt();
        tokio::time::timeout(Duration::from_millis(100), status.wait_for_interrupt())
            .await
            .expect("already interrupted");
    }

    #[test]
    fn blacklist_is_queryable() {
        let status = BuildStatus::new();
        status.blacklist([BuildUnit::from("D")]);
        assert!(status.is_blacklisted(&BuildUnit::from("D")));
        assert!(!status.is_blacklisted(&BuildUnit::from("C")));
    }
}
