//! Session control flags shared between the supervisor, the symbol
//! tasks and the control API
//!
//! All flags are atomics so readers never block the trading path. A
//! watch channel doubles as the wakeup for tasks sleeping between
//! cycles; the flags say why they were woken.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use tokio::sync::watch;

pub struct SessionControl {
    is_running: AtomicBool,
    should_stop: AtomicBool,
    /// Latched by an emergency halt; cleared by the next start
    emergency: AtomicBool,
    iteration_count: AtomicU64,
    started_at_unix: AtomicI64,
    wake_tx: watch::Sender<u64>,
}

impl SessionControl {
    pub fn new() -> Self {
        let (wake_tx, _) = watch::channel(0);
        Self {
            is_running: AtomicBool::new(false),
            should_stop: AtomicBool::new(false),
            emergency: AtomicBool::new(false),
            iteration_count: AtomicU64::new(0),
            started_at_unix: AtomicI64::new(0),
            wake_tx,
        }
    }

    /// Arm a fresh session; clears any latched emergency
    pub fn mark_started(&self) {
        self.should_stop.store(false, Ordering::SeqCst);
        self.emergency.store(false, Ordering::SeqCst);
        self.iteration_count.store(0, Ordering::SeqCst);
        self.started_at_unix
            .store(chrono::Utc::now().timestamp(), Ordering::SeqCst);
        self.is_running.store(true, Ordering::SeqCst);
    }

    pub fn mark_stopped(&self) {
        self.is_running.store(false, Ordering::SeqCst);
    }

    pub fn request_stop(&self) {
        self.should_stop.store(true, Ordering::SeqCst);
        let _ = self.wake_tx.send(1);
    }

    pub fn request_emergency(&self) {
        self.emergency.store(true, Ordering::SeqCst);
        self.should_stop.store(true, Ordering::SeqCst);
        let _ = self.wake_tx.send(2);
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub fn should_stop(&self) -> bool {
        self.should_stop.load(Ordering::SeqCst)
    }

    pub fn emergency_triggered(&self) -> bool {
        self.emergency.load(Ordering::SeqCst)
    }

    pub fn next_iteration(&self) -> u64 {
        self.iteration_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn iterations(&self) -> u64 {
        self.iteration_count.load(Ordering::SeqCst)
    }

    pub fn uptime_secs(&self) -> i64 {
        let started = self.started_at_unix.load(Ordering::SeqCst);
        if started > 0 && self.is_running() {
            (chrono::Utc::now().timestamp() - started).max(0)
        } else {
            0
        }
    }

    pub fn wake_receiver(&self) -> watch::Receiver<u64> {
        self.wake_tx.subscribe()
    }
}

impl Default for SessionControl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_clears_latched_emergency() {
        let control = SessionControl::new();
        control.mark_started();
        control.request_emergency();
        control.mark_stopped();
        assert!(control.emergency_triggered());
        assert!(!control.is_running());

        control.mark_started();
        assert!(!control.emergency_triggered());
        assert!(!control.should_stop());
        assert!(control.is_running());
    }

    #[test]
    fn emergency_implies_stop() {
        let control = SessionControl::new();
        control.mark_started();
        control.request_emergency();
        assert!(control.should_stop());
        assert!(control.emergency_triggered());
    }

    #[tokio::test]
    async fn stop_wakes_sleepers() {
        let control = SessionControl::new();
        let mut rx = control.wake_receiver();
        control.request_stop();
        assert!(rx.changed().await.is_ok());
    }
}
