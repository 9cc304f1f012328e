//! Process-wide run scheduler
//!
//! Every fetch run registers here for its lifetime. The number of registered
//! runs divides each run's concurrency budget, and a global in-flight counter
//! keeps the combined number of active items within the budget.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::trace;

#[derive(Debug, Default)]
struct SchedulerState {
    runs: AtomicUsize,
    in_flight: AtomicUsize,
}

/// Shared run and in-flight counters
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    state: Arc<SchedulerState>,
}

static GLOBAL: OnceLock<Scheduler> = OnceLock::new();

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// The scheduler shared by every run in the process
    pub fn global() -> &'static Scheduler {
        GLOBAL.get_or_init(Scheduler::new)
    }

    /// Register a run; the run is unregistered when the guard drops
    pub fn register(&self) -> RunGuard {
        let runs = self.state.runs.fetch_add(1, Ordering::SeqCst) + 1;
        trace!("Registered fetch run ({} active)", runs);
        RunGuard {
            scheduler: self.clone(),
            held: 0,
        }
    }

    /// Number of registered runs
    pub fn runs(&self) -> usize {
        self.state.runs.load(Ordering::SeqCst)
    }

    /// Items currently active across all runs
    pub fn in_flight(&self) -> usize {
        self.state.in_flight.load(Ordering::SeqCst)
    }

    fn try_acquire(&self, max_concurrent: usize) -> bool {
        self.state
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current < max_concurrent).then_some(current + 1)
            })
            .is_ok()
    }

    fn release(&self, count: usize) {
        if count > 0 {
            self.state.in_flight.fetch_sub(count, Ordering::SeqCst);
        }
    }
}

/// Registration of one fetch run
#[derive(Debug)]
pub struct RunGuard {
    scheduler: Scheduler,
    held: usize,
}

impl RunGuard {
    /// `max(1, max_concurrent / runs)`
    pub fn effective_concurrency(&self, max_concurrent: usize) -> usize {
        (max_concurrent / self.scheduler.runs().max(1)).max(1)
    }

    /// Take one in-flight slot if the shared budget allows it
    pub fn try_acquire(&mut self, max_concurrent: usize) -> bool {
        let acquired = self.scheduler.try_acquire(max_concurrent);
        if acquired {
            self.held += 1;
        }
        acquired
    }

    /// Give back one in-flight slot
    pub fn release(&mut self) {
        if self.held > 0 {
            self.held -= 1;
            self.scheduler.release(1);
        }
    }

    /// Slots held by this run
    pub fn held(&self) -> usize {
        self.held
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.scheduler.release(self.held);
        let runs = self.scheduler.state.runs.fetch_sub(1, Ordering::SeqCst) - 1;
        trace!("Unregistered fetch run ({} active)", runs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_drop() {
        let scheduler = Scheduler::new();
        {
            let _a = scheduler.register();
            let _b = scheduler.register();
            assert_eq!(scheduler.runs(), 2);
        }
        assert_eq!(scheduler.runs(), 0);
    }

    #[test]
    fn test_effective_concurrency() {
        let scheduler = Scheduler::new();
        let a = scheduler.register();
        assert_eq!(a.effective_concurrency(10), 10);
        let b = scheduler.register();
        assert_eq!(a.effective_concurrency(10), 5);
        let _c = scheduler.register();
        assert_eq!(b.effective_concurrency(10), 3);
        assert_eq!(b.effective_concurrency(1), 1);
    }

    #[test]
    fn test_global_in_flight_cap() {
        let scheduler = Scheduler::new();
        let mut a = scheduler.register();
        let mut b = scheduler.register();

        for _ in 0..7 {
            assert!(a.try_acquire(10));
        }
        for _ in 0..3 {
            assert!(b.try_acquire(10));
        }
        assert!(!b.try_acquire(10));
        assert_eq!(scheduler.in_flight(), 10);

        a.release();
        assert!(b.try_acquire(10));

        drop(a);
        assert_eq!(scheduler.in_flight(), 4);
        drop(b);
        assert_eq!(scheduler.in_flight(), 0);
    }
}
