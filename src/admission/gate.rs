//! Counting admission gate with soft back-off.
//!
//! # Responsibilities
//! - Bound the number of concurrently relayed requests
//! - Report saturation to the caller so it can back off
//! - Release capacity on every exit path via RAII
//!
//! # Design Decisions
//! - Admission is soft: a caller is never refused, only delayed. Acquisition
//!   waits for a free slot, and the caller that fills the gate to capacity is
//!   told so and expected to sleep a randomized delay before proceeding.
//! - The slot is reserved *before* saturation is evaluated, so a saturated
//!   caller still holds its slot during the back-off.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::observability::metrics;

/// Fixed-capacity counting gate for in-flight relay work.
///
/// The semaphore is the only state shared across requests. Capacity must be
/// at least 1; config validation enforces this before a gate is built.
pub struct AdmissionGate {
    slots: Arc<Semaphore>,
    capacity: usize,
    backoff_min: Duration,
    backoff_max: Duration,
}

impl AdmissionGate {
    /// Create a gate with `capacity` slots and the given back-off bounds.
    ///
    /// The bounds are injected here rather than read from a global so tests
    /// can use millisecond delays.
    pub fn new(capacity: usize, backoff_min: Duration, backoff_max: Duration) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
            backoff_min,
            backoff_max,
        }
    }

    /// Reserve one slot, waiting until capacity is free.
    ///
    /// The returned flag is `true` when the granted slot was the last one,
    /// i.e. this caller pushed the gate to full saturation and must apply
    /// [`AdmissionGate::backoff_delay`] before proceeding.
    pub async fn acquire(&self) -> (AdmissionSlot, bool) {
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .expect("admission semaphore closed unexpectedly");

        let saturated = self.slots.available_permits() == 0;
        metrics::record_slot_acquired();

        (AdmissionSlot { _permit: permit }, saturated)
    }

    /// Draw a uniform random back-off delay within the configured bounds.
    pub fn backoff_delay(&self) -> Duration {
        if self.backoff_min >= self.backoff_max {
            return self.backoff_min;
        }
        let range = self.backoff_min.as_millis() as u64..=self.backoff_max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(range))
    }

    /// Number of slots currently held.
    pub fn held(&self) -> usize {
        self.capacity - self.slots.available_permits()
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// A held admission slot.
///
/// Dropping the slot returns capacity to the gate, so release happens exactly
/// once per acquisition on every exit path, including panics.
#[derive(Debug)]
pub struct AdmissionSlot {
    _permit: OwnedSemaphorePermit,
}

impl Drop for AdmissionSlot {
    fn drop(&mut self) {
        metrics::record_slot_released();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_gate(capacity: usize) -> AdmissionGate {
        AdmissionGate::new(
            capacity,
            Duration::from_millis(1),
            Duration::from_millis(10),
        )
    }

    #[tokio::test]
    async fn saturation_reported_only_at_full() {
        let gate = test_gate(2);

        let (first, saturated) = gate.acquire().await;
        assert!(!saturated);
        assert_eq!(gate.held(), 1);

        let (_second, saturated) = gate.acquire().await;
        assert!(saturated);
        assert_eq!(gate.held(), 2);

        drop(first);
        assert_eq!(gate.held(), 1);
    }

    #[tokio::test]
    async fn slot_released_on_drop() {
        let gate = test_gate(1);

        let (slot, _) = gate.acquire().await;
        drop(slot);

        // A second acquisition must not block once the first slot is back.
        let acquired = tokio::time::timeout(Duration::from_secs(1), gate.acquire())
            .await
            .expect("gate leaked its only slot");
        assert!(acquired.1, "single-slot gate is saturated by any holder");
    }

    #[tokio::test]
    async fn peak_concurrency_never_exceeds_capacity() {
        const CAPACITY: usize = 3;
        const TASKS: usize = 24;

        let gate = Arc::new(test_gate(CAPACITY));
        let held = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..TASKS {
            let gate = gate.clone();
            let held = held.clone();
            let peak = peak.clone();
            tasks.push(tokio::spawn(async move {
                let (_slot, _) = gate.acquire().await;
                let now = held.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                held.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= CAPACITY);
        assert_eq!(held.load(Ordering::SeqCst), 0);
        assert_eq!(gate.held(), 0);
    }

    #[tokio::test]
    async fn no_starvation_under_static_load() {
        let gate = Arc::new(test_gate(1));

        // Every acquisition under load equal to capacity must eventually be
        // admitted.
        for _ in 0..10 {
            let (slot, saturated) = tokio::time::timeout(Duration::from_secs(1), gate.acquire())
                .await
                .expect("acquisition starved");
            assert!(saturated);
            drop(slot);
        }
    }

    #[test]
    fn backoff_delay_within_bounds() {
        let gate = AdmissionGate::new(
            1,
            Duration::from_millis(10),
            Duration::from_millis(50),
        );
        for _ in 0..100 {
            let delay = gate.backoff_delay();
            assert!(delay >= Duration::from_millis(10));
            assert!(delay <= Duration::from_millis(50));
        }
    }

    #[test]
    fn degenerate_backoff_range_returns_min() {
        let gate = AdmissionGate::new(1, Duration::from_secs(1), Duration::from_secs(1));
        assert_eq!(gate.backoff_delay(), Duration::from_secs(1));
    }
}
