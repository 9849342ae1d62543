//! Admission control for per-record pipelines

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{Error, Result};

/// Caps how many record pipelines run at once.
///
/// A pipeline must hold an [`Admission`] for its whole lifetime; dropping it
/// (on success, error, or unwind) frees the slot.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    counters: Arc<GateCounters>,
    limit: usize,
}

#[derive(Debug, Default)]
struct GateCounters {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

/// RAII slot handed out by [`AdmissionGate::admit`].
#[derive(Debug)]
pub struct Admission {
    _permit: OwnedSemaphorePermit,
    counters: Arc<GateCounters>,
}

impl AdmissionGate {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            counters: Arc::new(GateCounters::default()),
            limit,
        }
    }

    /// Wait for a free slot.
    pub async fn admit(&self) -> Result<Admission> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|error| Error::Task(format!("admission gate closed: {error}")))?;

        let in_flight = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(in_flight, Ordering::SeqCst);

        Ok(Admission {
            _permit: permit,
            counters: Arc::clone(&self.counters),
        })
    }

    pub const fn limit(&self) -> usize {
        self.limit
    }

    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous admissions seen so far.
    pub fn peak(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }
}

impl Drop for Admission {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
