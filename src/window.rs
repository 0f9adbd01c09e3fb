//! # Window Store
//! Fixed-capacity sliding window of observed integers, shared by every request.
//!
//! All reads that belong to one request (previous contents, current contents,
//! average) are taken under the same lock as the append that produced them.

use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard, PoisonError},
};

use metrics::{counter, gauge};

/// Default number of values kept in the window.
pub const DEFAULT_CAPACITY: usize = 10;

/// Result of a single [`WindowStore::observe`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Window contents before the append, or empty if the window was not yet full.
    pub previous: Vec<i64>,
    /// Window contents after the append and eviction.
    pub current: Vec<i64>,
    /// Mean of `current`; `0.0` when the window is empty.
    pub average: f64,
}

/// Thread-safe bounded FIFO window.
#[derive(Debug)]
pub struct WindowStore {
    inner: Mutex<VecDeque<i64>>,
    cap: usize,
}

impl WindowStore {
    /// Create an empty window. A capacity of 0 is clamped to 1.
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.max(1);
        gauge!("window_capacity").set(cap as f64);
        Self {
            inner: Mutex::new(VecDeque::with_capacity(cap)),
            cap,
        }
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Fold `new_values` into the window and return the snapshot pair plus average.
    ///
    /// `previous` is only reported when the window was already full before this
    /// call. An empty batch leaves the window untouched.
    pub fn observe(&self, new_values: &[i64]) -> Observation {
        let mut buf = self.lock();

        let previous = if buf.len() == self.cap {
            buf.iter().copied().collect()
        } else {
            Vec::new()
        };

        buf.extend(new_values.iter().copied());
        if buf.len() > self.cap {
            let excess = buf.len() - self.cap;
            buf.drain(..excess);
        }

        let current: Vec<i64> = buf.iter().copied().collect();
        // Published under the lock so the last writer always reports the latest length.
        gauge!("window_len").set(buf.len() as f64);
        drop(buf);

        counter!("window_observations_total").increment(1);

        let average = mean(&current);
        Observation {
            previous,
            current,
            average,
        }
    }

    /// Current contents and average without mutating; `previous` is always empty.
    pub fn snapshot(&self) -> Observation {
        let current: Vec<i64> = self.lock().iter().copied().collect();
        let average = mean(&current);
        Observation {
            previous: Vec::new(),
            current,
            average,
        }
    }

    // No holder leaves the deque mid-update, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, VecDeque<i64>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for WindowStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

fn mean(values: &[i64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum: i128 = values.iter().map(|&v| v as i128).sum();
    sum as f64 / values.len() as f64
}
