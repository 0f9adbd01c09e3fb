// tests/window_concurrency.rs
//
// Many concurrent observers on one shared window, on a multi-threaded runtime.
// Inputs are disjoint, so every returned `current` identifies the call that
// produced it and the lock order can be reconstructed from the results.

use std::collections::HashSet;
use std::sync::Arc;

use rand::Rng;

use numbers_window::{Observation, WindowStore};

const CAP: usize = 10;
const CALLS: i64 = 64;

fn batches() -> Vec<Vec<i64>> {
    let mut rng = rand::rng();
    (0..CALLS)
        .map(|c| {
            let n = rng.random_range(0..=5);
            (0..n).map(|i| c * 100 + i).collect()
        })
        .collect()
}

async fn run_concurrently(
    window: Arc<WindowStore>,
    inputs: Vec<Vec<i64>>,
) -> Vec<(Vec<i64>, Observation)> {
    let handles: Vec<_> = inputs
        .into_iter()
        .map(|batch| {
            let w = Arc::clone(&window);
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                let obs = w.observe(&batch);
                (batch, obs)
            })
        })
        .collect();

    let mut out = Vec::with_capacity(handles.len());
    for h in handles {
        out.push(h.await.expect("observer task panicked"));
    }
    out
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_observes_form_a_valid_serialization() {
    let window = Arc::new(WindowStore::with_capacity(CAP));
    let results = run_concurrently(window.clone(), batches()).await;

    for (batch, obs) in &results {
        assert!(obs.current.len() <= CAP);
        assert!(obs.previous.is_empty() || obs.previous.len() == CAP);

        // current must be previous-then-batch, cut to the newest CAP values.
        if !obs.previous.is_empty() {
            let mut expect: Vec<i64> = obs.previous.iter().chain(batch).copied().collect();
            let excess = expect.len().saturating_sub(CAP);
            expect.drain(..excess);
            assert_eq!(obs.current, expect);
        }
        assert!(obs.current.ends_with(batch), "own batch must be the newest values");
    }

    // Every reported previous window was the current of some earlier call.
    let currents: HashSet<&[i64]> = results
        .iter()
        .filter(|(b, _)| !b.is_empty())
        .map(|(_, o)| o.current.as_slice())
        .collect();
    for (_, obs) in &results {
        if !obs.previous.is_empty() {
            assert!(
                currents.contains(obs.previous.as_slice()),
                "previous {:?} was never a published window",
                obs.previous
            );
        }
    }

    let final_window = window.snapshot().current;
    assert!(final_window.len() <= CAP);
    let mut dedup = final_window.clone();
    dedup.sort_unstable();
    dedup.dedup();
    assert_eq!(dedup.len(), final_window.len(), "duplicated values in final window");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_observes_without_eviction_keep_every_value() {
    let inputs = batches();
    let total: usize = inputs.iter().map(Vec::len).sum();
    let window = Arc::new(WindowStore::with_capacity(total.max(1)));

    let results = run_concurrently(window.clone(), inputs).await;
    let final_window = window.snapshot().current;
    assert_eq!(final_window.len(), total);

    // Each batch appears contiguously and in order.
    for (batch, obs) in &results {
        if batch.is_empty() {
            continue;
        }
        let pos = final_window
            .windows(batch.len())
            .position(|w| w == batch.as_slice())
            .expect("batch must appear contiguously");
        // And the caller saw exactly the prefix ending with its batch.
        assert_eq!(obs.current, final_window[..pos + batch.len()]);
    }
}
