//! Order-preserving parallel map over independent items.

use std::thread;

use crate::errors::{FieldVaultError, Result};

/// Apply `f` to every item, returning results in input order.
///
/// Inputs shorter than `threshold` run on the calling thread.  Larger
/// inputs are split into one contiguous chunk per available core and run
/// on scoped threads; a panicking worker turns its whole chunk into
/// errors instead of tearing down the caller.
pub fn parallel_map<T, R, F>(items: &[T], threshold: usize, f: F) -> Vec<Result<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> Result<R> + Sync,
{
    if items.len() < threshold.max(2) {
        return items.iter().map(&f).collect();
    }

    let workers = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(items.len());
    if workers <= 1 {
        return items.iter().map(&f).collect();
    }
    let chunk_size = (items.len() + workers - 1) / workers;

    let f = &f;
    thread::scope(|s| {
        let handles: Vec<_> = items
            .chunks(chunk_size)
            .map(|chunk| (chunk.len(), s.spawn(move || chunk.iter().map(f).collect::<Vec<_>>())))
            .collect();

        handles
            .into_iter()
            .flat_map(|(len, handle)| {
                handle.join().unwrap_or_else(|_| {
                    (0..len)
                        .map(|_| {
                            Err(FieldVaultError::EncryptionFailed(
                                "worker thread panicked".into(),
                            ))
                        })
                        .collect()
                })
            })
            .collect()
    })
}
