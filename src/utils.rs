//! Small helpers shared by the storage layer and the dataset engine.
//!

use anyhow::Result;
use bytes::Bytes;

/// Read an entire [`Bytes`] slice into a [`String`].
///
/// Returns an error if the slice contains invalid UTF-8.
pub fn string_from_bytes(buf: Bytes) -> Result<String> {
    Ok(String::from_utf8(buf.as_ref().into())?)
}

/// Split `items` into `n` contiguous runs whose lengths differ by at most one.
///
/// Order is preserved: concatenating the runs gives back `items`. Always
/// returns exactly `n.max(1)` runs, some of which may be empty.
pub fn split_even<T>(items: Vec<T>, n: usize) -> Vec<Vec<T>> {
    let n = n.max(1);
    let len = items.len();
    let (base, extra) = (len / n, len % n);
    let mut iter = items.into_iter();
    (0..n)
        .map(|i| {
            let take = base + usize::from(i < extra);
            iter.by_ref().take(take).collect()
        })
        .collect()
}
