//! Lazy, partitioned collections.
//!
//! A [`Dataset`] is a plan, not data. Transformations such as
//! [`Dataset::map`] or [`Dataset::reduce_by_key`] only extend the plan; the
//! work happens when an action ([`Dataset::collect`],
//! [`Dataset::collect_partitions`], [`Dataset::count`],
//! [`Dataset::save_as_text_file`]) evaluates it against the dataset's
//! [`Context`]. Every evaluation recomputes the plan from its source unless
//! [`Dataset::cache`] was used.

use std::hash::Hash;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use dashmap::DashMap;
use fnv::FnvHashMap;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::codec::{self, OutputFormat, Record};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::ihash;
use crate::storage::Location;
use crate::utils::split_even;

type Partitions<T> = Vec<Vec<T>>;
type Plan<T> = Arc<dyn Fn(&Context) -> Result<Partitions<T>> + Send + Sync>;

// types related to the shuffle
type BucketIndex = u32;
type Buckets<K, V> = DashMap<BucketIndex, Vec<(K, V)>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// What [`Dataset::save_as_text_file`] wrote.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SaveSummary {
    pub records: usize,
    pub parts: usize,
}

pub struct Dataset<T> {
    ctx: Context,
    lineage: Arc<Vec<&'static str>>,
    plan: Plan<T>,
}

impl<T> Clone for Dataset<T> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            lineage: Arc::clone(&self.lineage),
            plan: Arc::clone(&self.plan),
        }
    }
}

impl<T: Send + 'static> Dataset<T> {
    pub(crate) fn source<F>(ctx: Context, stage: &'static str, f: F) -> Self
    where
        F: Fn(&Context) -> Result<Partitions<T>> + Send + Sync + 'static,
    {
        Self {
            ctx,
            lineage: Arc::new(vec![stage]),
            plan: Arc::new(f),
        }
    }

    fn derive<U>(&self, stage: &'static str, plan: Plan<U>) -> Dataset<U> {
        let mut lineage = self.lineage.as_ref().clone();
        lineage.push(stage);
        Dataset {
            ctx: self.ctx.clone(),
            lineage: Arc::new(lineage),
            plan,
        }
    }

    /// A stage that transforms each partition independently.
    fn narrow<U, G>(&self, stage: &'static str, g: G) -> Dataset<U>
    where
        U: Send + 'static,
        G: Fn(Vec<T>) -> Vec<U> + Send + Sync + 'static,
    {
        let parent = Arc::clone(&self.plan);
        let plan: Plan<U> = Arc::new(move |ctx: &Context| {
            let parts = parent(ctx)?;
            ctx.run_stage(stage, || parts.into_par_iter().map(&g).collect::<Partitions<U>>())
        });
        self.derive(stage, plan)
    }

    /// Names of the stages this dataset is computed by, source first.
    pub fn lineage(&self) -> &[&'static str] {
        &self.lineage
    }

    pub fn map<U, F>(&self, f: F) -> Dataset<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        self.narrow("map", move |part| part.into_iter().map(&f).collect())
    }

    pub fn flat_map<U, I, F>(&self, f: F) -> Dataset<U>
    where
        U: Send + 'static,
        I: IntoIterator<Item = U>,
        F: Fn(T) -> I + Send + Sync + 'static,
    {
        self.narrow("flat_map", move |part| part.into_iter().flat_map(&f).collect())
    }

    pub fn filter<F>(&self, f: F) -> Dataset<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.narrow("filter", move |part| part.into_iter().filter(|x| f(x)).collect())
    }

    /// Order every element by `key`, then cut the result into `partitions`
    /// contiguous ranges (default: the parent's partition count).
    ///
    /// The sort is unstable. Elements with equal keys come out in no
    /// particular order.
    pub fn sort_by<S, F>(&self, key: F, order: SortOrder, partitions: Option<usize>) -> Dataset<T>
    where
        S: Ord,
        F: Fn(&T) -> S + Send + Sync + 'static,
    {
        let parent = Arc::clone(&self.plan);
        let plan: Plan<T> = Arc::new(move |ctx: &Context| {
            let parts = parent(ctx)?;
            let n = partitions.unwrap_or(parts.len()).max(1);
            ctx.run_stage("sort_by", || {
                let mut all: Vec<T> = parts.into_iter().flatten().collect();
                match order {
                    SortOrder::Ascending => all.par_sort_unstable_by(|a, b| key(a).cmp(&key(b))),
                    SortOrder::Descending => all.par_sort_unstable_by(|a, b| key(b).cmp(&key(a))),
                }
                split_even(all, n)
            })
        });
        self.derive("sort_by", plan)
    }

    /// Evaluate the plan and return its partitions in index order.
    pub fn collect_partitions(&self) -> Result<Vec<Vec<T>>> {
        self.ctx.ensure_active()?;
        debug!(lineage = ?self.lineage, "evaluating dataset");
        (self.plan)(&self.ctx)
    }

    pub fn collect(&self) -> Result<Vec<T>> {
        Ok(self.collect_partitions()?.into_iter().flatten().collect())
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self.collect_partitions()?.iter().map(Vec::len).sum())
    }

    /// Evaluate the dataset and write one part file per partition to `uri`.
    ///
    /// Nothing is computed if `uri` already exists.
    pub fn save_as_text_file(&self, uri: &str, format: OutputFormat) -> Result<SaveSummary>
    where
        T: Record + Sync,
    {
        let location: Location = uri.parse()?;
        let rt = self.ctx.io_handle()?;
        let storage = self.ctx.storage();
        storage.ensure_absent(&rt, &location)?;

        let parts = self.collect_partitions()?;
        let records = parts.iter().map(Vec::len).sum();
        let encoded = self
            .ctx
            .run_stage("encode", || {
                parts
                    .par_iter()
                    .map(|part| codec::encode_partition(part, format))
                    .collect::<anyhow::Result<Vec<Bytes>>>()
            })?
            .map_err(|e| Error::TaskFailed {
                stage: "encode",
                message: format!("{:#}", e),
            })?;

        let parts = storage.commit(&rt, &location, encoded)?;
        info!(sink = %location, records, parts, "saved dataset");
        Ok(SaveSummary { records, parts })
    }
}

impl<T: Clone + Send + 'static> Dataset<T> {
    /// Keep the partitions after the first evaluation and serve later
    /// evaluations from memory.
    pub fn cache(&self) -> Dataset<T> {
        let parent = Arc::clone(&self.plan);
        let memo: Arc<Mutex<Option<Partitions<T>>>> = Arc::new(Mutex::new(None));
        let plan: Plan<T> = Arc::new(move |ctx: &Context| {
            let mut slot = memo.lock().map_err(|_| Error::TaskFailed {
                stage: "cache",
                message: "cache lock poisoned".into(),
            })?;
            if let Some(parts) = slot.as_ref() {
                return Ok(parts.clone());
            }
            let parts = parent(ctx)?;
            *slot = Some(parts.clone());
            Ok(parts)
        });
        self.derive("cache", plan)
    }
}

impl<K, V> Dataset<(K, V)>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Merge the values of each key with `f`, leaving exactly one pair per
    /// distinct key.
    ///
    /// Values are combined inside each input partition first, then shuffled
    /// to bucket `ihash(key) % partitions` and merged again. `f` must be
    /// associative and commutative: the merge order is not fixed.
    pub fn reduce_by_key<F>(&self, f: F, partitions: Option<usize>) -> Dataset<(K, V)>
    where
        F: Fn(V, V) -> V + Send + Sync + 'static,
    {
        let parent = Arc::clone(&self.plan);
        let plan: Plan<(K, V)> = Arc::new(move |ctx: &Context| {
            let parts = parent(ctx)?;
            let n = partitions.unwrap_or(parts.len()).max(1);
            ctx.run_stage("reduce_by_key", || {
                let buckets: Buckets<K, V> = Buckets::new();
                parts.into_par_iter().for_each(|part| {
                    for (key, value) in combine(part, &f) {
                        let bucket_no = (ihash(&key) as usize % n) as BucketIndex;
                        buckets.entry(bucket_no).or_default().push((key, value));
                    }
                });

                let reduced: Vec<(BucketIndex, Vec<(K, V)>)> = buckets
                    .into_par_iter()
                    .map(|(bucket_no, pairs)| (bucket_no, combine(pairs, &f).into_iter().collect()))
                    .collect();

                let mut out: Partitions<(K, V)> = (0..n).map(|_| Vec::new()).collect();
                for (bucket_no, pairs) in reduced {
                    out[bucket_no as usize] = pairs;
                }
                out
            })
        });
        self.derive("reduce_by_key", plan)
    }
}

fn combine<K, V, F>(pairs: impl IntoIterator<Item = (K, V)>, f: &F) -> FnvHashMap<K, V>
where
    K: Eq + Hash,
    F: Fn(V, V) -> V,
{
    let mut acc = FnvHashMap::default();
    for (key, value) in pairs {
        let merged = match acc.remove(&key) {
            Some(prev) => f(prev, value),
            None => value,
        };
        acc.insert(key, merged);
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextConfig;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ctx() -> Context {
        Context::acquire(ContextConfig::local(2)).unwrap()
    }

    #[test]
    fn transformations_are_deferred() {
        let ctx = ctx();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let doubled = ctx.parallelize(vec![1, 2, 3], Some(2)).map(move |x| {
            seen.fetch_add(1, Ordering::SeqCst);
            x * 2
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(doubled.lineage(), &["parallelize", "map"]);

        assert_eq!(doubled.collect().unwrap(), vec![2, 4, 6]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // no cache: a second action recomputes
        assert_eq!(doubled.count().unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        ctx.shutdown();
    }

    #[test]
    fn cache_evaluates_once() {
        let ctx = ctx();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let cached = ctx
            .parallelize(vec!["a", "b"], None)
            .map(move |s| {
                seen.fetch_add(1, Ordering::SeqCst);
                s.to_uppercase()
            })
            .cache();
        assert_eq!(cached.collect().unwrap(), vec!["A", "B"]);
        assert_eq!(cached.count().unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        ctx.shutdown();
    }

    #[test]
    fn flat_map_and_filter() {
        let ctx = ctx();
        let words = ctx
            .parallelize(vec!["a b", "c", ""], Some(3))
            .flat_map(|line: &str| line.split(' ').map(str::to_owned).collect::<Vec<_>>())
            .filter(|w| !w.is_empty());
        assert_eq!(words.collect().unwrap(), vec!["a", "b", "c"]);
        ctx.shutdown();
    }

    #[test]
    fn reduce_by_key_leaves_one_pair_per_key() {
        let ctx = ctx();
        let pairs = vec![("x", 1u64), ("y", 2), ("x", 3), ("z", 1), ("y", 1)];
        let reduced = ctx
            .parallelize(pairs, Some(3))
            .reduce_by_key(|a, b| a + b, Some(4));

        let parts = reduced.collect_partitions().unwrap();
        assert_eq!(parts.len(), 4);
        for (index, part) in parts.iter().enumerate() {
            for (key, _) in part {
                assert_eq!(ihash(key) % 4, index as u32);
            }
        }

        let totals: HashMap<_, _> = parts.into_iter().flatten().collect();
        assert_eq!(totals, HashMap::from([("x", 4), ("y", 3), ("z", 1)]));
        ctx.shutdown();
    }

    #[test]
    fn sort_by_orders_across_partitions() {
        let ctx = ctx();
        let sorted = ctx
            .parallelize(vec![3, 9, 1, 7, 5], Some(2))
            .sort_by(|x| *x, SortOrder::Descending, Some(3));
        let parts = sorted.collect_partitions().unwrap();
        assert_eq!(parts, vec![vec![9, 7], vec![5, 3], vec![1]]);

        let ascending = ctx
            .parallelize(vec![3, 1, 2], None)
            .sort_by(|x| *x, SortOrder::Ascending, None);
        assert_eq!(ascending.collect().unwrap(), vec![1, 2, 3]);
        ctx.shutdown();
    }

    #[test]
    fn panicking_closure_fails_the_stage() {
        let ctx = ctx();
        let err = ctx
            .parallelize(vec![1, 2, 3], Some(3))
            .map(|x: i32| if x == 2 { panic!("bad element") } else { x })
            .collect()
            .unwrap_err();
        assert!(matches!(err, Error::TaskFailed { stage: "map", .. }));
        ctx.shutdown();
    }

    #[test]
    fn evaluation_after_shutdown_is_refused() {
        let ctx = ctx();
        let data = ctx.parallelize(vec![1], None);
        ctx.shutdown();
        assert!(matches!(
            data.collect().unwrap_err(),
            Error::ContextUnavailable(_)
        ));
    }
}
