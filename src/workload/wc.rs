//! Word count over a text source, ordered by frequency.
//!
//! The pipeline is five stages: split lines into words, tag every word with
//! `1`, sum the tags per distinct word, order by count descending and persist.
//! Words are taken exactly as the split produces them: no case folding and
//! no punctuation stripping, so `Word` and `word.` are different keys.
//!
//! Words with equal counts have no defined order relative to each other.
//! [`tie_groups`] presents a ranking as groups of equally frequent words.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context as _};
use bytes::{BufMut, BytesMut};
use clap::ValueEnum;
use itertools::{Either, Itertools};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::codec::{self, OutputFormat, Record};
use crate::context::Context;
use crate::dataset::{Dataset, SortOrder};
use crate::error::{Error, Result};

/// How a line is cut into words.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, ValueEnum)]
pub enum SplitPolicy {
    /// Split on every U+0020 space and keep the empty words produced by
    /// leading, trailing or repeated spaces. An empty line is one empty word.
    #[default]
    SingleSpace,
    /// Split on runs of Unicode whitespace. Never produces empty words.
    Whitespace,
}

impl SplitPolicy {
    pub fn split(self, line: &str) -> impl Iterator<Item = &str> + '_ {
        match self {
            SplitPolicy::SingleSpace => Either::Left(line.split(' ')),
            SplitPolicy::Whitespace => Either::Right(line.split_whitespace()),
        }
    }
}

/// One output record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WordCount {
    pub word: String,
    pub count: u64,
}

impl Record for WordCount {
    fn encode(&self, format: OutputFormat, buf: &mut BytesMut) -> anyhow::Result<()> {
        match format {
            OutputFormat::Text => {
                buf.put(self.word.as_bytes());
                buf.put_u8(b' ');
                buf.put(self.count.to_string().as_bytes());
                buf.put_u8(b'\n');
                Ok(())
            }
            OutputFormat::Json => codec::put_json_line(self, buf),
        }
    }

    fn decode(line: &str, format: OutputFormat) -> anyhow::Result<Self> {
        match format {
            OutputFormat::Text => {
                // words never contain a space, so the last one separates the count
                let (word, count) = line
                    .rsplit_once(' ')
                    .ok_or_else(|| anyhow!("malformed record `{}`", line))?;
                let count = count
                    .parse()
                    .with_context(|| format!("bad count in record `{}`", line))?;
                Ok(WordCount {
                    word: word.to_owned(),
                    count,
                })
            }
            OutputFormat::Json => serde_json::from_str(line)
                .with_context(|| format!("malformed record `{}`", line)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    pub input: String,
    pub output: String,
    pub split: SplitPolicy,
    pub format: OutputFormat,
    /// Partitions for reading, shuffling and the output.
    pub partitions: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct JobReport {
    pub output: String,
    pub distinct_words: usize,
    pub total_words: u64,
    pub parts: usize,
    pub elapsed: Duration,
}

pub fn split(lines: &Dataset<String>, policy: SplitPolicy) -> Dataset<String> {
    lines.flat_map(move |line| policy.split(&line).map(str::to_owned).collect::<Vec<_>>())
}

pub fn tag(words: &Dataset<String>) -> Dataset<(String, u64)> {
    words.map(|word| (word, 1))
}

pub fn aggregate(pairs: &Dataset<(String, u64)>, partitions: Option<usize>) -> Dataset<(String, u64)> {
    pairs.reduce_by_key(|a, b| a + b, partitions)
}

pub fn order(counts: &Dataset<(String, u64)>, partitions: Option<usize>) -> Dataset<WordCount> {
    counts
        .sort_by(|(_, count)| *count, SortOrder::Descending, partitions)
        .map(|(word, count)| WordCount { word, count })
}

/// The whole pipeline from lines to ordered counts, still unevaluated.
pub fn word_counts(
    lines: &Dataset<String>,
    policy: SplitPolicy,
    partitions: Option<usize>,
) -> Dataset<WordCount> {
    order(&aggregate(&tag(&split(lines, policy)), partitions), partitions)
}

/// Count the words of `lines` in memory.
pub fn count_words(ctx: &Context, lines: Vec<String>, policy: SplitPolicy) -> Result<Vec<WordCount>> {
    word_counts(&ctx.parallelize(lines, None), policy, None).collect()
}

/// Run `job` to completion on `ctx`.
pub fn run(ctx: &Context, job: &Job) -> Result<JobReport> {
    let started = Instant::now();
    info!(
        input = %job.input,
        output = %job.output,
        split = ?job.split,
        format = ?job.format,
        "submitting word count"
    );

    let lines = ctx.text_file(&job.input, job.partitions)?;
    let ranked = word_counts(&lines, job.split, job.partitions).cache();
    info!(lineage = ?ranked.lineage(), "pipeline planned");

    let saved = ranked.save_as_text_file(&job.output, job.format)?;
    let total_words = ranked.collect()?.iter().map(|wc| wc.count).sum();

    let report = JobReport {
        output: job.output.clone(),
        distinct_words: saved.records,
        total_words,
        parts: saved.parts,
        elapsed: started.elapsed(),
    };
    info!(
        distinct = report.distinct_words,
        total = report.total_words,
        parts = report.parts,
        elapsed = ?report.elapsed,
        "word count finished"
    );
    Ok(report)
}

/// Read a saved output back in its global order.
pub fn load(ctx: &Context, uri: &str, format: OutputFormat) -> Result<Vec<WordCount>> {
    ctx.text_file(uri, Some(1))?
        .collect()?
        .iter()
        .map(|line| WordCount::decode(line, format).map_err(|e| Error::unreadable(uri, e)))
        .collect()
}

/// Group a ranking into runs of equal count. Words inside a group are
/// unordered.
pub fn tie_groups(ranked: &[WordCount]) -> Vec<(u64, HashSet<&str>)> {
    ranked
        .iter()
        .chunk_by(|wc| wc.count)
        .into_iter()
        .map(|(count, group)| (count, group.map(|wc| wc.word.as_str()).collect()))
        .collect()
}
