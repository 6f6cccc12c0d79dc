//! tests/api/wordcount.rs
use std::collections::HashSet;
use std::fs;

use crate::helpers::{as_str, local_context, output_files, test_data_dir, write_input};
use tempfile::TempDir;
use wclite::codec::OutputFormat;
use wclite::workload::wc::{self, Job, SplitPolicy, WordCount};
use wclite::Error;

fn job(input: &str, output: &str) -> Job {
    Job {
        input: input.to_owned(),
        output: output.to_owned(),
        split: SplitPolicy::SingleSpace,
        format: OutputFormat::Text,
        partitions: None,
    }
}

fn sonnet() -> String {
    as_str(&test_data_dir().join("sonnet.txt")).to_owned()
}

#[test]
fn should_write_ranked_counts_as_parts() {
    let ctx = local_context();
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("sonnet-wordcount");

    let report = wc::run(
        &ctx,
        &Job {
            partitions: Some(3),
            ..job(&sonnet(), as_str(&out))
        },
    )
    .expect("Failed to run word count");

    assert_eq!(report.parts, 3);
    assert_eq!(report.total_words, 59);
    assert_eq!(report.distinct_words, 53);
    assert_eq!(
        output_files(&out),
        vec!["_SUCCESS", "part-00000", "part-00001", "part-00002"]
    );

    let ranked = wc::load(&ctx, as_str(&out), OutputFormat::Text).unwrap();
    assert_eq!(ranked.len(), 53);
    assert_eq!(
        ranked[0],
        WordCount {
            word: "thy".into(),
            count: 3
        }
    );
    assert!(ranked.windows(2).all(|w| w[0].count >= w[1].count));
    // case is kept
    assert!(ranked.iter().any(|wc| wc.word == "Thy"));
    ctx.shutdown();
}

#[test]
fn should_refuse_existing_output_without_touching_it() {
    let ctx = local_context();
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("out");

    wc::run(&ctx, &job(&sonnet(), as_str(&out))).unwrap();
    let before = fs::read_to_string(out.join("part-00000")).unwrap();

    let err = wc::run(&ctx, &job(&sonnet(), as_str(&out))).unwrap_err();
    assert!(matches!(err, Error::SinkExists(_)));
    assert_eq!(err.exit_code(), 3);
    assert_eq!(fs::read_to_string(out.join("part-00000")).unwrap(), before);
    ctx.shutdown();
}

#[test]
fn should_fail_on_missing_input() {
    let ctx = local_context();
    let tmp = TempDir::new().unwrap();
    let err = wc::run(
        &ctx,
        &job(
            as_str(&tmp.path().join("shakespeare.txt")),
            as_str(&tmp.path().join("out")),
        ),
    )
    .unwrap_err();
    assert!(matches!(err, Error::SourceNotFound(_)));
    assert!(!tmp.path().join("out").exists());
    ctx.shutdown();
}

#[test]
fn should_reject_unknown_filesystems() {
    let ctx = local_context();
    let err = wc::run(
        &ctx,
        &job("hdfs:///shakespeare.txt", "hdfs:///shakespeare-wordcount.txt"),
    )
    .unwrap_err();
    assert!(matches!(err, Error::UnsupportedScheme { .. }));
    assert_eq!(err.exit_code(), 64);
    ctx.shutdown();
}

#[test]
fn should_read_directories_and_globs() {
    let ctx = local_context();
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("input");
    fs::create_dir(&input).unwrap();
    write_input(&input, "a.txt", &["the cat sat"]);
    write_input(&input, "b.txt", &["the cat ran"]);
    write_input(&input, "_ignored.txt", &["the the the"]);

    let from_dir = tmp.path().join("from-dir");
    let report = wc::run(&ctx, &job(as_str(&input), as_str(&from_dir))).unwrap();
    assert_eq!(report.total_words, 6);

    let from_glob = tmp.path().join("from-glob");
    let pattern = input.join("*.txt");
    let report = wc::run(&ctx, &job(as_str(&pattern), as_str(&from_glob))).unwrap();
    assert_eq!(report.total_words, 6);

    let ranked = wc::load(&ctx, as_str(&from_glob), OutputFormat::Text).unwrap();
    let groups = wc::tie_groups(&ranked);
    assert_eq!(groups[0].0, 2);
    assert_eq!(groups[0].1, HashSet::from(["the", "cat"]));
    assert_eq!(groups[1].1, HashSet::from(["sat", "ran"]));
    ctx.shutdown();
}

#[test]
fn should_write_json_lines() {
    let ctx = local_context();
    let tmp = TempDir::new().unwrap();
    let input = write_input(tmp.path(), "in.txt", &["a b a", "b a"]);
    let out = tmp.path().join("json");

    wc::run(
        &ctx,
        &Job {
            format: OutputFormat::Json,
            partitions: Some(1),
            ..job(as_str(&input), as_str(&out))
        },
    )
    .unwrap();

    let text = fs::read_to_string(out.join("part-00000")).unwrap();
    assert_eq!(text, "{\"word\":\"a\",\"count\":3}\n{\"word\":\"b\",\"count\":2}\n");
    ctx.shutdown();
}

#[test]
fn should_handle_empty_and_blank_input() {
    let ctx = local_context();
    let tmp = TempDir::new().unwrap();

    let empty = tmp.path().join("empty.txt");
    fs::write(&empty, "").unwrap();
    let out = tmp.path().join("empty-out");
    let report = wc::run(&ctx, &job(as_str(&empty), as_str(&out))).unwrap();
    assert_eq!(report.distinct_words, 0);
    assert!(out.join("_SUCCESS").exists());
    assert!(wc::load(&ctx, as_str(&out), OutputFormat::Text)
        .unwrap()
        .is_empty());

    let blank = write_input(tmp.path(), "blank.txt", &["  "]);
    let out = tmp.path().join("blank-single");
    wc::run(&ctx, &job(as_str(&blank), as_str(&out))).unwrap();
    assert_eq!(
        wc::load(&ctx, as_str(&out), OutputFormat::Text).unwrap(),
        vec![WordCount {
            word: String::new(),
            count: 3
        }]
    );

    let out = tmp.path().join("blank-whitespace");
    let report = wc::run(
        &ctx,
        &Job {
            split: SplitPolicy::Whitespace,
            ..job(as_str(&blank), as_str(&out))
        },
    )
    .unwrap();
    assert_eq!(report.total_words, 0);
    ctx.shutdown();
}
