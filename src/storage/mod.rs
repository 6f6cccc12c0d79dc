//! URI-addressed sources and sinks.
//!
//! A [`Location`] is either a path on the local filesystem or an object in an
//! S3-compatible store. [`Storage`] hides the difference from the dataset
//! engine: it resolves sources into a list of files, checks that sinks are
//! absent and commits part files.
//!
//! Output layout follows the Hadoop convention used by the engines this job
//! was written for: `part-00000`, `part-00001`, ... and an empty `_SUCCESS`
//! marker written after every part is in place.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use bytes::Bytes;
use tokio::runtime::Handle;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::{Error, Result};

pub mod local;
pub mod minio;

pub use minio::{ObjectStoreConfig, S3Store};

pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// Name of the `index`-th part file of an output.
pub fn part_name(index: usize) -> String {
    format!("part-{:05}", index)
}

/// Files whose name starts with `_` or `.` are bookkeeping and never input.
pub(crate) fn is_hidden_name(name: &str) -> bool {
    name.starts_with('_') || name.starts_with('.')
}

pub(crate) fn is_pattern(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// One resolved input file and its full contents.
#[derive(Clone, Debug)]
pub struct SourceFile {
    pub name: String,
    pub data: Bytes,
}

/// Where a source is read from or a sink is written to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Location {
    Local(PathBuf),
    S3 { bucket: String, key: String },
}

impl FromStr for Location {
    type Err = Error;

    fn from_str(uri: &str) -> Result<Self> {
        if uri.is_empty() {
            return Err(Error::InvalidLocation {
                uri: uri.to_owned(),
                reason: "empty path",
            });
        }
        let Some((scheme, rest)) = uri.split_once("://") else {
            return Ok(Location::Local(PathBuf::from(uri)));
        };
        match scheme.to_ascii_lowercase().as_str() {
            "file" => Ok(Location::Local(PathBuf::from(rest))),
            "s3" | "s3a" => {
                let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
                if bucket.is_empty() {
                    return Err(Error::InvalidLocation {
                        uri: uri.to_owned(),
                        reason: "missing bucket name",
                    });
                }
                Ok(Location::S3 {
                    bucket: bucket.to_owned(),
                    key: key.trim_end_matches('/').to_owned(),
                })
            }
            _ => Err(Error::UnsupportedScheme {
                uri: uri.to_owned(),
                scheme: scheme.to_owned(),
            }),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Local(path) => write!(f, "{}", path.display()),
            Location::S3 { bucket, key } => write!(f, "s3://{}/{}", bucket, key),
        }
    }
}

/// Filesystem access for one execution context.
///
/// The object store client is built on first use, so purely local jobs never
/// touch the AWS configuration chain.
pub struct Storage {
    object_store: ObjectStoreConfig,
    s3: OnceCell<S3Store>,
}

impl Storage {
    pub fn new(object_store: ObjectStoreConfig) -> Self {
        Self {
            object_store,
            s3: OnceCell::new(),
        }
    }

    async fn s3(&self) -> &S3Store {
        self.s3
            .get_or_init(|| S3Store::connect(&self.object_store))
            .await
    }

    /// Resolve `location` and read every file it names.
    pub fn read(&self, rt: &Handle, location: &Location) -> Result<Vec<SourceFile>> {
        let uri = location.to_string();
        let files = match location {
            Location::Local(path) => local::read(path)?,
            Location::S3 { bucket, key } => rt.block_on(async {
                let store = self.s3().await;
                let keys = store
                    .resolve(bucket, key)
                    .await
                    .map_err(|e| Error::unreadable(&uri, e))?;
                if keys.is_empty() {
                    return Err(Error::SourceNotFound(uri.clone()));
                }
                let mut files = Vec::with_capacity(keys.len());
                for key in keys {
                    let name = format!("s3://{}/{}", bucket, key);
                    let data = store
                        .get_object(bucket, &key)
                        .await
                        .map_err(|e| Error::unreadable(&name, e))?;
                    files.push(SourceFile { name, data });
                }
                Ok(files)
            })?,
        };
        debug!(source = %uri, files = files.len(), "resolved input");
        Ok(files)
    }

    /// Fails with [`Error::SinkExists`] if anything is already at `location`.
    pub fn ensure_absent(&self, rt: &Handle, location: &Location) -> Result<()> {
        let uri = location.to_string();
        let exists = match location {
            Location::Local(path) => local::exists(path),
            Location::S3 { bucket, key } => rt.block_on(async {
                self.s3()
                    .await
                    .exists(bucket, key)
                    .await
                    .map_err(|e| Error::unwritable(&uri, e))
            })?,
        };
        if exists {
            return Err(Error::SinkExists(uri));
        }
        Ok(())
    }

    /// Write `parts` as `part-NNNNN` files followed by the success marker.
    ///
    /// Returns the number of part files written.
    pub fn commit(&self, rt: &Handle, location: &Location, parts: Vec<Bytes>) -> Result<usize> {
        match location {
            Location::Local(path) => local::commit(path, parts),
            Location::S3 { bucket, key } => {
                self.ensure_absent(rt, location)?;
                let uri = location.to_string();
                rt.block_on(async {
                    self.s3()
                        .await
                        .commit(bucket, key, parts)
                        .await
                        .map_err(|e| Error::unwritable(&uri, e))
                })
            }
        }
    }
}
