use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use glob::glob;
use tracing::debug;
use uuid::Uuid;

use super::{is_hidden_name, is_pattern, part_name, SourceFile, SUCCESS_MARKER};
use crate::error::{Error, Result};

const STAGING_DIR: &str = "_temporary";

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map_or(false, is_hidden_name)
}

/// Visible regular files directly under `dir`, in name order.
fn files_in_dir(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && !is_hidden(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Expand `path` into the files it names: itself, the files of a directory,
/// or the matches of a glob pattern.
pub fn resolve(path: &Path) -> Result<Vec<PathBuf>> {
    let uri = path.display().to_string();
    let Some(spec) = path.to_str() else {
        return Err(Error::InvalidLocation {
            uri,
            reason: "path is not valid UTF-8",
        });
    };

    if is_pattern(spec) {
        let mut files = Vec::new();
        for matched in glob(spec).map_err(|e| Error::unreadable(&uri, e))? {
            let matched = matched.map_err(|e| Error::unreadable(&uri, e))?;
            if is_hidden(&matched) {
                continue;
            }
            if matched.is_dir() {
                files.extend(files_in_dir(&matched).map_err(|e| Error::unreadable(&uri, e))?);
            } else {
                files.push(matched);
            }
        }
        if files.is_empty() {
            return Err(Error::SourceNotFound(uri));
        }
        return Ok(files);
    }

    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => files_in_dir(path).map_err(|e| Error::unreadable(&uri, e)),
        Ok(_) => Ok(vec![path.to_path_buf()]),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::SourceNotFound(uri)),
        Err(e) => Err(Error::unreadable(&uri, e)),
    }
}

pub fn read(path: &Path) -> Result<Vec<SourceFile>> {
    resolve(path)?
        .into_iter()
        .map(|file| {
            let name = file.display().to_string();
            let data = fs::read(&file).map_err(|e| Error::unreadable(&name, e))?;
            Ok(SourceFile {
                name,
                data: Bytes::from(data),
            })
        })
        .collect()
}

pub fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Write `parts` under `path`, which must not exist yet.
///
/// Parts are written to a private staging directory first and renamed into
/// place, so a reader never sees a `part-*` file that is still being written.
/// `_SUCCESS` appears last.
pub fn commit(path: &Path, parts: Vec<Bytes>) -> Result<usize> {
    let uri = path.display().to_string();
    let fail = |e: std::io::Error| Error::unwritable(&uri, e);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(fail)?;
    }
    match fs::create_dir(path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Err(Error::SinkExists(uri.clone())),
        Err(e) => return Err(fail(e)),
    }

    let staging = path.join(STAGING_DIR).join(Uuid::new_v4().to_string());
    fs::create_dir_all(&staging).map_err(fail)?;
    for (index, data) in parts.iter().enumerate() {
        fs::write(staging.join(part_name(index)), data).map_err(fail)?;
    }
    for index in 0..parts.len() {
        let name = part_name(index);
        fs::rename(staging.join(&name), path.join(&name)).map_err(fail)?;
    }
    fs::remove_dir_all(path.join(STAGING_DIR)).map_err(fail)?;
    fs::write(path.join(SUCCESS_MARKER), b"").map_err(fail)?;

    debug!(sink = %uri, parts = parts.len(), "committed output");
    Ok(parts.len())
}
