//! Line encodings for persisted records.
//!

use anyhow::Result;
use bytes::{BufMut, Bytes, BytesMut};
use clap::ValueEnum;

/// How records are laid out in part files, one record per line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Space separated fields, the last field is the value.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// A value that can be written to and read back from a single output line.
pub trait Record: Sized {
    /// Append the encoded record, including its trailing newline, to `buf`.
    fn encode(&self, format: OutputFormat, buf: &mut BytesMut) -> Result<()>;

    /// Parse one line (without its newline).
    fn decode(line: &str, format: OutputFormat) -> Result<Self>;
}

pub fn encode_partition<R: Record>(records: &[R], format: OutputFormat) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(records.len() * 16);
    for record in records {
        record.encode(format, &mut buf)?;
    }
    Ok(buf.freeze())
}

pub fn decode_lines<R: Record>(text: &str, format: OutputFormat) -> Result<Vec<R>> {
    text.lines().map(|line| R::decode(line, format)).collect()
}

/// Write `value` as a single JSON line.
pub(crate) fn put_json_line<T: serde::Serialize>(value: &T, buf: &mut BytesMut) -> Result<()> {
    serde_json::to_writer((&mut *buf).writer(), value)?;
    buf.put_u8(b'\n');
    Ok(())
}
