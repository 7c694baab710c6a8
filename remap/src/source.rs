//! Reader for flat float32 vector files.
//!
//! The file is a fixed-length header followed by back-to-back records of
//! `dim` little-endian float32 values, with no delimiters or per-record
//! length. Record position is the index-assigned identifier.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use tracing::debug;

use crate::error::{RemapError, Result};
use crate::vector::VectorSet;

/// Header length of vector files written by the index, in bytes.
pub const DEFAULT_HEADER_OFFSET: u64 = 92;

/// Controls how a vector file is decoded.
#[derive(Debug, Clone, Copy)]
pub struct SourceOptions {
    /// Floats per record. Must be positive.
    pub dim: usize,
    /// Bytes to skip before the first record.
    pub offset: u64,
    /// Stop after this many records.
    pub limit: Option<usize>,
}

impl SourceOptions {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            offset: DEFAULT_HEADER_OFFSET,
            limit: None,
        }
    }
}

/// Opens `path` and decodes its records.
pub fn load(path: &Path, opts: SourceOptions) -> Result<VectorSet> {
    let file = File::open(path)?;
    let mut br = BufReader::new(file);
    read_vectors(&mut br, opts)
}

/// Decodes records from `r` in arrival order.
///
/// Fails with `UnexpectedEof` if the stream is shorter than the header.
/// A trailing partial record is dropped.
pub fn read_vectors(r: &mut dyn Read, opts: SourceOptions) -> Result<VectorSet> {
    if opts.dim == 0 {
        return Err(RemapError::InvalidDimension(0));
    }

    let skipped = io::copy(&mut (&mut *r).take(opts.offset), &mut io::sink())?;
    if skipped < opts.offset {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "vector file header needs {} bytes, stream ended after {skipped}",
                opts.offset
            ),
        )
        .into());
    }

    let record_len = opts.dim * 4;
    let mut buf = vec![0u8; record_len];
    let mut data = Vec::new();
    let mut count = 0usize;

    loop {
        if opts.limit.is_some_and(|limit| count >= limit) {
            break;
        }
        let n = read_full(r, &mut buf)?;
        if n < record_len {
            if n > 0 {
                debug!(bytes = n, record_len, "discarding trailing partial record");
            }
            break;
        }
        data.extend(
            buf.chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        );
        count += 1;
    }

    VectorSet::from_flat(opts.dim, data)
}

/// Fills `buf` as far as the stream allows. Returns the byte count, which
/// is short only at end of stream.
fn read_full(r: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
