//! fvecs / ivecs codec.
//!
//! Each record is a little-endian `i32` element count followed by that many
//! little-endian 4-byte values (`f32` for fvecs, `i32` for ivecs). Every
//! record of a file must have the same count.

use std::io::{self, Read, Write};

use crate::error::{RemapError, Result};
use crate::translate::NeighborMatrix;
use crate::vector::VectorSet;

/// Cap on values reserved for a record before its bytes are read.
const MAX_RESERVE: usize = 1 << 16;

/// Decodes an fvecs stream.
pub fn read_fvecs(r: &mut dyn Read) -> Result<VectorSet> {
    let (dim, data) = read_records(r, "fvecs", f32::from_le_bytes)?;
    VectorSet::from_flat(dim, data)
}

/// Decodes an ivecs stream.
pub fn read_ivecs(r: &mut dyn Read) -> Result<NeighborMatrix> {
    let (k, data) = read_records(r, "ivecs", i32::from_le_bytes)?;
    NeighborMatrix::from_flat(k, data)
}

/// Encodes `set` as fvecs.
pub fn write_fvecs(w: &mut dyn Write, set: &VectorSet) -> Result<()> {
    let header = record_header(set.dim())?;
    for row in set.iter() {
        w.write_all(&header)?;
        for v in row {
            w.write_all(&v.to_le_bytes())?;
        }
    }
    Ok(())
}

/// Encodes `m` as ivecs.
pub fn write_ivecs(w: &mut dyn Write, m: &NeighborMatrix) -> Result<()> {
    let header = record_header(m.k())?;
    for row in m.iter_rows() {
        w.write_all(&header)?;
        for v in row {
            w.write_all(&v.to_le_bytes())?;
        }
    }
    Ok(())
}

fn record_header(len: usize) -> Result<[u8; 4]> {
    let len = i32::try_from(len)
        .map_err(|_| RemapError::InvalidFormat(format!("record length {len} exceeds i32")))?;
    Ok(len.to_le_bytes())
}

/// Reads records until a clean end of stream. Returns the shared record
/// length and the flattened values.
fn read_records<T>(
    r: &mut dyn Read,
    what: &str,
    decode: fn([u8; 4]) -> T,
) -> Result<(usize, Vec<T>)> {
    let mut width: Option<usize> = None;
    let mut data = Vec::new();
    let mut record = 0usize;
    let mut buf4 = [0u8; 4];

    loop {
        if !read_header(r, &mut buf4, what, record)? {
            break;
        }
        let len = i32::from_le_bytes(buf4);
        if len <= 0 {
            return Err(RemapError::InvalidFormat(format!(
                "{what} record {record} has length {len}"
            )));
        }
        let len = len as usize;
        match width {
            None => width = Some(len),
            Some(w) if w != len => {
                return Err(RemapError::InvalidFormat(format!(
                    "{what} record {record} has length {len}, want {w}"
                )));
            }
            Some(_) => {}
        }

        data.reserve(len.min(MAX_RESERVE));
        for _ in 0..len {
            r.read_exact(&mut buf4).map_err(|e| truncated(e, what, record))?;
            data.push(decode(buf4));
        }
        record += 1;
    }

    Ok((width.unwrap_or(0), data))
}

/// Reads a record header. Returns `false` on end of stream before any byte.
fn read_header(r: &mut dyn Read, buf: &mut [u8; 4], what: &str, record: usize) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => {
                return Err(RemapError::InvalidFormat(format!(
                    "{what} record {record}: truncated length prefix"
                )));
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

fn truncated(e: io::Error, what: &str, record: usize) -> RemapError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        RemapError::InvalidFormat(format!("{what} record {record}: truncated"))
    } else {
        e.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fvecs_reader_parses_vectors() {
        let mut bytes = Vec::new();
        for row in [[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]] {
            bytes.extend_from_slice(&3i32.to_le_bytes());
            for v in row {
                bytes.extend_from_slice(&v.to_le_bytes());
            }
        }

        let set = read_fvecs(&mut bytes.as_slice()).unwrap();
        assert_eq!(set.dim(), 3);
        assert_eq!(set.as_flat(), &[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn ivecs_reader_parses_rows() {
        let mut bytes = Vec::new();
        for row in [[7i32, 8], [1, 9]] {
            bytes.extend_from_slice(&2i32.to_le_bytes());
            for v in row {
                bytes.extend_from_slice(&v.to_le_bytes());
            }
        }

        let m = read_ivecs(&mut bytes.as_slice()).unwrap();
        assert_eq!(m.shape(), (2, 2));
        assert_eq!(m.row(1), Some(&[1, 9][..]));
    }

    #[test]
    fn writer_output_matches_layout() {
        let m = NeighborMatrix::from_rows(&[vec![3, -1]]).unwrap();
        let mut buf = Vec::new();
        write_ivecs(&mut buf, &m).unwrap();
        let mut expected = Vec::new();
        expected.extend_from_slice(&2i32.to_le_bytes());
        expected.extend_from_slice(&3i32.to_le_bytes());
        expected.extend_from_slice(&(-1i32).to_le_bytes());
        assert_eq!(buf, expected);
    }

    #[test]
    fn empty_stream_is_empty_set() {
        let set = read_fvecs(&mut &[0u8; 0][..]).unwrap();
        assert!(set.is_empty());
        let m = read_ivecs(&mut &[0u8; 0][..]).unwrap();
        assert_eq!(m.shape(), (0, 0));
    }

    #[test]
    fn ragged_records_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.extend_from_slice(&5i32.to_le_bytes());
        bytes.extend_from_slice(&2i32.to_le_bytes());
        bytes.extend_from_slice(&5i32.to_le_bytes());
        bytes.extend_from_slice(&6i32.to_le_bytes());
        let err = read_ivecs(&mut bytes.as_slice()).unwrap_err();
        assert!(matches!(err, RemapError::InvalidFormat(_)));
    }

    #[test]
    fn truncated_records_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&4i32.to_le_bytes());
        bytes.extend_from_slice(&1.0f32.to_le_bytes());
        assert!(matches!(
            read_fvecs(&mut bytes.as_slice()),
            Err(RemapError::InvalidFormat(_))
        ));

        // Two bytes of a length prefix.
        assert!(matches!(
            read_fvecs(&mut &[1u8, 0][..]),
            Err(RemapError::InvalidFormat(_))
        ));
    }

    #[test]
    fn oversized_length_prefix_is_truncation() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&i32::MAX.to_le_bytes());
        bytes.extend_from_slice(&1.0f32.to_le_bytes());
        assert!(matches!(
            read_fvecs(&mut bytes.as_slice()),
            Err(RemapError::InvalidFormat(_))
        ));
    }

    #[test]
    fn non_positive_length_rejected() {
        let bytes = (-3i32).to_le_bytes();
        assert!(read_ivecs(&mut &bytes[..]).is_err());
        let bytes = 0i32.to_le_bytes();
        assert!(read_ivecs(&mut &bytes[..]).is_err());
    }
}
