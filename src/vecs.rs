//! Readers and writers for `*vecs`-style records.
//!
//! The external training artifacts this crate consumes (codebooks,
//! construction tables, learn-set samples) all use the same little-endian
//! layout: an optional 4-byte record header declaring the component count,
//! followed by the components themselves (`f32` for fvecs-style records,
//! `u8` for bvecs-style records).
//!
//! Truncation surfaces as [`MetricError::Io`]; a header disagreeing with
//! the expected dimension as [`MetricError::DimensionMismatch`].

use std::io::{self, Read, Write};

use crate::error::{MetricError, Result};

/// Read one little-endian `u32`.
pub fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Write one little-endian `u32`.
pub fn write_u32<W: Write>(writer: &mut W, value: u32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Read a `u32` header, distinguishing a clean end-of-stream from a
/// truncated record.
///
/// Returns `Ok(None)` when the stream ends exactly at a record boundary,
/// an `UnexpectedEof` error when it ends mid-header.
pub fn try_read_u32<R: Read>(reader: &mut R) -> io::Result<Option<u32>> {
    let mut buf = [0u8; 4];
    let mut filled = 0;
    while filled < 4 {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream ended inside a record header",
            ));
        }
        filled += n;
    }
    Ok(Some(u32::from_le_bytes(buf)))
}

/// Read `count` little-endian `f32` values.
pub fn read_f32s<R: Read>(reader: &mut R, count: usize) -> io::Result<Vec<f32>> {
    let mut raw = vec![0u8; count * 4];
    reader.read_exact(&mut raw)?;
    Ok(raw
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Write little-endian `f32` values.
pub fn write_f32s<W: Write>(writer: &mut W, values: &[f32]) -> io::Result<()> {
    for &v in values {
        writer.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

/// Read one fvecs-style record: a 4-byte declared dimension followed by
/// that many `f32` components.
///
/// The declared dimension must equal `expected_dim`.
pub fn read_f32_record<R: Read>(reader: &mut R, expected_dim: usize) -> Result<Vec<f32>> {
    let declared = read_u32(reader)? as usize;
    if declared != expected_dim {
        return Err(MetricError::DimensionMismatch {
            expected: expected_dim,
            actual: declared,
        });
    }
    Ok(read_f32s(reader, expected_dim)?)
}

/// Write one fvecs-style record (dimension header + components).
pub fn write_f32_record<W: Write>(writer: &mut W, values: &[f32]) -> io::Result<()> {
    write_u32(writer, values.len() as u32)?;
    write_f32s(writer, values)
}

/// Read up to `max_records` bvecs-style records of dimension `dim`,
/// returning the component bytes concatenated.
///
/// A stream shorter than `max_records` records yields however many full
/// records it contains; truncation inside a record is an error.
pub fn read_u8_records<R: Read>(
    reader: &mut R,
    dim: usize,
    max_records: usize,
) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(dim * max_records.min(1024));
    for _ in 0..max_records {
        let declared = match try_read_u32(reader)? {
            Some(d) => d as usize,
            None => break,
        };
        if declared != dim {
            return Err(MetricError::DimensionMismatch {
                expected: dim,
                actual: declared,
            });
        }
        let start = data.len();
        data.resize(start + dim, 0);
        reader.read_exact(&mut data[start..])?;
    }
    Ok(data)
}

/// Write one bvecs-style record (dimension header + component bytes).
pub fn write_u8_record<W: Write>(writer: &mut W, values: &[u8]) -> io::Result<()> {
    write_u32(writer, values.len() as u32)?;
    writer.write_all(values)
}
