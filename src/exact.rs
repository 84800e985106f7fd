//! Raw (non-quantized) L2 spaces over float and byte vectors.
//!
//! These variants store full-precision vectors and compute exact squared
//! distances with the kernels in [`crate::simd`]. They serve small or
//! high-recall deployments and codebook-training support; the quantized
//! spaces in [`crate::pq`] and [`crate::trained`] are the memory-bandwidth
//! play.

use crate::error::{MetricError, Result};
use crate::simd;
use crate::space::Space;

/// Exact squared-L2 space over dense `f32` vectors.
///
/// `data_dim()` is the raw feature count `D`; codes and queries are both
/// `D`-length float slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloatL2Space {
    dim: usize,
}

impl FloatL2Space {
    /// Create a space of dimensionality `dim`.
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(MetricError::Configuration(
                "dimension must be greater than 0".to_string(),
            ));
        }
        Ok(Self { dim })
    }

    fn check_dim(&self, len: usize) -> Result<()> {
        if len != self.dim {
            return Err(MetricError::DimensionMismatch {
                expected: self.dim,
                actual: len,
            });
        }
        Ok(())
    }
}

/// Per-query state for [`FloatL2Space`]: a copy of the raw query.
#[derive(Debug, Clone)]
pub struct FloatQueryTable {
    query: Vec<f32>,
    prepared: bool,
}

impl Space for FloatL2Space {
    type Distance = f32;
    type Code = [f32];
    type Query = [f32];
    type QueryTable = FloatQueryTable;

    fn encoded_size(&self) -> usize {
        self.dim * std::mem::size_of::<f32>()
    }

    fn data_dim(&self) -> usize {
        self.dim
    }

    fn alloc_query_table(&self) -> FloatQueryTable {
        FloatQueryTable {
            query: vec![0.0; self.dim],
            prepared: false,
        }
    }

    fn distance(&self, a: &[f32], b: &[f32]) -> Result<f32> {
        self.check_dim(a.len())?;
        self.check_dim(b.len())?;
        Ok(simd::l2_sqr(a, b))
    }

    fn prepare_query_table(&self, query: &[f32], table: &mut FloatQueryTable) -> Result<()> {
        self.check_dim(query.len())?;
        table.query.clear();
        table.query.extend_from_slice(query);
        table.prepared = true;
        Ok(())
    }

    fn distance_to_query(&self, table: &FloatQueryTable, code: &[f32]) -> Result<f32> {
        if !table.prepared {
            return Err(MetricError::QueryTableMissing);
        }
        self.check_dim(code.len())?;
        Ok(simd::l2_sqr(&table.query, code))
    }
}

/// Exact squared-L2 space over dense `u8` vectors.
///
/// Used when raw vectors are stored byte-quantized (reduced precision, no
/// centroid quantization). Distances are exact integers. `data_dim()` is
/// the raw feature count `D`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteL2Space {
    dim: usize,
}

impl ByteL2Space {
    /// Create a space of dimensionality `dim`.
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(MetricError::Configuration(
                "dimension must be greater than 0".to_string(),
            ));
        }
        Ok(Self { dim })
    }

    fn check_dim(&self, len: usize) -> Result<()> {
        if len != self.dim {
            return Err(MetricError::DimensionMismatch {
                expected: self.dim,
                actual: len,
            });
        }
        Ok(())
    }
}

/// Per-query state for [`ByteL2Space`]: a copy of the raw query.
#[derive(Debug, Clone)]
pub struct ByteQueryTable {
    query: Vec<u8>,
    prepared: bool,
}

impl Space for ByteL2Space {
    type Distance = u32;
    type Code = [u8];
    type Query = [u8];
    type QueryTable = ByteQueryTable;

    fn encoded_size(&self) -> usize {
        self.dim
    }

    fn data_dim(&self) -> usize {
        self.dim
    }

    fn alloc_query_table(&self) -> ByteQueryTable {
        ByteQueryTable {
            query: vec![0; self.dim],
            prepared: false,
        }
    }

    fn distance(&self, a: &[u8], b: &[u8]) -> Result<u32> {
        self.check_dim(a.len())?;
        self.check_dim(b.len())?;
        Ok(simd::l2_sqr_u8(a, b))
    }

    fn prepare_query_table(&self, query: &[u8], table: &mut ByteQueryTable) -> Result<()> {
        self.check_dim(query.len())?;
        table.query.clear();
        table.query.extend_from_slice(query);
        table.prepared = true;
        Ok(())
    }

    fn distance_to_query(&self, table: &ByteQueryTable, code: &[u8]) -> Result<u32> {
        if !table.prepared {
            return Err(MetricError::QueryTableMissing);
        }
        self.check_dim(code.len())?;
        Ok(simd::l2_sqr_u8(&table.query, code))
    }
}
