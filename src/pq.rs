//! Product-quantization codec and distance-table engine.
//!
//! A `D`-dimensional vector is split into `M` equal sub-vectors, each
//! encoded as an index into a locally trained codebook of `K` centroids.
//! Database vectors are stored as constant-size `M`-byte codes instead of
//! `4*D`-byte floats, and distances are estimated through precomputed
//! lookup tables:
//!
//! - the **construction table** (symmetric, code-to-code): per subspace a
//!   `K×K` matrix of centroid-to-centroid squared distances, built once
//!   offline and loaded here;
//! - the **query table** (asymmetric, query-to-code): per active query an
//!   `M*K` array of query-sub-vector-to-centroid squared distances,
//!   recomputed for every query.
//!
//! With the tables in place, a code-to-code distance is `M` lookups and a
//! query-to-code distance is `M` lookups, `O(M)` instead of `O(D)`
//! arithmetic, which is the entire performance rationale of the codec.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::{MetricError, Result};
use crate::simd;
use crate::space::Space;
use crate::vecs;

/// Immutable per-index product-quantization configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PqConfig {
    /// Full vector dimensionality `D`.
    pub dim: usize,
    /// Subspace count `M`. Must divide `dim` evenly.
    pub m: usize,
    /// Centroids per subspace `K`, at most 256 (codes are one byte per
    /// subspace).
    pub k: usize,
}

impl PqConfig {
    /// Create a configuration. Call [`PqConfig::validate`] (or construct a
    /// space, which validates) before relying on derived quantities.
    pub fn new(dim: usize, m: usize, k: usize) -> Self {
        Self { dim, m, k }
    }

    /// Check the configuration invariants.
    ///
    /// Violation is a fatal configuration error: construction must fail,
    /// never fall through to sentinel dimensions.
    pub fn validate(&self) -> Result<()> {
        if self.dim == 0 || self.m == 0 || self.k == 0 {
            return Err(MetricError::Configuration(
                "dim, m and k must all be greater than 0".to_string(),
            ));
        }
        if self.dim % self.m != 0 {
            return Err(MetricError::Configuration(format!(
                "dimension {} is not divisible by subspace count {}",
                self.dim, self.m
            )));
        }
        if self.k > 256 {
            return Err(MetricError::Configuration(format!(
                "{} centroids per subspace cannot be addressed by one-byte codes",
                self.k
            )));
        }
        Ok(())
    }

    /// Subspace dimensionality `Dv = D / M`.
    #[must_use]
    pub fn sub_dim(&self) -> usize {
        self.dim / self.m
    }
}

/// Per-query lookup state for [`PqL2Space`]: `M*K` integer entries,
/// `entries[m*K + k]` = squared distance from the query's `m`-th
/// sub-vector to centroid `k` of subspace `m`.
#[derive(Debug, Clone)]
pub struct PqQueryTable {
    entries: Vec<i32>,
    num_centroids: usize,
    prepared: bool,
}

impl PqQueryTable {
    /// Look up the entry for `(subspace, centroid)`. Test/debug accessor.
    #[must_use]
    pub fn get(&self, m: usize, k: usize) -> i32 {
        self.entries[m * self.num_centroids + k]
    }
}

/// Product-quantized squared-L2 space driven by externally trained
/// codebook and construction-table artifacts.
///
/// `data_dim()` is the subspace count `M` (codes are `M` bytes); queries
/// are raw `D`-length byte vectors. Distances are integers: the
/// construction table is rounded to integers on load and the query table
/// is rounded the same way.
///
/// State machine: [`PqL2Space::new`] validates the configuration;
/// [`PqL2Space::load_codebook`] enables query tables and encoding;
/// [`PqL2Space::load_construction_table`] (or
/// [`PqL2Space::build_construction_table`]) enables code-to-code
/// distances. Operations invoked too early fail with
/// [`MetricError::InvalidState`], never with a stale read.
#[derive(Debug, Clone)]
pub struct PqL2Space {
    config: PqConfig,
    sub_dim: usize,
    /// Flat codebook buffer: centroid `k` of subspace `m` occupies
    /// `m*K*Dv + k*Dv .. + Dv`. Empty until loaded.
    codebooks: Vec<f32>,
    /// Flat symmetric table: `construction[m*K*K + K*a + b]` = rounded
    /// squared distance between centroids `a` and `b` of subspace `m`.
    /// Empty until loaded.
    construction: Vec<i32>,
}

impl PqL2Space {
    /// Create an unloaded space from a validated configuration.
    pub fn new(config: PqConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            sub_dim: config.sub_dim(),
            codebooks: Vec::new(),
            construction: Vec::new(),
        })
    }

    /// The configuration this space was built with.
    #[must_use]
    pub fn config(&self) -> &PqConfig {
        &self.config
    }

    /// Centroid `k` of subspace `m` as a `Dv`-length slice.
    #[must_use]
    pub fn centroid(&self, m: usize, k: usize) -> &[f32] {
        let start = (m * self.config.k + k) * self.sub_dim;
        &self.codebooks[start..start + self.sub_dim]
    }

    fn require_codebook(&self) -> Result<()> {
        if self.codebooks.is_empty() {
            return Err(MetricError::InvalidState(
                "codebook has not been loaded".to_string(),
            ));
        }
        Ok(())
    }

    fn require_construction(&self) -> Result<()> {
        if self.construction.is_empty() {
            return Err(MetricError::InvalidState(
                "construction table has not been loaded".to_string(),
            ));
        }
        Ok(())
    }

    /// Load the codebook from its training artifact.
    ///
    /// Format: `M*K` records, each a 4-byte little-endian declared
    /// sub-vector dimension followed by `Dv` little-endian `f32`
    /// components, ordered `m`-major then `k`. Fails with
    /// [`MetricError::DimensionMismatch`] if any record declares a
    /// dimension other than the configured `Dv`, and with
    /// [`MetricError::Io`] on a truncated or unreadable source.
    pub fn load_codebook<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        let mut codebooks = Vec::with_capacity(self.config.m * self.config.k * self.sub_dim);
        for _ in 0..self.config.m {
            for _ in 0..self.config.k {
                let centroid = vecs::read_f32_record(reader, self.sub_dim)?;
                codebooks.extend_from_slice(&centroid);
            }
        }
        self.codebooks = codebooks;
        Ok(())
    }

    /// Write the loaded codebook back out in the on-disk record format.
    ///
    /// Reloading the output reproduces a bit-identical in-memory codebook.
    pub fn write_codebook<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.require_codebook()?;
        for m in 0..self.config.m {
            for k in 0..self.config.k {
                vecs::write_f32_record(writer, self.centroid(m, k))?;
            }
        }
        Ok(())
    }

    /// Load the symmetric construction table.
    ///
    /// Format: `M` row-major `K*K` matrices of little-endian `f32`
    /// values; each entry is rounded to the nearest integer on load.
    /// Fails with [`MetricError::Io`] on truncation. The table is not
    /// cross-validated against the codebook; a table trained for a
    /// different codebook loads silently.
    pub fn load_construction_table<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        let per_subspace = self.config.k * self.config.k;
        let mut construction = Vec::with_capacity(self.config.m * per_subspace);
        for _ in 0..self.config.m {
            let matrix = vecs::read_f32s(reader, per_subspace)?;
            construction.extend(matrix.iter().map(|&v| v.round() as i32));
        }
        self.construction = construction;
        Ok(())
    }

    /// Write the loaded construction table in the on-disk format.
    ///
    /// Entries are written as `f32`; reloading reproduces the identical
    /// integer table (rounding an integral float is the identity).
    pub fn write_construction_table<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.require_construction()?;
        for &entry in &self.construction {
            writer.write_all(&(entry as f32).to_le_bytes())?;
        }
        Ok(())
    }

    /// Build the construction table directly from the loaded codebook.
    ///
    /// Offline pipelines normally ship the table as its own artifact;
    /// this computes the same `M` centroid-pair matrices locally, which
    /// is convenient for tests and for deployments that only distribute
    /// codebooks. Cost is `O(M * K^2 * Dv)`.
    pub fn build_construction_table(&mut self) -> Result<()> {
        self.require_codebook()?;
        let k = self.config.k;
        let mut construction = Vec::with_capacity(self.config.m * k * k);
        for m in 0..self.config.m {
            for a in 0..k {
                for b in 0..k {
                    let dist = simd::l2_sqr(self.centroid(m, a), self.centroid(m, b));
                    construction.push(dist.round() as i32);
                }
            }
        }
        self.construction = construction;
        Ok(())
    }

    /// Assign each sub-vector of `vector` to its nearest centroid,
    /// writing one code byte per subspace into `out`.
    ///
    /// Encoding normally happens once at ingestion time, in the offline
    /// pipeline; this is the reference assignment for that step.
    pub fn encode(&self, vector: &[f32], out: &mut [u8]) -> Result<()> {
        self.require_codebook()?;
        if vector.len() != self.config.dim {
            return Err(MetricError::DimensionMismatch {
                expected: self.config.dim,
                actual: vector.len(),
            });
        }
        if out.len() != self.config.m {
            return Err(MetricError::DimensionMismatch {
                expected: self.config.m,
                actual: out.len(),
            });
        }

        for m in 0..self.config.m {
            let sub = &vector[m * self.sub_dim..(m + 1) * self.sub_dim];
            let mut best = 0usize;
            let mut best_dist = f32::INFINITY;
            for k in 0..self.config.k {
                let dist = simd::l2_sqr(sub, self.centroid(m, k));
                if dist < best_dist {
                    best_dist = dist;
                    best = k;
                }
            }
            out[m] = best as u8;
        }
        Ok(())
    }

    fn check_code(&self, len: usize) -> Result<()> {
        if len != self.config.m {
            return Err(MetricError::DimensionMismatch {
                expected: self.config.m,
                actual: len,
            });
        }
        Ok(())
    }
}

impl Space for PqL2Space {
    type Distance = i32;
    type Code = [u8];
    type Query = [u8];
    type QueryTable = PqQueryTable;

    fn encoded_size(&self) -> usize {
        self.config.m
    }

    /// The subspace count `M`, matching the code length.
    fn data_dim(&self) -> usize {
        self.config.m
    }

    fn alloc_query_table(&self) -> PqQueryTable {
        PqQueryTable {
            entries: vec![0; self.config.m * self.config.k],
            num_centroids: self.config.k,
            prepared: false,
        }
    }

    /// Symmetric code-to-code distance through the construction table.
    ///
    /// This sums per-subspace centroid-to-centroid distances: it is exact
    /// only when both original vectors coincide with their assigned
    /// centroids, and otherwise a ranking approximation whose error is
    /// governed by codebook quality. It carries no upper- or lower-bound
    /// guarantee.
    fn distance(&self, a: &[u8], b: &[u8]) -> Result<i32> {
        self.require_construction()?;
        self.check_code(a.len())?;
        self.check_code(b.len())?;

        let k = self.config.k;
        let per_subspace = k * k;
        let mut res = 0i32;
        for (m, (&ca, &cb)) in a.iter().zip(b.iter()).enumerate() {
            res += self.construction[m * per_subspace + k * ca as usize + cb as usize];
        }
        Ok(res)
    }

    /// Compute the `M*K` query table for a raw byte query.
    ///
    /// Each entry is the exact squared distance from the widened query
    /// sub-vector to a centroid, rounded to the nearest integer (matching
    /// the construction table's rounding).
    fn prepare_query_table(&self, query: &[u8], table: &mut PqQueryTable) -> Result<()> {
        self.require_codebook()?;
        if query.len() != self.config.dim {
            return Err(MetricError::DimensionMismatch {
                expected: self.config.dim,
                actual: query.len(),
            });
        }

        table.entries.clear();
        let mut sub = vec![0.0f32; self.sub_dim];
        for m in 0..self.config.m {
            for (dst, &src) in sub
                .iter_mut()
                .zip(&query[m * self.sub_dim..(m + 1) * self.sub_dim])
            {
                *dst = src as f32;
            }
            for k in 0..self.config.k {
                let dist = simd::l2_sqr(&sub, self.centroid(m, k));
                table.entries.push(dist.round() as i32);
            }
        }
        table.prepared = true;
        Ok(())
    }

    fn distance_to_query(&self, table: &PqQueryTable, code: &[u8]) -> Result<i32> {
        if !table.prepared {
            return Err(MetricError::QueryTableMissing);
        }
        self.check_code(code.len())?;

        let k = self.config.k;
        let mut res = 0i32;
        for (m, &c) in code.iter().enumerate() {
            res += table.entries[m * k + c as usize];
        }
        Ok(res)
    }
}
