//! Externally-trained product-quantization integration.
//!
//! Rather than loading hand-prepared codebook and construction-table
//! artifacts, this variant wraps an external PQ trainer behind the
//! [`PqTrainer`]/[`TrainedPq`] traits. [`TrainedPqSpace::open`] owns the
//! orchestration around that boundary:
//!
//! 1. if a cached trained model exists at the given path, read it;
//! 2. otherwise read a bounded sample of byte training vectors
//!    ([`TRAIN_SAMPLE_SIZE`] records), widen them to `f32`, invoke the
//!    trainer, and persist the model to the cache path for future runs;
//! 3. ask the model to materialize one flattened symmetric distance table
//!    covering all subspace/centroid pairs.
//!
//! Query tables are produced by delegating to the model's distance-table
//! routine instead of recomputing sub-distances locally. Training itself
//! (k-means over subspaces) is the external collaborator's concern; this
//! crate never performs it.

use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{MetricError, Result};
use crate::pq::PqConfig;
use crate::simd;
use crate::space::Space;
use crate::vecs;

/// Upper bound on the number of training vectors read from the sample
/// file. A shorter file yields a smaller sample, not an error.
pub const TRAIN_SAMPLE_SIZE: usize = 65536;

/// A trained product-quantization model, as produced by a [`PqTrainer`].
pub trait TrainedPq {
    /// Subspace count `M` the model was trained for.
    fn num_subspaces(&self) -> usize;

    /// Centroids per subspace `K`.
    fn num_centroids(&self) -> usize;

    /// Materialize the flattened symmetric distance table:
    /// `M*K*K` values, entry for centroids `a`, `b` of subspace `m` at
    /// `K*(m*K + a) + b`.
    fn symmetric_table(&self) -> Result<Vec<f32>>;

    /// Write the `M*K` asymmetric distances for `query` into `out`,
    /// entry `[m*K + k]` being the squared distance from the query's
    /// `m`-th sub-vector to centroid `k`.
    fn query_table(&self, query: &[f32], out: &mut [f32]) -> Result<()>;

    /// Persist the model (used to populate the cache path).
    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()>;
}

/// The external trainer boundary.
///
/// Implementations wrap whatever offline training machinery is in use;
/// [`TrainedPqSpace`] only asks for training-from-scratch on a cache miss
/// and for deserialization on a cache hit.
pub trait PqTrainer {
    type Model: TrainedPq;

    /// Train a model from `samples`, a row-major buffer of
    /// `samples.len() / config.dim` float vectors.
    fn train(&self, config: &PqConfig, samples: &[f32]) -> Result<Self::Model>;

    /// Read a previously persisted model.
    fn read_model<R: Read>(&self, config: &PqConfig, reader: &mut R) -> Result<Self::Model>;
}

/// A [`TrainedPq`] backed by externally supplied codebooks.
///
/// This adapter materializes symmetric and query tables from centroids an
/// external trainer already produced; it performs no training itself. It
/// also serves as the cache serialization format: centroids are written in
/// the same dim-header record layout the codebook artifact uses.
#[derive(Debug, Clone)]
pub struct CodebookPq {
    m: usize,
    k: usize,
    sub_dim: usize,
    /// Flat centroid buffer, centroid `k` of subspace `m` at
    /// `(m*K + k) * Dv`.
    codebooks: Vec<f32>,
}

impl CodebookPq {
    /// Wrap a flat centroid buffer of length `M*K*Dv`.
    pub fn from_codebooks(config: &PqConfig, codebooks: Vec<f32>) -> Result<Self> {
        config.validate()?;
        let expected = config.m * config.k * config.sub_dim();
        if codebooks.len() != expected {
            return Err(MetricError::DimensionMismatch {
                expected,
                actual: codebooks.len(),
            });
        }
        Ok(Self {
            m: config.m,
            k: config.k,
            sub_dim: config.sub_dim(),
            codebooks,
        })
    }

    /// Read a persisted model in the dim-header record format.
    pub fn read_from<R: Read>(config: &PqConfig, reader: &mut R) -> Result<Self> {
        config.validate()?;
        let sub_dim = config.sub_dim();
        let mut codebooks = Vec::with_capacity(config.m * config.k * sub_dim);
        for _ in 0..config.m * config.k {
            let centroid = vecs::read_f32_record(reader, sub_dim)?;
            codebooks.extend_from_slice(&centroid);
        }
        Self::from_codebooks(config, codebooks)
    }

    fn centroid(&self, m: usize, k: usize) -> &[f32] {
        let start = (m * self.k + k) * self.sub_dim;
        &self.codebooks[start..start + self.sub_dim]
    }
}

impl TrainedPq for CodebookPq {
    fn num_subspaces(&self) -> usize {
        self.m
    }

    fn num_centroids(&self) -> usize {
        self.k
    }

    fn symmetric_table(&self) -> Result<Vec<f32>> {
        let mut table = Vec::with_capacity(self.m * self.k * self.k);
        for m in 0..self.m {
            for a in 0..self.k {
                for b in 0..self.k {
                    table.push(simd::l2_sqr(self.centroid(m, a), self.centroid(m, b)));
                }
            }
        }
        Ok(table)
    }

    fn query_table(&self, query: &[f32], out: &mut [f32]) -> Result<()> {
        let dim = self.m * self.sub_dim;
        if query.len() != dim {
            return Err(MetricError::DimensionMismatch {
                expected: dim,
                actual: query.len(),
            });
        }
        if out.len() != self.m * self.k {
            return Err(MetricError::DimensionMismatch {
                expected: self.m * self.k,
                actual: out.len(),
            });
        }
        for m in 0..self.m {
            let sub = &query[m * self.sub_dim..(m + 1) * self.sub_dim];
            for k in 0..self.k {
                out[m * self.k + k] = simd::l2_sqr(sub, self.centroid(m, k));
            }
        }
        Ok(())
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        for m in 0..self.m {
            for k in 0..self.k {
                vecs::write_f32_record(writer, self.centroid(m, k))?;
            }
        }
        Ok(())
    }
}

/// Per-query lookup state for [`TrainedPqSpace`].
#[derive(Debug, Clone)]
pub struct TrainedQueryTable {
    entries: Vec<f32>,
    prepared: bool,
}

/// Product-quantized squared-L2 space over an externally trained model.
///
/// Contract-identical to [`crate::PqL2Space`] except that distances are
/// `f32` (the trained model's tables are float; nothing is rounded) and
/// queries are raw float vectors. `data_dim()` is the subspace count `M`.
#[derive(Debug, Clone)]
pub struct TrainedPqSpace<M: TrainedPq> {
    config: PqConfig,
    model: M,
    /// Flattened symmetric table, entry for centroids `a`, `b` of
    /// subspace `m` at `K*(m*K + a) + b`.
    sdc: Vec<f32>,
}

impl<M: TrainedPq> TrainedPqSpace<M> {
    /// Open the space, training and caching the model if necessary.
    ///
    /// Checks `cache_path` first; on a miss, reads up to
    /// [`TRAIN_SAMPLE_SIZE`] byte vectors from `sample_path` (dim-header
    /// records), widens them to `f32`, trains through `trainer`, and
    /// persists the result to `cache_path` so subsequent runs skip
    /// training. Both paths are touched once, off the query hot path.
    pub fn open<P>(
        config: PqConfig,
        cache_path: &Path,
        sample_path: &Path,
        trainer: &P,
    ) -> Result<Self>
    where
        P: PqTrainer<Model = M>,
    {
        config.validate()?;

        let model = if cache_path.exists() {
            let mut reader = BufReader::new(std::fs::File::open(cache_path)?);
            trainer.read_model(&config, &mut reader)?
        } else {
            let mut reader = BufReader::new(std::fs::File::open(sample_path)?);
            let bytes = vecs::read_u8_records(&mut reader, config.dim, TRAIN_SAMPLE_SIZE)?;
            let samples: Vec<f32> = bytes.iter().map(|&v| v as f32).collect();
            let model = trainer.train(&config, &samples)?;

            let mut writer = BufWriter::new(std::fs::File::create(cache_path)?);
            model.write_to(&mut writer)?;
            writer.flush()?;
            model
        };

        Self::from_model(config, model)
    }

    /// Wrap an already-available trained model, materializing its
    /// symmetric table once.
    pub fn from_model(config: PqConfig, model: M) -> Result<Self> {
        config.validate()?;
        if model.num_subspaces() != config.m {
            return Err(MetricError::DimensionMismatch {
                expected: config.m,
                actual: model.num_subspaces(),
            });
        }
        if model.num_centroids() != config.k {
            return Err(MetricError::DimensionMismatch {
                expected: config.k,
                actual: model.num_centroids(),
            });
        }

        let sdc = model.symmetric_table()?;
        let expected = config.m * config.k * config.k;
        if sdc.len() != expected {
            return Err(MetricError::InvalidState(format!(
                "trained model produced a symmetric table of {} entries, expected {}",
                sdc.len(),
                expected
            )));
        }

        Ok(Self { config, model, sdc })
    }

    /// The configuration this space was opened with.
    #[must_use]
    pub fn config(&self) -> &PqConfig {
        &self.config
    }

    /// The underlying trained model.
    #[must_use]
    pub fn model(&self) -> &M {
        &self.model
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

impl<M: TrainedPq> Space for TrainedPqSpace<M> {
    type Distance = f32;
    type Code = [u8];
    type Query = [f32];
    type QueryTable = TrainedQueryTable;

    fn encoded_size(&self) -> usize {
        self.config.m
    }

    /// The subspace count `M`, matching the code length.
    fn data_dim(&self) -> usize {
        self.config.m
    }

    fn alloc_query_table(&self) -> TrainedQueryTable {
        TrainedQueryTable {
            entries: vec![0.0; self.config.m * self.config.k],
            prepared: false,
        }
    }

    /// Symmetric code-to-code distance through the model's flattened
    /// table. A centroid-to-centroid approximation, as with
    /// [`crate::PqL2Space::distance`].
    fn distance(&self, a: &[u8], b: &[u8]) -> Result<f32> {
        self.check_code(a.len())?;
        self.check_code(b.len())?;

        let k = self.config.k;
        let mut res = 0.0f32;
        for (m, (&ca, &cb)) in a.iter().zip(b.iter()).enumerate() {
            res += self.sdc[k * (m * k + ca as usize) + cb as usize];
        }
        Ok(res)
    }

    /// Delegate table construction to the trained model.
    fn prepare_query_table(&self, query: &[f32], table: &mut TrainedQueryTable) -> Result<()> {
        if query.len() != self.config.dim {
            return Err(MetricError::DimensionMismatch {
                expected: self.config.dim,
                actual: query.len(),
            });
        }
        self.model.query_table(query, &mut table.entries)?;
        table.prepared = true;
        Ok(())
    }

    fn distance_to_query(&self, table: &TrainedQueryTable, code: &[u8]) -> Result<f32> {
        if !table.prepared {
            return Err(MetricError::QueryTableMissing);
        }
        self.check_code(code.len())?;

        let k = self.config.k;
        let mut res = 0.0f32;
        for (m, &c) in code.iter().enumerate() {
            res += table.entries[m * k + c as usize];
        }
        Ok(res)
    }
}
