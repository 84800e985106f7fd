//! pqspace: the distance-computation core of a billion-scale ANN engine.
//!
//! An inverted-file or graph-based index routes a query to candidate
//! partitions and walks posting lists; what it needs from this crate is a
//! pluggable metric that can compute, compress, and estimate vector
//! distances without ever materializing full-precision vectors during
//! search. That surface is the [`Space`] trait, implemented by four
//! variants:
//!
//! - [`FloatL2Space`] / [`ByteL2Space`]: exact squared-L2 over raw float
//!   or byte-quantized vectors, backed by the SIMD kernels in [`simd`];
//! - [`PqL2Space`]: product-quantized codes driven by externally trained
//!   codebook and construction-table artifacts;
//! - [`TrainedPqSpace`]: product-quantized codes driven by an external
//!   trainer behind the [`PqTrainer`]/[`TrainedPq`] boundary, with model
//!   caching.
//!
//! ## Why product quantization
//!
//! A 128-dim float vector is 512 bytes; at a billion vectors that is
//! 500GB of memory traffic per scan. PQ stores `M` one-byte centroid
//! indices instead (8-32 bytes) and estimates distances through
//! precomputed lookup tables, turning a candidate evaluation from `O(D)`
//! arithmetic into `O(M)` table lookups. The estimate is a controlled
//! approximation, exact only when vectors sit on their assigned
//! centroids. That is the trade every large-scale ANN system makes.
//!
//! ## Concurrency
//!
//! Spaces hold only immutable state once loaded and may be shared freely
//! across threads. Per-query lookup tables are explicit caller-owned
//! values (one per worker thread), so there is no hidden mutable state
//! and no synchronization on the query hot path. See [`space`].

pub mod error;
pub mod exact;
pub mod pq;
pub mod simd;
pub mod space;
pub mod trained;
pub mod vecs;

pub use error::{MetricError, Result};
pub use exact::{ByteL2Space, FloatL2Space};
pub use pq::{PqConfig, PqL2Space, PqQueryTable};
pub use space::Space;
pub use trained::{CodebookPq, PqTrainer, TrainedPq, TrainedPqSpace, TRAIN_SAMPLE_SIZE};
