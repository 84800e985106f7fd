//! The metric capability contract shared by every space variant.
//!
//! A [`Space`] is the entire surface the index's search loop depends on:
//! per-vector encoded size, a loop-bound dimension, a code-to-code
//! distance, and a query-table path for cheap query-to-code distances.
//! Keeping this contract stable across variants lets the index stay
//! metric-agnostic.
//!
//! # Concurrency
//!
//! A space holds only immutable, shareable state once loaded; many threads
//! may call [`Space::distance`] and [`Space::distance_to_query`]
//! concurrently against the same instance without synchronization. The
//! per-query lookup table is an explicit caller-owned value
//! ([`Space::QueryTable`]) rather than instance state. Each worker thread
//! allocates its own with [`Space::alloc_query_table`] and reuses it
//! across queries.

use crate::error::Result;

/// A distance space over encoded vectors.
///
/// Implemented by every concrete variant: exact float
/// ([`crate::FloatL2Space`]), exact byte ([`crate::ByteL2Space`]),
/// product-quantized ([`crate::PqL2Space`]), and externally-trained
/// product-quantized ([`crate::TrainedPqSpace`]).
pub trait Space {
    /// Scalar type distances are reported in (`f32` for float spaces,
    /// an integer type for byte/table spaces).
    type Distance: Copy + PartialOrd;

    /// Element slice of an encoded database vector (`[f32]` for raw float
    /// spaces, `[u8]` for byte and quantized spaces).
    type Code: ?Sized;

    /// Raw query representation fed to [`Space::prepare_query_table`].
    type Query: ?Sized;

    /// Caller-owned per-query lookup state. Freshly allocated tables are
    /// unprepared; using one before [`Space::prepare_query_table`] yields
    /// [`crate::MetricError::QueryTableMissing`].
    type QueryTable;

    /// Fixed per-vector storage footprint in bytes.
    fn encoded_size(&self) -> usize;

    /// The value callers use to size loop bounds.
    ///
    /// Variant-dependent: the raw feature count `D` for exact spaces, the
    /// subspace count `M` for quantized spaces. Each implementation
    /// documents which.
    fn data_dim(&self) -> usize;

    /// Allocate an unprepared query table sized for this space.
    fn alloc_query_table(&self) -> Self::QueryTable;

    /// Symmetric distance between two already-encoded vectors.
    ///
    /// Deterministic and pure: no side effects, same inputs always produce
    /// the same output.
    fn distance(&self, a: &Self::Code, b: &Self::Code) -> Result<Self::Distance>;

    /// Overwrite `table` with the lookup entries for `query`.
    ///
    /// Paid once per query; cost is `O(D * K)` for quantized spaces.
    fn prepare_query_table(&self, query: &Self::Query, table: &mut Self::QueryTable)
        -> Result<()>;

    /// Distance between one encoded vector and a previously prepared query
    /// table.
    ///
    /// The hot inner-loop operation: `O(M)` table lookups for quantized
    /// spaces, evaluated once per candidate visited during search.
    fn distance_to_query(
        &self,
        table: &Self::QueryTable,
        code: &Self::Code,
    ) -> Result<Self::Distance>;
}
