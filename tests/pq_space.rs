//! End-to-end tests for the PQ codec artifacts and the space contract.
//!
//! These exercise the on-disk formats the offline training pipeline
//! produces: the codebook record file, the construction-table file, and
//! the trained-model cache.

use std::io::{BufWriter, Cursor, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use pqspace::{
    vecs, CodebookPq, MetricError, PqConfig, PqL2Space, PqTrainer, Space, TrainedPq,
    TrainedPqSpace,
};
use tempfile::TempDir;

/// Codebook bytes where centroid `k` of every subspace is the constant
/// vector `k`, in the documented record format.
fn constant_codebook_bytes(m: usize, k: usize, sub_dim: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    for _ in 0..m {
        for centroid in 0..k {
            let values = vec![centroid as f32; sub_dim];
            vecs::write_f32_record(&mut buf, &values).unwrap();
        }
    }
    buf
}

/// Construction-table bytes matching [`constant_codebook_bytes`]:
/// the distance between constant centroids `a` and `b` over `sub_dim`
/// components is `sub_dim * (a - b)^2`.
fn constant_table_bytes(m: usize, k: usize, sub_dim: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    for _ in 0..m {
        for a in 0..k as i64 {
            for b in 0..k as i64 {
                let dist = (sub_dim as i64 * (a - b) * (a - b)) as f32;
                buf.extend_from_slice(&dist.to_le_bytes());
            }
        }
    }
    buf
}

fn loaded_space(dim: usize, m: usize, k: usize) -> PqL2Space {
    let config = PqConfig::new(dim, m, k);
    let mut space = PqL2Space::new(config).unwrap();
    space
        .load_codebook(&mut Cursor::new(constant_codebook_bytes(
            m,
            k,
            config.sub_dim(),
        )))
        .unwrap();
    space
        .load_construction_table(&mut Cursor::new(constant_table_bytes(
            m,
            k,
            config.sub_dim(),
        )))
        .unwrap();
    space
}

#[test]
fn full_scale_scenario_identical_codes_are_at_distance_zero() {
    // D=128, M=8, K=256: 8x256 centroids of dimension 16 and 8 matrices
    // of 256x256 entries, the shape of a production SIFT-style deployment.
    let space = loaded_space(128, 8, 256);

    assert_eq!(space.encoded_size(), 8);
    assert_eq!(space.data_dim(), 8);

    let code_a = [0u8; 8];
    let code_b = [0u8; 8];
    assert_eq!(space.distance(&code_a, &code_b).unwrap(), 0);

    // A non-trivial pair: per subspace 16 * (a - b)^2.
    let code_c = [10u8; 8];
    let code_d = [13u8; 8];
    assert_eq!(space.distance(&code_c, &code_d).unwrap(), 8 * 16 * 9);
}

#[test]
fn symmetric_distance_is_symmetric() {
    let space = loaded_space(32, 4, 16);
    let a = [3u8, 7, 1, 15];
    let b = [9u8, 0, 14, 2];
    assert_eq!(
        space.distance(&a, &b).unwrap(),
        space.distance(&b, &a).unwrap()
    );
}

#[test]
fn malformed_codebook_dimension_is_rejected() {
    // Configuration expects Dv=16; the file declares Dv=15.
    let config = PqConfig::new(128, 8, 256);
    let mut space = PqL2Space::new(config).unwrap();

    let mut buf = Vec::new();
    vecs::write_f32_record(&mut buf, &vec![0.0f32; 15]).unwrap();

    let err = space.load_codebook(&mut Cursor::new(buf)).unwrap_err();
    assert!(matches!(
        err,
        MetricError::DimensionMismatch {
            expected: 16,
            actual: 15
        }
    ));
}

#[test]
fn truncated_construction_table_is_an_io_error() {
    let config = PqConfig::new(32, 4, 16);
    let mut space = PqL2Space::new(config).unwrap();

    // Three of the four matrices.
    let full = constant_table_bytes(3, 16, 8);
    let err = space
        .load_construction_table(&mut Cursor::new(full))
        .unwrap_err();
    assert!(matches!(err, MetricError::Io(_)));
}

#[test]
fn distance_to_query_without_prepare_is_a_precondition_violation() {
    // Freshly constructed, fully loaded instance.
    let space = loaded_space(32, 4, 16);
    let table = space.alloc_query_table();
    let err = space.distance_to_query(&table, &[0u8; 4]).unwrap_err();
    assert!(matches!(err, MetricError::QueryTableMissing));
}

#[test]
fn query_equal_to_centroid_zeroes_its_table_entry() {
    let space = loaded_space(32, 4, 16);
    let mut table = space.alloc_query_table();

    // Byte query sitting exactly on centroid 5 in every subspace.
    space.prepare_query_table(&[5u8; 32], &mut table).unwrap();
    for m in 0..4 {
        assert_eq!(table.get(m, 5), 0);
    }
    assert_eq!(space.distance_to_query(&table, &[5u8; 4]).unwrap(), 0);

    // Asymmetric distance to centroid-0 codes: 8 * 25 per subspace.
    assert_eq!(space.distance_to_query(&table, &[0u8; 4]).unwrap(), 800);
}

#[test]
fn codebook_file_roundtrip_is_bit_identical() {
    let config = PqConfig::new(32, 4, 16);
    let original = constant_codebook_bytes(4, 16, 8);

    let mut space = PqL2Space::new(config).unwrap();
    space
        .load_codebook(&mut Cursor::new(original.clone()))
        .unwrap();

    let mut rewritten = Vec::new();
    space.write_codebook(&mut rewritten).unwrap();
    assert_eq!(rewritten, original);
}

#[test]
fn construction_table_roundtrip_preserves_distances() {
    let mut space = loaded_space(32, 4, 16);
    // Rebuild the table from the codebook, write it, reload it, and check
    // distances agree entry for entry.
    space.build_construction_table().unwrap();

    let mut buf = Vec::new();
    space.write_construction_table(&mut buf).unwrap();

    let mut reloaded = PqL2Space::new(PqConfig::new(32, 4, 16)).unwrap();
    reloaded
        .load_construction_table(&mut Cursor::new(buf))
        .unwrap();

    for a in 0..16u8 {
        for b in 0..16u8 {
            let code_a = [a; 4];
            let code_b = [b; 4];
            assert_eq!(
                space.distance(&code_a, &code_b).unwrap(),
                reloaded.distance(&code_a, &code_b).unwrap()
            );
        }
    }
}

#[test]
fn encode_then_distance_recovers_assignment() {
    let space = loaded_space(32, 4, 16);

    // Sub-vectors sitting on centroids 2, 9, 0, 15.
    let mut vector = Vec::new();
    for c in [2.0f32, 9.0, 0.0, 15.0] {
        vector.extend(std::iter::repeat(c).take(8));
    }
    let mut code = [0u8; 4];
    space.encode(&vector, &mut code).unwrap();
    assert_eq!(code, [2, 9, 0, 15]);
    assert_eq!(space.distance(&code, &code).unwrap(), 0);
}

// ---------------------------------------------------------------------------
// Externally-trained variant
// ---------------------------------------------------------------------------

/// Trainer stub standing in for the external training machinery: counts
/// invocations and emits the constant-centroid model.
struct StubTrainer {
    train_calls: AtomicUsize,
}

impl StubTrainer {
    fn new() -> Self {
        Self {
            train_calls: AtomicUsize::new(0),
        }
    }
}

impl PqTrainer for StubTrainer {
    type Model = CodebookPq;

    fn train(&self, config: &PqConfig, samples: &[f32]) -> pqspace::Result<CodebookPq> {
        self.train_calls.fetch_add(1, Ordering::SeqCst);
        assert!(!samples.is_empty());
        assert_eq!(samples.len() % config.dim, 0);

        let sub_dim = config.sub_dim();
        let mut codebooks = Vec::new();
        for _ in 0..config.m {
            for centroid in 0..config.k {
                codebooks.extend(std::iter::repeat(centroid as f32).take(sub_dim));
            }
        }
        CodebookPq::from_codebooks(config, codebooks)
    }

    fn read_model<R: std::io::Read>(
        &self,
        config: &PqConfig,
        reader: &mut R,
    ) -> pqspace::Result<CodebookPq> {
        CodebookPq::read_from(config, reader)
    }
}

fn write_sample_file(path: &Path, dim: usize, records: usize) {
    let mut writer = BufWriter::new(std::fs::File::create(path).unwrap());
    for i in 0..records {
        let values: Vec<u8> = (0..dim).map(|j| ((i + j) % 250) as u8).collect();
        vecs::write_u8_record(&mut writer, &values).unwrap();
    }
    writer.flush().unwrap();
}

#[test]
fn trained_space_trains_once_and_reuses_the_cache() {
    let dir = TempDir::new().unwrap();
    let cache_path = dir.path().join("pq.model");
    let sample_path = dir.path().join("learn.bvecs");

    let config = PqConfig::new(16, 4, 8);
    write_sample_file(&sample_path, 16, 100);

    let trainer = StubTrainer::new();

    // Cache miss: trains and persists.
    let space = TrainedPqSpace::open(config, &cache_path, &sample_path, &trainer).unwrap();
    assert_eq!(trainer.train_calls.load(Ordering::SeqCst), 1);
    assert!(cache_path.exists());

    // Cache hit: no further training.
    let space2 = TrainedPqSpace::open(config, &cache_path, &sample_path, &trainer).unwrap();
    assert_eq!(trainer.train_calls.load(Ordering::SeqCst), 1);

    // Both instances agree on distances.
    let a = [1u8, 5, 0, 7];
    let b = [3u8, 5, 2, 7];
    assert_eq!(
        space.distance(&a, &b).unwrap(),
        space2.distance(&a, &b).unwrap()
    );
    assert_eq!(space.distance(&a, &a).unwrap(), 0.0);
}

#[test]
fn trained_space_query_table_delegates_to_the_model() {
    let dir = TempDir::new().unwrap();
    let cache_path = dir.path().join("pq.model");
    let sample_path = dir.path().join("learn.bvecs");

    let config = PqConfig::new(16, 4, 8);
    write_sample_file(&sample_path, 16, 50);

    let trainer = StubTrainer::new();
    let space = TrainedPqSpace::open(config, &cache_path, &sample_path, &trainer).unwrap();

    let mut table = space.alloc_query_table();
    // Query sitting on centroid 6 in every subspace.
    space
        .prepare_query_table(&[6.0f32; 16], &mut table)
        .unwrap();
    assert_eq!(space.distance_to_query(&table, &[6u8; 4]).unwrap(), 0.0);

    // Against the model directly.
    let mut entries = vec![0.0f32; 4 * 8];
    space.model().query_table(&[6.0f32; 16], &mut entries).unwrap();
    assert_eq!(entries[6], 0.0);
}

#[test]
fn trained_space_missing_sample_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let cache_path = dir.path().join("pq.model");
    let sample_path = dir.path().join("does-not-exist.bvecs");

    let trainer = StubTrainer::new();
    let err =
        TrainedPqSpace::open(PqConfig::new(16, 4, 8), &cache_path, &sample_path, &trainer)
            .unwrap_err();
    assert!(matches!(err, MetricError::Io(_)));
    assert_eq!(trainer.train_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn shared_space_with_per_thread_query_tables() {
    // Many threads may share one loaded space as long as each owns its
    // query table.
    let space = std::sync::Arc::new(loaded_space(32, 4, 16));

    let handles: Vec<_> = (0..4u8)
        .map(|centroid| {
            let space = std::sync::Arc::clone(&space);
            std::thread::spawn(move || {
                let mut table = space.alloc_query_table();
                space
                    .prepare_query_table(&[centroid; 32], &mut table)
                    .unwrap();
                space.distance_to_query(&table, &[centroid; 4]).unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 0);
    }
}
