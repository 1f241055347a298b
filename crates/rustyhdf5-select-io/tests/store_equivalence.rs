//! All chunk stores agree with a dense reference array.

use std::io::Write;

use rustyhdf5_select::index::{element_count, to_coordinates, to_linear_index};
use rustyhdf5_select::{ChunkCache, IrregularHyperslab, PointSelection, Selection};
use rustyhdf5_select_io::{ChunkStore, ImplicitChunkLayout};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const DIMS: [u64; 3] = [13, 7, 10];
const CHUNK_DIMS: [u64; 3] = [4, 3, 4];

/// Value of the dense dataset at linear index `i`.
fn value(i: u64) -> u32 {
    (i as u32).wrapping_mul(2_654_435_761) >> 7
}

fn layout() -> ImplicitChunkLayout {
    ImplicitChunkLayout::new(DIMS.to_vec(), CHUNK_DIMS.to_vec(), 4).unwrap()
}

/// Lay the dense dataset out as implicit chunks after `header` filler bytes.
fn pack(header: usize) -> Vec<u8> {
    let layout = layout();
    let scaled = layout.scaled_dims();
    let per_chunk = element_count(&CHUNK_DIMS);
    let mut out = vec![0xA5u8; header];
    for c in 0..layout.chunk_count() {
        let chunk = to_coordinates(c, &scaled);
        for i in 0..per_chunk {
            let within = to_coordinates(i, &CHUNK_DIMS);
            let global: Vec<u64> = (0..3).map(|d| chunk[d] * CHUNK_DIMS[d] + within[d]).collect();
            let v = if global.iter().zip(&DIMS).all(|(g, d)| g < d) {
                value(to_linear_index(&global, &DIMS))
            } else {
                0
            };
            out.extend_from_slice(&v.to_ne_bytes());
        }
    }
    out
}

/// Dense reference read of the box `start .. start + shape`.
fn reference_box(start: &[u64], shape: &[u64]) -> Vec<u8> {
    let mut out = Vec::new();
    for i in 0..element_count(shape) {
        let local = to_coordinates(i, shape);
        let global: Vec<u64> = (0..3).map(|d| start[d] + local[d]).collect();
        out.extend_from_slice(&value(to_linear_index(&global, &DIMS)).to_ne_bytes());
    }
    out
}

fn memory_store() -> ChunkStore<Vec<u8>> {
    ChunkStore::new(layout(), pack(0))
}

const BOXES: [([u64; 3], [u64; 3]); 4] = [
    ([0, 0, 0], [13, 7, 10]),
    ([1, 2, 3], [11, 4, 6]),
    ([5, 6, 9], [1, 1, 1]),
    ([3, 0, 2], [9, 7, 0]),
];

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[test]
fn memory_store_matches_reference() {
    let store = memory_store();
    let cache = ChunkCache::new();
    for (start, shape) in BOXES {
        assert_eq!(
            store.read_box(&start, &shape, Some(&cache)).unwrap(),
            reference_box(&start, &shape),
            "box {start:?} + {shape:?}"
        );
    }
}

#[test]
fn scattered_selections() {
    let store = memory_store();

    let points = vec![vec![12, 6, 9], vec![0, 0, 0], vec![4, 3, 4], vec![12, 6, 9]];
    let selection: Selection = PointSelection::new(3, points.clone()).unwrap().into();
    let expected: Vec<u8> = points
        .iter()
        .flat_map(|p| value(to_linear_index(p, &DIMS)).to_ne_bytes())
        .collect();
    assert_eq!(store.read_selection(&selection, None).unwrap(), expected);

    let selection: Selection = IrregularHyperslab::new(
        3,
        vec![
            (vec![2, 1, 5], vec![4, 3, 9]),
            (vec![10, 0, 0], vec![13, 2, 2]),
        ],
    )
    .unwrap()
    .into();
    let mut expected = reference_box(&[2, 1, 5], &[2, 2, 4]);
    expected.extend(reference_box(&[10, 0, 0], &[3, 2, 2]));
    assert_eq!(store.read_selection(&selection, None).unwrap(), expected);
}

#[test]
fn box_out_of_bounds_is_rejected() {
    let store = memory_store();
    assert!(store.read_box(&[10, 0, 0], &[4, 1, 1], None).is_err());
}

// ---------------------------------------------------------------------------
// Memory-mapped store
// ---------------------------------------------------------------------------

#[cfg(feature = "mmap")]
mod mmap_tests {
    use super::*;
    use rustyhdf5_select_io::MmapChunkStore;

    #[test]
    fn mmap_store_matches_memory_store() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&pack(512)).unwrap();
        file.flush().unwrap();

        let mapped = MmapChunkStore::open(file.path(), layout().with_base_offset(512)).unwrap();
        let memory = memory_store();
        for (start, shape) in BOXES {
            assert_eq!(
                mapped.read_box(&start, &shape, None).unwrap(),
                memory.read_box(&start, &shape, None).unwrap()
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Async file store
// ---------------------------------------------------------------------------

#[cfg(feature = "async")]
mod async_tests {
    use super::*;
    use rustyhdf5_select::RegularHyperslab;
    use rustyhdf5_select_io::AsyncFileChunkStore;
    use std::sync::Arc;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn async_store_matches_memory_store() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&pack(0)).unwrap();
        file.flush().unwrap();

        let store = AsyncFileChunkStore::open(file.path(), layout()).await.unwrap();
        let cache = ChunkCache::new();
        for (start, shape) in BOXES {
            let selection: Selection =
                RegularHyperslab::contiguous(start.to_vec(), shape.to_vec())
                    .unwrap()
                    .into();
            assert_eq!(
                store.read_selection(&selection, Some(&cache)).await.unwrap(),
                reference_box(&start, &shape)
            );
        }
        assert!(cache.hits() > 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn read_selection_runs_on_spawned_tasks() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&pack(0)).unwrap();
        file.flush().unwrap();

        let store = Arc::new(AsyncFileChunkStore::open(file.path(), layout()).await.unwrap());
        let cache = Arc::new(ChunkCache::new());
        let tasks: Vec<_> = BOXES
            .into_iter()
            .map(|(start, shape)| {
                let store = Arc::clone(&store);
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    let selection: Selection =
                        RegularHyperslab::contiguous(start.to_vec(), shape.to_vec())?.into();
                    store.read_selection(&selection, Some(&*cache)).await
                })
            })
            .collect();

        for ((start, shape), task) in BOXES.into_iter().zip(tasks) {
            assert_eq!(task.await.unwrap().unwrap(), reference_box(&start, &shape));
        }
    }
}

// ---------------------------------------------------------------------------
// Parallel reads
// ---------------------------------------------------------------------------

#[cfg(feature = "parallel")]
mod parallel_tests {
    use super::*;
    use rustyhdf5_select_io::read_box_parallel;

    #[test]
    fn parallel_matches_sequential() {
        let store = memory_store();
        let cache = ChunkCache::with_capacity(4096, 16);
        for (start, shape) in BOXES {
            let parallel =
                read_box_parallel(&store, store.layout(), &start, &shape, &cache).unwrap();
            assert_eq!(parallel, store.read_box(&start, &shape, None).unwrap());
        }
    }

    #[test]
    fn many_bands_fan_out() {
        // one chunk row per band, 13 rows in chunks of 1 -> 13 bands
        let layout = ImplicitChunkLayout::new(DIMS.to_vec(), vec![1, 7, 10], 4).unwrap();
        let bytes: Vec<u8> = (0..element_count(&DIMS))
            .flat_map(|i| value(i).to_ne_bytes())
            .collect();
        let store = ChunkStore::new(layout, bytes);
        let cache = ChunkCache::new();

        let out = read_box_parallel(&store, store.layout(), &[0, 0, 0], &DIMS, &cache).unwrap();
        assert_eq!(out, reference_box(&[0, 0, 0], &DIMS));
        assert_eq!(cache.consumed_slots(), 13);
    }

    #[test]
    fn parallel_rejects_out_of_bounds() {
        let store = memory_store();
        let cache = ChunkCache::new();
        assert!(read_box_parallel(&store, store.layout(), &[0, 0, 0], &[14, 1, 1], &cache).is_err());
    }
}
