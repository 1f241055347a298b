//! Selection walking and scatter/gather decoding for chunked HDF5 datasets.
//!
//! This crate covers the read-side core that sits between the chunk index
//! and the caller's memory: it enumerates selections as contiguous runs,
//! maps them onto the chunk grid, caches decoded chunks and copies (or
//! converts) the selected elements into an arbitrarily shaped target buffer.
//!
//! ```
//! use bytes::Bytes;
//! use rustyhdf5_select::{decode, DecodeInfo, Error, RawCopy, Selection, SyncReader};
//!
//! // a 4x4 dataset of bytes stored in 2x2 chunks; chunk (r, c) holds 10*r + c
//! let reader = SyncReader(|chunk: &[u64]| -> Result<Bytes, Error> {
//!     Ok(Bytes::from(vec![(chunk[0] * 10 + chunk[1]) as u8; 4]))
//! });
//! let source = Selection::all(&[4, 4]);
//! let target = Selection::all(&[16]);
//! let mut out = vec![0u8; 16];
//!
//! decode(2, 1, DecodeInfo {
//!     source_dims: &[4, 4],
//!     source_chunk_dims: &[2, 2],
//!     target_dims: &[16],
//!     source_selection: &source,
//!     target_selection: &target,
//!     reader,
//!     target: &mut out,
//!     decoder: RawCopy,
//!     cache: None,
//!     source_type_size: 1,
//!     target_type_factor: 1,
//! })?;
//! assert_eq!(&out[..4], &[0, 0, 1, 1]);
//! assert_eq!(&out[12..], &[10, 10, 11, 11]);
//! # Ok::<(), Error>(())
//! ```

pub mod chunk_cache;
pub mod convert;
pub mod decode;
pub mod error;
pub mod index;
pub mod reader;
pub mod selection;
pub mod walker;

pub use chunk_cache::{ChunkCache, ChunkCacheConfig, DEFAULT_CACHE_BYTES, DEFAULT_MAX_SLOTS};
pub use convert::{ElementDecoder, RawCopy, SwapBytes, Widen};
pub use decode::{decode, decode_async, DecodeInfo};
pub use error::{Error, Result, Side};
pub use reader::{AsyncReader, ChunkReader, SyncReader, TargetBuffer};
pub use selection::{
    BoxedSteps, CustomSelection, HyperslabBlock, IrregularHyperslab, PointSelection,
    RegularHyperslab, Selection, Step,
};
pub use walker::{walk, RelativeStep, Walk};
