//! Error types for selection walking and chunk decoding.

/// Which side of a decode ran out of steps first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The dataset (chunked) side.
    Source,
    /// The memory buffer side.
    Target,
}

impl core::fmt::Display for Side {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Side::Source => f.write_str("source"),
            Side::Target => f.write_str("target"),
        }
    }
}

/// Errors raised while validating selections, walking them, or decoding.
///
/// Validation variants are always raised before any chunk is fetched.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("rank mismatch for {what}: expected {expected}, got {actual}")]
    RankMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid stride {stride} for block {block} in dimension {dimension} (stride must be > 0 and >= block)")]
    InvalidStride {
        dimension: usize,
        stride: u64,
        block: u64,
    },

    #[error("invalid block in dimension {dimension}: end {end} is before start {start}")]
    InvalidBlock {
        dimension: usize,
        start: u64,
        end: u64,
    },

    #[error("flat block offsets of length {len} are not a multiple of 2 * rank ({rank})")]
    InvalidOffsets { len: usize, rank: usize },

    #[error("{what} overflows u64")]
    Overflow { what: &'static str },

    #[error("dimension {dimension} has zero length")]
    ZeroDimension { dimension: usize },

    #[error("source selection has {source_count} elements but target selection has {target_count}")]
    ElementCountMismatch { source_count: u64, target_count: u64 },

    #[error("selection exceeds limits in dimension {dimension}: stop {stop} > limit {limit}")]
    ExceedsLimits {
        dimension: usize,
        stop: u64,
        limit: u64,
    },

    #[error("invalid type size: source type size {source_type_size}, target type factor {target_type_factor}")]
    InvalidTypeSize {
        source_type_size: usize,
        target_type_factor: usize,
    },

    #[error("source range {offset}..{end} exceeds chunk of {available} bytes", end = .offset + .len)]
    SourceOutOfRange {
        offset: usize,
        len: usize,
        available: usize,
    },

    #[error("target range {offset}..{end} exceeds buffer of {available} bytes", end = .offset + .len)]
    TargetOutOfRange {
        offset: usize,
        len: usize,
        available: usize,
    },

    #[error("the {side} walker stopped early")]
    WalkerExhausted { side: Side },

    #[error("chunk {chunk:?} not found")]
    ChunkNotFound { chunk: Vec<u64> },

    #[error("decoder error: {0}")]
    Decoder(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
