//! Element decoders applied to every matched source/target transfer.
//!
//! The decode engine only slices bytes; an [`ElementDecoder`] turns
//! `count` source elements into `count` target elements. Any
//! `Fn(&[u8], &mut [u8], usize) -> Result<(), E>` closure is a decoder, and
//! the common cases ship ready-made:
//!
//! - [`RawCopy`]: identical layouts, plain memcpy.
//! - [`SwapBytes`]: same width, opposite byte order.
//! - [`Widen`]: lossless numeric widening (`u8 -> u16`, `f32 -> f64`, ...).

use std::marker::PhantomData;

use bytemuck::Pod;

use crate::error::Error;

/// Converts `count` elements from `source` into `target`.
///
/// `source.len()` is `count * source_type_size` and `target.len()` is
/// `count * source_type_size * target_type_factor`.
pub trait ElementDecoder<E> {
    fn decode(&self, source: &[u8], target: &mut [u8], count: usize) -> Result<(), E>;
}

impl<E, F> ElementDecoder<E> for F
where
    F: Fn(&[u8], &mut [u8], usize) -> Result<(), E>,
{
    #[inline]
    fn decode(&self, source: &[u8], target: &mut [u8], count: usize) -> Result<(), E> {
        self(source, target, count)
    }
}

fn check_len(what: &str, expected: usize, actual: usize) -> Result<(), Error> {
    if expected != actual {
        return Err(Error::Decoder(format!(
            "{what} holds {actual} bytes, expected {expected}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// RawCopy
// ---------------------------------------------------------------------------

/// Byte-for-byte copy. Requires `target_type_factor == 1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCopy;

impl<E: From<Error>> ElementDecoder<E> for RawCopy {
    #[inline]
    fn decode(&self, source: &[u8], target: &mut [u8], _count: usize) -> Result<(), E> {
        check_len("target", source.len(), target.len())?;
        target.copy_from_slice(source);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SwapBytes
// ---------------------------------------------------------------------------

/// Copies elements of `element_size` bytes, reversing each one.
#[derive(Debug, Clone, Copy)]
pub struct SwapBytes {
    element_size: usize,
}

impl SwapBytes {
    pub fn new(element_size: usize) -> Self {
        Self { element_size }
    }

    pub fn element_size(&self) -> usize {
        self.element_size
    }
}

impl<E: From<Error>> ElementDecoder<E> for SwapBytes {
    fn decode(&self, source: &[u8], target: &mut [u8], count: usize) -> Result<(), E> {
        let size = self.element_size;
        if size == 0 {
            return Err(Error::Decoder("element size must be > 0".into()).into());
        }
        check_len("source", count * size, source.len())?;
        check_len("target", count * size, target.len())?;

        for (dst, src) in target.chunks_exact_mut(size).zip(source.chunks_exact(size)) {
            for (d, s) in dst.iter_mut().zip(src.iter().rev()) {
                *d = *s;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Widen
// ---------------------------------------------------------------------------

/// Reads native-endian `S` elements and writes them as `T`.
///
/// Pair with `target_type_factor = Widen::<S, T>::FACTOR`.
pub struct Widen<S, T> {
    _marker: PhantomData<fn(S) -> T>,
}

impl<S, T> Widen<S, T> {
    /// Ratio of target to source element width.
    pub const FACTOR: usize = std::mem::size_of::<T>() / std::mem::size_of::<S>();

    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<S, T> Default for Widen<S, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, T> Clone for Widen<S, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S, T> Copy for Widen<S, T> {}

impl<S, T> std::fmt::Debug for Widen<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Widen<{}, {}>",
            std::any::type_name::<S>(),
            std::any::type_name::<T>()
        )
    }
}

impl<E, S, T> ElementDecoder<E> for Widen<S, T>
where
    E: From<Error>,
    S: Pod,
    T: Pod + From<S>,
{
    fn decode(&self, source: &[u8], target: &mut [u8], count: usize) -> Result<(), E> {
        let source_size = std::mem::size_of::<S>();
        let target_size = std::mem::size_of::<T>();
        check_len("source", count * source_size, source.len())?;
        check_len("target", count * target_size, target.len())?;

        for (src, dst) in source
            .chunks_exact(source_size)
            .zip(target.chunks_exact_mut(target_size))
        {
            let value: S = bytemuck::pod_read_unaligned(src);
            dst.copy_from_slice(bytemuck::bytes_of(&T::from(value)));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
