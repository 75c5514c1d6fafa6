//! The stream abstraction: element types, the operation trait, and
//! construction-time buffer validation.

use std::fmt;
use std::ops::{Add, AddAssign, Mul};

use crate::error::{Result, StreamError};
use crate::kernels::{GROUP_SIZE, SCALAR};
use crate::registry::DeviceDescriptor;

/// Numeric element type a stream can be instantiated over.
///
/// Exactly two types are supported, `f32` and `f64`. The OpenCL type name
/// is carried as an explicit constant so the kernel build maps the Rust
/// type to a `-DTYPE=` macro without any overload tricks.
pub trait Element:
    Copy
    + Default
    + PartialEq
    + PartialOrd
    + fmt::Debug
    + fmt::Display
    + Add<Output = Self>
    + AddAssign
    + Mul<Output = Self>
    + Send
    + Sync
    + 'static
{
    /// OpenCL source type name substituted into the kernel build.
    const CL_TYPE_NAME: &'static str;
    /// Whether this type needs the device's FP64 capability.
    const REQUIRES_FP64: bool;

    fn zero() -> Self;
    /// The STREAM scale factor (0.3) at this precision.
    fn scalar() -> Self;
    fn from_f64(v: f64) -> Self;
    fn to_f64(self) -> f64;
}

impl Element for f32 {
    const CL_TYPE_NAME: &'static str = "float";
    const REQUIRES_FP64: bool = false;

    fn zero() -> Self {
        0.0
    }
    fn scalar() -> Self {
        SCALAR as f32
    }
    fn from_f64(v: f64) -> Self {
        v as f32
    }
    fn to_f64(self) -> f64 {
        f64::from(self)
    }
}

impl Element for f64 {
    const CL_TYPE_NAME: &'static str = "double";
    const REQUIRES_FP64: bool = true;

    fn zero() -> Self {
        0.0
    }
    fn scalar() -> Self {
        SCALAR
    }
    fn from_f64(v: f64) -> Self {
        v
    }
    fn to_f64(self) -> f64 {
        self
    }
}

/// The five STREAM operations plus host transfers.
///
/// Every method is synchronous: it returns only after the enqueued work
/// has drained, so operation N+1 always observes the effects of N. None
/// of the kernels validate array contents; garbage input propagates
/// through the formulas unchanged.
pub trait StreamOps<T: Element> {
    /// `c[i] = a[i]`
    fn copy(&mut self) -> Result<()>;
    /// `b[i] = scalar * c[i]`
    fn mul(&mut self) -> Result<()>;
    /// `c[i] = a[i] + b[i]`
    fn add(&mut self) -> Result<()>;
    /// `a[i] = b[i] + scalar * c[i]`
    fn triad(&mut self) -> Result<()>;
    /// Two-stage reduction of `sum_i a[i] * b[i]`; see the crate docs for
    /// the accumulation order.
    fn dot(&mut self) -> Result<T>;

    /// Copy three host slices into the device arrays, in the order a, b, c.
    fn write_arrays(&mut self, a: &[T], b: &[T], c: &[T]) -> Result<()>;
    /// Copy the device arrays back out, same ordering.
    fn read_arrays(&mut self, a: &mut [T], b: &mut [T], c: &mut [T]) -> Result<()>;
}

/// Reject array sizes the dot kernel's grouping cannot cover.
///
/// Non-divisible sizes would leave a trailing partial work-group whose
/// reduction reads out of range, so they are rejected outright rather
/// than truncated.
pub fn validate_alignment(array_size: usize) -> Result<()> {
    if array_size == 0 || array_size % GROUP_SIZE != 0 {
        return Err(StreamError::UnalignedArraySize { array_size, group_size: GROUP_SIZE });
    }
    Ok(())
}

/// Reject a 64-bit instantiation on a device without FP64 support.
pub fn validate_precision<T: Element>(desc: &DeviceDescriptor) -> Result<()> {
    if T::REQUIRES_FP64 && !desc.supports_fp64 {
        return Err(StreamError::UnsupportedPrecision { device: desc.name.clone() });
    }
    Ok(())
}

/// Check the buffer-set footprint against a device's memory limits.
///
/// One buffer must fit in a single allocation and the three primary
/// buffers together must fit in global memory. Runs once at construction;
/// the buffer set is never resized afterwards.
pub fn validate_buffer_fit<T: Element>(
    desc: &DeviceDescriptor,
    array_size: usize,
) -> Result<()> {
    let elem = std::mem::size_of::<T>() as u64;
    let buffer_bytes = elem
        .checked_mul(array_size as u64)
        .ok_or(StreamError::BufferTooLarge {
            requested: u64::MAX,
            max_alloc: desc.max_alloc_bytes,
        })?;

    if buffer_bytes > desc.max_alloc_bytes {
        return Err(StreamError::BufferTooLarge {
            requested: buffer_bytes,
            max_alloc: desc.max_alloc_bytes,
        });
    }

    let total_bytes =
        buffer_bytes.checked_mul(3).ok_or(StreamError::InsufficientDeviceMemory {
            required: u64::MAX,
            available: desc.global_memory_bytes,
        })?;

    if total_bytes > desc.global_memory_bytes {
        return Err(StreamError::InsufficientDeviceMemory {
            required: total_bytes,
            available: desc.global_memory_bytes,
        });
    }

    Ok(())
}
