//! CPU reference stream.
//!
//! Implements every operation of [`StreamOps`] with plain loops over host
//! vectors, including the dot kernel's exact accumulation order: per-group
//! tree reduction over `GROUP_SIZE` tiles, then a sequential host sum of
//! the per-group partials. Serves as the correctness reference for device
//! backends and lets the full property suite run without GPU hardware.

use crate::error::Result;
use crate::kernels::GROUP_SIZE;
use crate::stream::{validate_alignment, Element, StreamOps};

/// Host-memory stream over three primary arrays and a partial-sum scratch.
pub struct HostStream<T: Element> {
    array_size: usize,
    a: Vec<T>,
    b: Vec<T>,
    c: Vec<T>,
    partial_sums: Vec<T>,
    wg_scratch: Vec<T>,
}

impl<T: Element> HostStream<T> {
    /// Create a host stream over `array_size` elements.
    ///
    /// Fails with `UnalignedArraySize` unless `array_size` is a positive
    /// multiple of [`GROUP_SIZE`], matching the device backend's rejection.
    pub fn new(array_size: usize) -> Result<Self> {
        validate_alignment(array_size)?;
        Ok(Self {
            array_size,
            a: vec![T::zero(); array_size],
            b: vec![T::zero(); array_size],
            c: vec![T::zero(); array_size],
            partial_sums: vec![T::zero(); array_size / GROUP_SIZE],
            wg_scratch: vec![T::zero(); GROUP_SIZE],
        })
    }

    /// Element count of the primary arrays.
    pub fn array_size(&self) -> usize {
        self.array_size
    }
}

impl<T: Element> StreamOps<T> for HostStream<T> {
    fn copy(&mut self) -> Result<()> {
        self.c.copy_from_slice(&self.a);
        Ok(())
    }

    fn mul(&mut self) -> Result<()> {
        let scalar = T::scalar();
        for i in 0..self.array_size {
            self.b[i] = scalar * self.c[i];
        }
        Ok(())
    }

    fn add(&mut self) -> Result<()> {
        for i in 0..self.array_size {
            self.c[i] = self.a[i] + self.b[i];
        }
        Ok(())
    }

    fn triad(&mut self) -> Result<()> {
        let scalar = T::scalar();
        for i in 0..self.array_size {
            self.a[i] = self.b[i] + scalar * self.c[i];
        }
        Ok(())
    }

    fn dot(&mut self) -> Result<T> {
        // Device stage: tree reduction per work-group, same halving order
        // as the stream_dot kernel.
        let groups = self.array_size / GROUP_SIZE;
        for group in 0..groups {
            let base = group * GROUP_SIZE;
            for lane in 0..GROUP_SIZE {
                self.wg_scratch[lane] = self.a[base + lane] * self.b[base + lane];
            }
            let mut offset = GROUP_SIZE / 2;
            while offset > 0 {
                for lane in 0..offset {
                    let other = self.wg_scratch[lane + offset];
                    self.wg_scratch[lane] += other;
                }
                offset /= 2;
            }
            self.partial_sums[group] = self.wg_scratch[0];
        }

        // Host stage: sequential sum of the per-group partials.
        let mut sum = T::zero();
        for &partial in &self.partial_sums {
            sum += partial;
        }
        Ok(sum)
    }

    fn write_arrays(&mut self, a: &[T], b: &[T], c: &[T]) -> Result<()> {
        debug_assert_eq!(a.len(), self.array_size);
        debug_assert_eq!(b.len(), self.array_size);
        debug_assert_eq!(c.len(), self.array_size);
        self.a.copy_from_slice(a);
        self.b.copy_from_slice(b);
        self.c.copy_from_slice(c);
        Ok(())
    }

    fn read_arrays(&mut self, a: &mut [T], b: &mut [T], c: &mut [T]) -> Result<()> {
        debug_assert_eq!(a.len(), self.array_size);
        debug_assert_eq!(b.len(), self.array_size);
        debug_assert_eq!(c.len(), self.array_size);
        a.copy_from_slice(&self.a);
        b.copy_from_slice(&self.b);
        c.copy_from_slice(&self.c);
        Ok(())
    }
}
