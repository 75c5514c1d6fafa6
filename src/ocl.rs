//! OpenCL device backend built on the `opencl3` crate.
//!
//! [`OclDeviceCache`] enumerates every platform's devices once and serves
//! all later lookups from the cache; stream construction resolves its
//! device handle through it. [`OclStream`] owns one context, one in-order
//! command queue, five kernel handles, and the four device buffers. Every
//! operation enqueues over a
//! one-dimensional range of `array_size` and then drains the queue, so the
//! caller observes strictly sequential effects. All handles are released
//! by ownership when the stream drops, on every exit path including a
//! failed construction.

use std::ptr;

use opencl3::command_queue::CommandQueue;
use opencl3::context::Context;
use opencl3::device::{Device, CL_DEVICE_TYPE_ALL};
use opencl3::kernel::{ExecuteKernel, Kernel};
use opencl3::memory::{Buffer, ClMem, CL_MEM_READ_WRITE, CL_MEM_WRITE_ONLY};
use opencl3::platform::get_platforms;
use opencl3::program::Program;
use opencl3::types::CL_BLOCKING;
use tracing::debug;

use crate::error::{Result, StreamError};
use crate::kernels::{build_options, GROUP_SIZE, STREAM_KERNELS_SOURCE};
use crate::registry::{DeviceDescriptor, DeviceEnumerator};
use crate::stream::{
    validate_alignment, validate_buffer_fit, validate_precision, Element, StreamOps,
};

fn cl_err(what: &str, e: impl std::fmt::Display) -> StreamError {
    StreamError::Ocl(format!("{what}: {e}"))
}

/// Every device under every platform, in platform order then device order.
fn all_devices() -> Result<Vec<Device>> {
    let platforms = get_platforms().map_err(|e| cl_err("platform enumeration", e))?;

    let mut devices = Vec::new();
    for platform in platforms {
        let platform_name = platform.name().unwrap_or_default();
        debug!("scanning OpenCL platform: {}", platform_name);

        let device_ids = platform.get_devices(CL_DEVICE_TYPE_ALL).unwrap_or_default();
        devices.extend(device_ids.into_iter().map(Device::new));
    }
    Ok(devices)
}

/// Snapshot the registry-facing fields of a device.
fn describe(device: &Device) -> DeviceDescriptor {
    DeviceDescriptor {
        name: device.name().unwrap_or_default(),
        driver_version: device.driver_version().unwrap_or_default(),
        global_memory_bytes: device.global_mem_size().unwrap_or(0),
        max_alloc_bytes: device.max_mem_alloc_size().unwrap_or(0),
        supports_fp64: device.double_fp_config().map(|cfg| cfg != 0).unwrap_or(false),
    }
}

/// Process-wide cache of enumerated OpenCL devices with their raw handles.
///
/// Enumeration runs at most once; every lookup reads the cached list, so
/// repeated stream constructions share one platform scan. Holds the
/// device-registry role for the device backend: [`OclStream::new`] takes
/// a cache reference and resolves its handle through it.
#[derive(Default)]
pub struct OclDeviceCache {
    devices: Vec<Device>,
    descriptors: Vec<DeviceDescriptor>,
    populated: bool,
}

impl OclDeviceCache {
    /// Create an unpopulated cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enumerate and cache every device. No-op once populated, even when
    /// the first enumeration found nothing.
    pub fn ensure_populated(&mut self) {
        if self.populated {
            return;
        }
        match all_devices() {
            Ok(devices) => {
                self.descriptors = devices.iter().map(describe).collect();
                self.devices = devices;
            }
            Err(e) => {
                debug!("OpenCL enumeration failed: {e}");
            }
        }
        self.populated = true;
    }

    /// Whether enumeration has run.
    pub fn is_populated(&self) -> bool {
        self.populated
    }

    /// Number of cached devices.
    pub fn count(&mut self) -> usize {
        self.ensure_populated();
        self.devices.len()
    }

    /// Raw handle and descriptor for the device at `index`.
    fn device(&mut self, index: usize) -> Result<(&Device, &DeviceDescriptor)> {
        self.ensure_populated();
        let count = self.devices.len();
        match (self.devices.get(index), self.descriptors.get(index)) {
            (Some(device), Some(desc)) => Ok((device, desc)),
            _ => Err(StreamError::InvalidDeviceIndex { index, count }),
        }
    }
}

/// [`DeviceEnumerator`] backed by live OpenCL platform enumeration, for
/// seeding a [`crate::registry::DeviceRegistry`] with real hardware. The
/// registry caches the result, so this enumerates at most once per
/// registry.
pub struct OclEnumerator;

impl DeviceEnumerator for OclEnumerator {
    fn enumerate(&self) -> Vec<DeviceDescriptor> {
        match all_devices() {
            Ok(devices) => devices.iter().map(describe).collect(),
            Err(e) => {
                debug!("OpenCL enumeration failed: {e}");
                Vec::new()
            }
        }
    }
}

/// Device-resident stream bound to one device and one element type.
///
/// Field order is drop order: kernels and buffers release before the
/// queue, the context last.
pub struct OclStream<T: Element> {
    array_size: usize,
    copy_kernel: Kernel,
    mul_kernel: Kernel,
    add_kernel: Kernel,
    triad_kernel: Kernel,
    dot_kernel: Kernel,
    d_a: Buffer<T>,
    d_b: Buffer<T>,
    d_c: Buffer<T>,
    d_sum: Buffer<T>,
    partial_sums: Vec<T>,
    queue: CommandQueue,
    _context: Context,
}

impl<T: Element> OclStream<T> {
    /// Select the device at `device_index` from the cached enumeration,
    /// build the kernel program for `T`, validate memory limits, and
    /// allocate the buffer set.
    ///
    /// Populates `cache` first if no query has done so yet; fails with
    /// `InvalidDeviceIndex` when the index is outside the cached list.
    pub fn new(
        cache: &mut OclDeviceCache,
        array_size: usize,
        device_index: usize,
    ) -> Result<Self> {
        let (device, desc) = cache.device(device_index)?;
        let desc = desc.clone();

        println!("Using OpenCL device {}", desc.name);
        println!("Driver: {}", desc.driver_version);

        let context = Context::from_device(device).map_err(|e| cl_err("context creation", e))?;
        let queue = CommandQueue::create_default_with_properties(&context, 0, 0)
            .map_err(|e| cl_err("command queue creation", e))?;

        validate_precision::<T>(&desc)?;

        let options = build_options(T::CL_TYPE_NAME);
        let program = match Program::create_and_build_from_source(
            &context,
            STREAM_KERNELS_SOURCE,
            &options,
        ) {
            Ok(program) => program,
            Err(e) => {
                // Surface the compiler's diagnostics before failing.
                let log = e.to_string();
                eprintln!("{log}");
                return Err(StreamError::KernelBuildFailure { log });
            }
        };

        let copy_kernel = create_kernel(&program, "copy")?;
        let mul_kernel = create_kernel(&program, "mul")?;
        let add_kernel = create_kernel(&program, "add")?;
        let triad_kernel = create_kernel(&program, "triad")?;
        let dot_kernel = create_kernel(&program, "stream_dot")?;

        validate_alignment(array_size)?;
        validate_buffer_fit::<T>(&desc, array_size)?;

        let d_a = create_buffer::<T>(&context, CL_MEM_READ_WRITE, array_size, "a")?;
        let d_b = create_buffer::<T>(&context, CL_MEM_READ_WRITE, array_size, "b")?;
        let d_c = create_buffer::<T>(&context, CL_MEM_READ_WRITE, array_size, "c")?;
        let groups = array_size / GROUP_SIZE;
        let d_sum = create_buffer::<T>(&context, CL_MEM_WRITE_ONLY, groups, "sum")?;

        Ok(Self {
            array_size,
            copy_kernel,
            mul_kernel,
            add_kernel,
            triad_kernel,
            dot_kernel,
            d_a,
            d_b,
            d_c,
            d_sum,
            partial_sums: vec![T::zero(); groups],
            queue,
            _context: context,
        })
    }

    /// Element count of the primary arrays.
    pub fn array_size(&self) -> usize {
        self.array_size
    }

    /// Enqueue `kernel` over the full 1-D range and drain the queue.
    fn run_elementwise(&self, kernel: &Kernel, args: &[&Buffer<T>]) -> Result<()> {
        unsafe {
            let mut exec = ExecuteKernel::new(kernel);
            for buffer in args {
                exec.set_arg(&buffer.get());
            }
            exec.set_global_work_sizes(&[self.array_size])
                .enqueue_nd_range(&self.queue)
                .map_err(|e| cl_err("kernel enqueue", e))?;
        }
        self.queue.finish().map_err(|e| cl_err("queue finish", e))
    }
}

fn create_kernel(program: &Program, name: &str) -> Result<Kernel> {
    Kernel::create(program, name).map_err(|e| cl_err(&format!("kernel '{name}' create"), e))
}

fn create_buffer<T>(
    context: &Context,
    flags: opencl3::memory::cl_mem_flags,
    len: usize,
    name: &str,
) -> Result<Buffer<T>> {
    unsafe {
        Buffer::<T>::create(context, flags, len, ptr::null_mut())
            .map_err(|e| cl_err(&format!("buffer '{name}' create"), e))
    }
}

impl<T: Element> StreamOps<T> for OclStream<T> {
    fn copy(&mut self) -> Result<()> {
        let kernel = &self.copy_kernel;
        self.run_elementwise(kernel, &[&self.d_a, &self.d_c])
    }

    fn mul(&mut self) -> Result<()> {
        let kernel = &self.mul_kernel;
        self.run_elementwise(kernel, &[&self.d_b, &self.d_c])
    }

    fn add(&mut self) -> Result<()> {
        let kernel = &self.add_kernel;
        self.run_elementwise(kernel, &[&self.d_a, &self.d_b, &self.d_c])
    }

    fn triad(&mut self) -> Result<()> {
        let kernel = &self.triad_kernel;
        self.run_elementwise(kernel, &[&self.d_a, &self.d_b, &self.d_c])
    }

    fn dot(&mut self) -> Result<T> {
        unsafe {
            ExecuteKernel::new(&self.dot_kernel)
                .set_arg(&self.d_a.get())
                .set_arg(&self.d_b.get())
                .set_arg(&self.d_sum.get())
                .set_arg_local_buffer(GROUP_SIZE * std::mem::size_of::<T>())
                .set_global_work_sizes(&[self.array_size])
                .set_local_work_sizes(&[GROUP_SIZE])
                .enqueue_nd_range(&self.queue)
                .map_err(|e| cl_err("stream_dot enqueue", e))?;
        }
        self.queue.finish().map_err(|e| cl_err("queue finish", e))?;

        unsafe {
            self.queue
                .enqueue_read_buffer(&self.d_sum, CL_BLOCKING, 0, &mut self.partial_sums, &[])
                .map_err(|e| cl_err("sum read", e))?;
        }

        let mut sum = T::zero();
        for &partial in &self.partial_sums {
            sum += partial;
        }
        Ok(sum)
    }

    fn write_arrays(&mut self, a: &[T], b: &[T], c: &[T]) -> Result<()> {
        unsafe {
            self.queue
                .enqueue_write_buffer(&mut self.d_a, CL_BLOCKING, 0, a, &[])
                .map_err(|e| cl_err("write a", e))?;
            self.queue
                .enqueue_write_buffer(&mut self.d_b, CL_BLOCKING, 0, b, &[])
                .map_err(|e| cl_err("write b", e))?;
            self.queue
                .enqueue_write_buffer(&mut self.d_c, CL_BLOCKING, 0, c, &[])
                .map_err(|e| cl_err("write c", e))?;
        }
        Ok(())
    }

    fn read_arrays(&mut self, a: &mut [T], b: &mut [T], c: &mut [T]) -> Result<()> {
        unsafe {
            self.queue
                .enqueue_read_buffer(&self.d_a, CL_BLOCKING, 0, a, &[])
                .map_err(|e| cl_err("read a", e))?;
            self.queue
                .enqueue_read_buffer(&self.d_b, CL_BLOCKING, 0, b, &[])
                .map_err(|e| cl_err("read b", e))?;
            self.queue
                .enqueue_read_buffer(&self.d_c, CL_BLOCKING, 0, c, &[])
                .map_err(|e| cl_err("read c", e))?;
        }
        Ok(())
    }
}
