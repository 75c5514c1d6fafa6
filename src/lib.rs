//! GPU memory-bandwidth micro-benchmark core.
//!
//! Drives the five STREAM kernels (copy, mul, add, triad, dot) over large
//! device-resident arrays so an external driver can time them. The crate
//! covers device enumeration ([`registry`]), the element-typed stream
//! abstraction ([`stream`]), a CPU reference backend ([`host`]), and the
//! OpenCL device backend (`ocl`, behind the `opencl` feature).
//!
//! # Reduction semantics
//!
//! `dot` accumulates in work-group-tree order on the device, then sums the
//! per-group partials sequentially on the host. That order differs from a
//! naive left-to-right sum, so results must be compared with a floating
//! tolerance, never bit-exact. [`host::HostStream`] reproduces the same
//! order and serves as the comparison reference for device runs.
//!
//! # Concurrency
//!
//! One in-order queue per stream; every operation blocks until its work
//! drains, so the caller sees strictly sequential effects. Streams on
//! different devices are independent and may run from separate threads
//! once registry population has completed.

pub mod error;
pub mod host;
pub mod kernels;
pub mod registry;
pub mod stream;

#[cfg(feature = "opencl")]
pub mod ocl;

pub use error::{Result, StreamError};
pub use host::HostStream;
pub use kernels::{GROUP_SIZE, SCALAR};
pub use registry::{DeviceDescriptor, DeviceEnumerator, DeviceRegistry};
pub use stream::{Element, StreamOps};

#[cfg(feature = "opencl")]
pub use ocl::{OclDeviceCache, OclEnumerator, OclStream};
