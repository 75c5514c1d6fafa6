//! Embedded OpenCL C kernel source for the STREAM operations.
//!
//! A single source module defines all five entry points (`copy`, `mul`,
//! `add`, `triad`, `stream_dot`). The element type is left as the `TYPE`
//! macro and substituted at build time via [`build_options`], so the same
//! source serves both the `float` and `double` instantiations.

/// Fixed work-group size for the dot-product reduction.
///
/// Array sizes must be a multiple of this so every work-group reduces a
/// full tile; `stream_dot` writes one partial sum per group.
pub const GROUP_SIZE: usize = 1024;

/// The STREAM scale factor, matching the `scalar` constant in the kernel
/// source below.
pub const SCALAR: f64 = 0.3;

/// OpenCL C source for the five STREAM kernels.
///
/// `stream_dot` performs the device stage of the dot-product reduction:
/// each work-group writes elementwise products into local scratch, then
/// tree-reduces by halving offsets. The barrier sits before each halving
/// step so all adds at one offset complete before the next offset reads
/// them; lane 0 writes the group total to `sum[group_id]`.
pub const STREAM_KERNELS_SOURCE: &str = r#"
constant TYPE scalar = 0.3;

kernel void copy(
    global const TYPE * restrict a,
    global TYPE * restrict c)
{
    const size_t i = get_global_id(0);
    c[i] = a[i];
}

kernel void mul(
    global TYPE * restrict b,
    global const TYPE * restrict c)
{
    const size_t i = get_global_id(0);
    b[i] = scalar * c[i];
}

kernel void add(
    global const TYPE * restrict a,
    global const TYPE * restrict b,
    global TYPE * restrict c)
{
    const size_t i = get_global_id(0);
    c[i] = a[i] + b[i];
}

kernel void triad(
    global TYPE * restrict a,
    global const TYPE * restrict b,
    global const TYPE * restrict c)
{
    const size_t i = get_global_id(0);
    a[i] = b[i] + scalar * c[i];
}

kernel void stream_dot(
    global const TYPE * restrict a,
    global const TYPE * restrict b,
    global TYPE * restrict sum,
    local TYPE * restrict wg_sum)
{
    const size_t i = get_global_id(0);
    const size_t local_i = get_local_id(0);
    wg_sum[local_i] = a[i] * b[i];

    for (int offset = get_local_size(0) / 2; offset > 0; offset /= 2)
    {
        barrier(CLK_LOCAL_MEM_FENCE);
        if (local_i < offset)
        {
            wg_sum[local_i] += wg_sum[local_i + offset];
        }
    }

    if (local_i == 0)
        sum[get_group_id(0)] = wg_sum[local_i];
}
"#;

/// Compiler options substituting the element type into the kernel source.
///
/// `cl_type` is the OpenCL type name (`"float"` or `"double"`), taken from
/// [`crate::stream::Element::CL_TYPE_NAME`].
pub fn build_options(cl_type: &str) -> String {
    format!("-DTYPE={cl_type}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_size_is_power_of_two() {
        // The halving loop in stream_dot requires this.
        assert!(GROUP_SIZE.is_power_of_two());
    }

    #[test]
    fn source_defines_all_entry_points() {
        for name in ["copy", "mul", "add", "triad", "stream_dot"] {
            assert!(
                STREAM_KERNELS_SOURCE.contains(&format!("kernel void {name}(")),
                "missing entry point {name}"
            );
        }
    }

    #[test]
    fn source_leaves_type_as_macro() {
        assert!(STREAM_KERNELS_SOURCE.contains("TYPE"));
        assert!(!STREAM_KERNELS_SOURCE.contains("-DTYPE"));
    }

    #[test]
    fn source_scalar_matches_exported_constant() {
        assert!(STREAM_KERNELS_SOURCE.contains(&format!("scalar = {SCALAR};")));
    }

    #[test]
    fn build_options_for_both_precisions() {
        assert_eq!(build_options("float"), "-DTYPE=float");
        assert_eq!(build_options("double"), "-DTYPE=double");
    }
}
