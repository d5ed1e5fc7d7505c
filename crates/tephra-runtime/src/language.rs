//! Syntax-token descriptor consumed by kernel-source generators.
//!
//! The runtime itself treats kernel source as opaque text; this descriptor
//! exists so a generator targeting this runtime can be configured with the
//! right qualifiers, barrier statement, and index accessors without hardcoding
//! them. Nothing else in this crate reads it.

/// The syntax tokens a code generator needs to emit kernels for one target
/// shading language.
#[derive(Debug, Clone)]
pub struct KernelLanguage {
    /// Attribute(s) marking a function as a compute entry point.
    pub kernel_prefix: &'static str,

    /// Qualifier for a device-buffer binding.
    pub buffer_prefix: &'static str,

    /// Qualifier for workgroup-shared memory.
    pub smem_prefix: &'static str,

    /// Directive required before half-precision types may be used, if any.
    pub half_prekernel: Option<&'static str>,

    /// Workgroup execution barrier statement.
    pub barrier: &'static str,

    /// Four-wide float vector literal prefix.
    pub float4: &'static str,

    /// Per-axis global invocation index expressions.
    pub gid: [String; 3],

    /// Per-axis local invocation index expressions.
    pub lid: [String; 3],
}

impl KernelLanguage {
    /// Tokens for WGSL compute kernels, assuming the entry point declares
    /// `@builtin(global_invocation_id) gid` and
    /// `@builtin(local_invocation_id) lid`.
    pub fn wgsl() -> Self {
        let axes = ["x", "y", "z"];
        Self {
            kernel_prefix: "@compute",
            buffer_prefix: "var<storage, read_write>",
            smem_prefix: "var<workgroup>",
            half_prekernel: Some("enable f16;"),
            barrier: "workgroupBarrier();",
            float4: "vec4<f32>",
            gid: axes.map(|a| format!("gid.{a}")),
            lid: axes.map(|a| format!("lid.{a}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wgsl_tokens() {
        let lang = KernelLanguage::wgsl();
        assert_eq!(lang.kernel_prefix, "@compute");
        assert_eq!(lang.gid[0], "gid.x");
        assert_eq!(lang.lid[2], "lid.z");
        assert!(lang.barrier.ends_with(';'));
    }
}
