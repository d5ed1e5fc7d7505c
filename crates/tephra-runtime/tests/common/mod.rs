//! Common utilities for on-device integration tests.
//!
//! These tests need real hardware (or a software adapter). When no compute
//! device exists at all, each test logs a skip notice and returns early
//! instead of failing.

use tephra_runtime::{DeviceContext, RuntimeConfig};

/// Acquire a device context, or `None` when the host has no adapter.
pub fn test_context() -> Option<DeviceContext> {
    match pollster::block_on(DeviceContext::new(RuntimeConfig::default())) {
        Ok(ctx) => Some(ctx),
        Err(e) => {
            eprintln!("skipping on-device test: {e}");
            None
        }
    }
}

/// Identity kernel: copies `input` to `output` element by element.
pub const COPY_WGSL: &str = r#"
@group(0) @binding(0) var<storage, read> input: array<f32>;
@group(0) @binding(1) var<storage, read_write> output: array<f32>;

@compute @workgroup_size(64)
fn copy(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x < arrayLength(&input)) {
        output[gid.x] = input[gid.x];
    }
}
"#;

/// Ascending ramp `[0.0, 1.0, .., (n-1).0]`.
pub fn ramp(n: usize) -> Vec<f32> {
    (0..n).map(|i| i as f32).collect()
}
