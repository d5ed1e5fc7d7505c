//! Kernel program compilation and entry-point resolution.
//!
//! A [`CompiledProgram`] is built exactly once, at construction, from either
//! WGSL source text or a precompiled SPIR-V blob. The named entry point is
//! resolved from the validated module's entry-point table at build time; a
//! failed build returns an error carrying the submitted program and leaves no
//! usable value behind.

use crate::device::DeviceContext;
use crate::error::{Result, RuntimeError};
use crate::launch::ScalarType;
use std::borrow::Cow;
use tracing::debug;

/// A kernel program as submitted by the code generator.
#[derive(Debug, Clone)]
pub enum ProgramSource {
    /// WGSL source text.
    Wgsl(String),
    /// A precompiled SPIR-V binary (cached or offline-compiled kernels).
    SpirV(Vec<u8>),
}

impl std::fmt::Display for ProgramSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgramSource::Wgsl(_) => f.write_str("WGSL source"),
            ProgramSource::SpirV(_) => f.write_str("SPIR-V binary"),
        }
    }
}

// `RuntimeError::BuildFailure` carries the submitted program in a field named
// `source`; thiserror treats any field so named as the error's source, which
// requires the field's type to implement `std::error::Error`.
impl std::error::Error for ProgramSource {}

/// One compiled compute entry point, ready for dispatch.
#[derive(Debug)]
pub struct CompiledProgram {
    name: String,
    pipeline: wgpu::ComputePipeline,
    local_size: [u32; 3],
    scalar_arg_types: Option<Vec<ScalarType>>,
}

impl CompiledProgram {
    /// Build `source` and resolve the compute entry point called `name`.
    ///
    /// When `scalar_arg_types` is given, the program's non-buffer arguments
    /// are fixed to those native types and every later launch coerces host
    /// scalars accordingly; when absent, scalars bind at their own natural
    /// width.
    ///
    /// # Errors
    /// [`RuntimeError::BuildFailure`] on a parse/validation error or a
    /// missing entry point. The error carries the diagnostic log and the
    /// original source for postmortem inspection.
    pub fn compile(
        ctx: &DeviceContext,
        name: &str,
        source: ProgramSource,
        scalar_arg_types: Option<Vec<ScalarType>>,
    ) -> Result<Self> {
        let (module, local_size) = match build_module(name, &source) {
            Ok(built) => built,
            Err(log) => {
                if ctx.debug() >= 3 {
                    debug!(kernel = name, "failed to build:\n{log}");
                }
                return Err(RuntimeError::BuildFailure {
                    name: name.to_string(),
                    log,
                    source,
                });
            }
        };

        if ctx.debug() >= 5 {
            ctx.diagnostics().dump_program(name, &source);
        }

        let shader = ctx
            .device()
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(name),
                source: wgpu::ShaderSource::Naga(Cow::Owned(module)),
            });

        // Layout is inferred from the shader's own binding declarations.
        let pipeline = ctx
            .device()
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(name),
                layout: None,
                module: &shader,
                entry_point: Some(name),
                compilation_options: Default::default(),
                cache: None,
            });

        debug!(kernel = name, ?local_size, "built compute pipeline");

        Ok(Self {
            name: name.to_string(),
            pipeline,
            local_size,
            scalar_arg_types,
        })
    }

    /// The entry point name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `@workgroup_size` declared by the entry point. Launches must use
    /// a matching local work size.
    pub fn local_size(&self) -> [u32; 3] {
        self.local_size
    }

    /// Largest workgroup the device supports for this program.
    pub fn max_work_group_size(&self, ctx: &DeviceContext) -> u32 {
        ctx.max_work_group_size()
    }

    pub(crate) fn pipeline(&self) -> &wgpu::ComputePipeline {
        &self.pipeline
    }

    pub(crate) fn scalar_arg_types(&self) -> Option<&[ScalarType]> {
        self.scalar_arg_types.as_deref()
    }
}

/// Parse and validate a program, returning the naga module and the resolved
/// entry point's workgroup size.
///
/// Pure front-end work: no device interaction, so build failures surface
/// before anything touches the GPU.
pub(crate) fn build_module(
    name: &str,
    source: &ProgramSource,
) -> std::result::Result<(naga::Module, [u32; 3]), String> {
    let module = match source {
        ProgramSource::Wgsl(text) => {
            naga::front::wgsl::parse_str(text).map_err(|e| e.emit_to_string(text))?
        }
        ProgramSource::SpirV(bytes) => {
            naga::front::spv::parse_u8_slice(bytes, &naga::front::spv::Options::default())
                .map_err(|e| e.to_string())?
        }
    };

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator.validate(&module).map_err(|e| {
        let text = match source {
            ProgramSource::Wgsl(text) => text.as_str(),
            ProgramSource::SpirV(_) => "",
        };
        e.emit_to_string(text)
    })?;

    let entry = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == naga::ShaderStage::Compute && ep.name == name)
        .ok_or_else(|| format!("no compute entry point named '{name}'"))?;
    let local_size = entry.workgroup_size;

    Ok((module, local_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    const COPY_WGSL: &str = r#"
@group(0) @binding(0) var<storage, read> input: array<f32>;
@group(0) @binding(1) var<storage, read_write> output: array<f32>;

@compute @workgroup_size(64)
fn copy(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x < arrayLength(&input)) {
        output[gid.x] = input[gid.x];
    }
}
"#;

    #[test]
    fn test_build_module_resolves_entry_point() {
        let source = ProgramSource::Wgsl(COPY_WGSL.to_string());
        let (_, local_size) = build_module("copy", &source).expect("valid kernel should build");
        assert_eq!(local_size, [64, 1, 1]);
    }

    #[test]
    fn test_malformed_source_fails_with_diagnostics() {
        let source = ProgramSource::Wgsl("fn copy( {".to_string());
        let err = build_module("copy", &source).unwrap_err();
        assert!(!err.is_empty());
    }

    #[test]
    fn test_missing_entry_point_fails() {
        let source = ProgramSource::Wgsl(COPY_WGSL.to_string());
        let err = build_module("not_here", &source).unwrap_err();
        assert!(err.contains("not_here"));
    }

    #[test]
    fn test_garbage_binary_fails() {
        let source = ProgramSource::SpirV(vec![0xde, 0xad, 0xbe, 0xef]);
        assert!(build_module("copy", &source).is_err());
    }
}
