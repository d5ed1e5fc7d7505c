//! GPU kernel execution runtime.
//!
//! This crate is the layer between a kernel-source generator and the GPU: it
//! turns opaque kernel text and a set of device buffers into an executed,
//! optionally timed, on-device computation, using `wgpu` as the hardware
//! abstraction layer.
//!
//! # Architecture
//!
//! Four components, leaves first:
//! 1. **Device context** - adapter selection, logical device, one in-order
//!    queue with profiling
//! 2. **Buffers** - linear storage, or image-backed textures for
//!    reduced-precision storage
//! 3. **Programs** - WGSL or SPIR-V built once into a compute pipeline with
//!    a resolved entry point
//! 4. **Launch** - per-dispatch argument binding, submission, and device
//!    timing
//!
//! # Example
//!
//! ```no_run
//! use tephra_runtime::{
//!     Arg, CompiledProgram, DeviceBuffer, DeviceContext, Dispatch, ElementType,
//!     ProgramSource, RuntimeConfig, StorageType,
//! };
//!
//! #[pollster::main]
//! async fn main() -> anyhow::Result<()> {
//!     let ctx = DeviceContext::new(RuntimeConfig::from_env()).await?;
//!
//!     let input = DeviceBuffer::allocate(&ctx, 1024, StorageType::Linear(ElementType::F32))?;
//!     let output = DeviceBuffer::allocate(&ctx, 1024, StorageType::Linear(ElementType::F32))?;
//!     let ramp: Vec<f32> = (0..1024).map(|i| i as f32).collect();
//!     input.copy_in(&ctx, &ramp)?;
//!
//!     let kernel = std::fs::read_to_string("copy.wgsl")?;
//!     let program = CompiledProgram::compile(&ctx, "copy", ProgramSource::Wgsl(kernel), None)?;
//!
//!     let elapsed = program.launch(
//!         &ctx,
//!         Dispatch {
//!             global: [1024, 1, 1],
//!             local: [64, 1, 1],
//!             args: vec![Arg::Buffer(&input), Arg::Buffer(&output)],
//!             wait: true,
//!         },
//!     )?;
//!     println!("kernel took {:?} s", elapsed);
//!
//!     let mut result = vec![0.0f32; 1024];
//!     output.copy_out(&ctx, &mut result)?;
//!     Ok(())
//! }
//! ```

mod buffer;
mod config;
mod device;
mod diagnostics;
mod error;
mod language;
mod launch;
mod program;

// Public exports
pub use buffer::{DeviceBuffer, ElementType, ImageChannel, StorageType};
pub use config::{RuntimeConfig, TimingCalibration};
pub use device::DeviceContext;
pub use diagnostics::{DiagnosticSink, NoopDiagnostics, StderrDiagnostics};
pub use error::{Result, RuntimeError};
pub use language::KernelLanguage;
pub use launch::{Arg, Dispatch, ScalarType, ScalarValue};
pub use program::{CompiledProgram, ProgramSource};
