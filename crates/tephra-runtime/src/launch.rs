//! Kernel dispatch: argument binding, submission, and device timing.
//!
//! Binding convention (the generator's contract): buffer arguments occupy
//! consecutive bindings of `@group(0)` in argument order; scalar arguments
//! are coerced, packed in order into a single uniform struct, and bound at
//! the index after the last buffer.

use crate::buffer::DeviceBuffer;
use crate::device::DeviceContext;
use crate::error::{Result, RuntimeError};
use crate::program::CompiledProgram;
use std::time::Instant;
use tracing::trace;

/// Native scalar types a program can fix its non-buffer arguments to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    I32,
    U32,
    F32,
}

impl ScalarType {
    /// Coerce a host value to this native type's 4-byte encoding.
    ///
    /// Wider host values truncate the way an `as` cast does, so the same
    /// input always produces the same bound bytes.
    pub fn coerce(self, value: ScalarValue) -> [u8; 4] {
        match self {
            ScalarType::I32 => (value.as_i64() as i32).to_le_bytes(),
            ScalarType::U32 => (value.as_u64() as u32).to_le_bytes(),
            ScalarType::F32 => (value.as_f64() as f32).to_le_bytes(),
        }
    }
}

/// A host-side scalar argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarValue {
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl ScalarValue {
    /// The native type this value binds as when the program declares no
    /// fixed signature. Wide host types narrow to the GPU-native width.
    pub fn natural_type(&self) -> ScalarType {
        match self {
            ScalarValue::I32(_) | ScalarValue::I64(_) => ScalarType::I32,
            ScalarValue::U32(_) | ScalarValue::U64(_) => ScalarType::U32,
            ScalarValue::F32(_) | ScalarValue::F64(_) => ScalarType::F32,
        }
    }

    fn as_i64(self) -> i64 {
        match self {
            ScalarValue::I32(v) => v as i64,
            ScalarValue::I64(v) => v,
            ScalarValue::U32(v) => v as i64,
            ScalarValue::U64(v) => v as i64,
            ScalarValue::F32(v) => v as i64,
            ScalarValue::F64(v) => v as i64,
        }
    }

    fn as_u64(self) -> u64 {
        match self {
            ScalarValue::I32(v) => v as u64,
            ScalarValue::I64(v) => v as u64,
            ScalarValue::U32(v) => v as u64,
            ScalarValue::U64(v) => v,
            ScalarValue::F32(v) => v as u64,
            ScalarValue::F64(v) => v as u64,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            ScalarValue::I32(v) => v as f64,
            ScalarValue::I64(v) => v as f64,
            ScalarValue::U32(v) => v as f64,
            ScalarValue::U64(v) => v as f64,
            ScalarValue::F32(v) => v as f64,
            ScalarValue::F64(v) => v,
        }
    }
}

/// One kernel argument: a device buffer or a raw scalar.
pub enum Arg<'a> {
    Buffer(&'a DeviceBuffer),
    Scalar(ScalarValue),
}

/// A transient dispatch descriptor, constructed and consumed per launch.
///
/// `global` is the total invocation count per axis (not a workgroup count);
/// the workgroup count is `ceil(global / local)` per axis. `local` must match
/// the entry point's declared `@workgroup_size`.
pub struct Dispatch<'a> {
    pub global: [usize; 3],
    pub local: [usize; 3],
    pub args: Vec<Arg<'a>>,
    pub wait: bool,
}

impl CompiledProgram {
    /// Enqueue this program with the given work sizes and arguments.
    ///
    /// With `wait` unset, returns `None` immediately: the dispatch is
    /// asynchronous and only the in-order queue orders it against later
    /// commands. With `wait` set, blocks until the queue drains and returns
    /// the elapsed device time in seconds, computed from the dispatch's
    /// profiling timestamps and corrected by the context's timing
    /// calibration.
    ///
    /// # Errors
    /// [`RuntimeError::Unsupported`] when the local size contradicts the
    /// kernel or the scalar count contradicts the declared signature; native
    /// errors propagate unchanged.
    pub fn launch(&self, ctx: &DeviceContext, dispatch: Dispatch<'_>) -> Result<Option<f64>> {
        let local = dispatch.local.map(|v| v as u32);
        if local != self.local_size() {
            return Err(RuntimeError::Unsupported(format!(
                "local size {:?} does not match kernel workgroup size {:?}",
                dispatch.local,
                self.local_size()
            )));
        }
        let invocations: usize = dispatch.local.iter().product();
        if invocations > ctx.max_work_group_size() as usize {
            return Err(RuntimeError::Unsupported(format!(
                "workgroup of {invocations} invocations exceeds device limit {}",
                ctx.max_work_group_size()
            )));
        }

        let mut groups = [0u32; 3];
        for axis in 0..3 {
            groups[axis] = dispatch.global[axis].div_ceil(dispatch.local[axis]) as u32;
        }

        // Split arguments: buffers bind in order, scalars pack into one
        // uniform bound after them.
        let mut buffers = Vec::new();
        let mut scalars = Vec::new();
        for arg in &dispatch.args {
            match arg {
                Arg::Buffer(buf) => buffers.push(*buf),
                Arg::Scalar(v) => scalars.push(*v),
            }
        }
        let packed = self.pack_scalars(&scalars)?;

        let params = if packed.is_empty() {
            None
        } else {
            let buffer = ctx.device().create_buffer(&wgpu::BufferDescriptor {
                label: Some("tephra scalar args"),
                size: ((packed.len() + 15) & !15) as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            ctx.queue().write_buffer(&buffer, 0, &packed);
            Some(buffer)
        };

        let mut entries: Vec<wgpu::BindGroupEntry> = buffers
            .iter()
            .enumerate()
            .map(|(index, buf)| wgpu::BindGroupEntry {
                binding: index as u32,
                resource: buf.binding_resource(),
            })
            .collect();
        if let Some(params) = &params {
            entries.push(wgpu::BindGroupEntry {
                binding: entries.len() as u32,
                resource: params.as_entire_binding(),
            });
        }

        let layout = self.pipeline().get_bind_group_layout(0);
        let bind_group = ctx.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tephra dispatch"),
            layout: &layout,
            entries: &entries,
        });

        let profiled = dispatch.wait && ctx.timestamps_supported();
        let query_set = profiled.then(|| {
            ctx.device().create_query_set(&wgpu::QuerySetDescriptor {
                label: Some("tephra timing"),
                ty: wgpu::QueryType::Timestamp,
                count: 2,
            })
        });

        let mut encoder = ctx
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(self.name()),
            });
        {
            let timestamp_writes =
                query_set
                    .as_ref()
                    .map(|query_set| wgpu::ComputePassTimestampWrites {
                        query_set,
                        beginning_of_pass_write_index: Some(0),
                        end_of_pass_write_index: Some(1),
                    });
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(self.name()),
                timestamp_writes,
            });
            pass.set_pipeline(self.pipeline());
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups[0], groups[1], groups[2]);
        }

        let readback = if let Some(query_set) = &query_set {
            let resolve = ctx.device().create_buffer(&wgpu::BufferDescriptor {
                label: Some("tephra timing resolve"),
                size: 16,
                usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            });
            let staging = ctx.device().create_buffer(&wgpu::BufferDescriptor {
                label: Some("tephra timing readback"),
                size: 16,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            encoder.resolve_query_set(query_set, 0..2, &resolve, 0);
            encoder.copy_buffer_to_buffer(&resolve, 0, &staging, 0, 16);
            Some(staging)
        } else {
            None
        };

        trace!(kernel = self.name(), ?groups, wait = dispatch.wait, "dispatch");
        let started = Instant::now();
        ctx.queue().submit(std::iter::once(encoder.finish()));

        if !dispatch.wait {
            return Ok(None);
        }

        // Device-level fence: the whole queue drains, not just this dispatch.
        match readback {
            Some(staging) => {
                let slice = staging.slice(..);
                let (sender, receiver) = std::sync::mpsc::channel();
                slice.map_async(wgpu::MapMode::Read, move |result| {
                    let _ = sender.send(result);
                });
                ctx.drain()?;
                receiver
                    .recv()
                    .map_err(|e| RuntimeError::Execution(format!("timing channel closed: {e}")))??;

                let data = slice.get_mapped_range();
                let start: u64 = bytemuck::pod_read_unaligned(&data[0..8]);
                let end: u64 = bytemuck::pod_read_unaligned(&data[8..16]);
                drop(data);
                staging.unmap();

                let ticks = end.saturating_sub(start);
                let seconds = ticks as f64 * ctx.timestamp_period() as f64 * 1e-9;
                Ok(Some(ctx.calibration().apply(seconds)))
            }
            None => {
                // No timestamp support on this adapter: host wall clock
                // around the drain, uncalibrated.
                ctx.drain()?;
                Ok(Some(started.elapsed().as_secs_f64()))
            }
        }
    }

    fn pack_scalars(&self, scalars: &[ScalarValue]) -> Result<Vec<u8>> {
        let mut packed = Vec::with_capacity(scalars.len() * 4);
        match self.scalar_arg_types() {
            Some(types) => {
                if types.len() != scalars.len() {
                    return Err(RuntimeError::Unsupported(format!(
                        "kernel '{}' declares {} scalar arguments, got {}",
                        self.name(),
                        types.len(),
                        scalars.len()
                    )));
                }
                for (ty, value) in types.iter().zip(scalars) {
                    packed.extend_from_slice(&ty.coerce(*value));
                }
            }
            None => {
                for value in scalars {
                    packed.extend_from_slice(&value.natural_type().coerce(*value));
                }
            }
        }
        Ok(packed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i32_coercion_truncates_wide_integers() {
        // 2^32 + 42 truncates to 42, same as an `as` cast.
        let wide = ScalarValue::I64(0x1_0000_002A);
        assert_eq!(ScalarType::I32.coerce(wide), 42i32.to_le_bytes());
    }

    #[test]
    fn test_coercion_is_consistent_across_calls() {
        let value = ScalarValue::I64(-7);
        let first = ScalarType::I32.coerce(value);
        let second = ScalarType::I32.coerce(value);
        assert_eq!(first, second);
        assert_eq!(first, (-7i32).to_le_bytes());
    }

    #[test]
    fn test_u32_coercion_wraps() {
        let wide = ScalarValue::U64(u64::MAX);
        assert_eq!(ScalarType::U32.coerce(wide), u32::MAX.to_le_bytes());
    }

    #[test]
    fn test_f32_coercion_narrows() {
        let value = ScalarValue::F64(1.5);
        assert_eq!(ScalarType::F32.coerce(value), 1.5f32.to_le_bytes());
    }

    #[test]
    fn test_natural_types_narrow_to_gpu_width() {
        assert_eq!(ScalarValue::I64(1).natural_type(), ScalarType::I32);
        assert_eq!(ScalarValue::U64(1).natural_type(), ScalarType::U32);
        assert_eq!(ScalarValue::F64(1.0).natural_type(), ScalarType::F32);
        assert_eq!(ScalarValue::F32(1.0).natural_type(), ScalarType::F32);
    }
}
