//! Device memory: linear buffers and image-backed storage.
//!
//! A [`DeviceBuffer`] owns one region of device memory holding `size`
//! elements of a [`StorageType`]. Linear buffers are byte-addressable and
//! support explicit host transfer in both directions. Image-backed buffers
//! store elements in an RGBA texture for compact reduced-precision access and
//! can only be populated by kernels, never by host transfer.

use crate::device::DeviceContext;
use crate::error::{Result, RuntimeError};
use bytemuck::Pod;

/// Element types for linear device buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    F32,
    F16,
    I32,
    I64,
    U32,
    U8,
}

impl ElementType {
    /// Size of one element in bytes.
    pub fn byte_width(&self) -> usize {
        match self {
            ElementType::F32 | ElementType::I32 | ElementType::U32 => 4,
            ElementType::F16 => 2,
            ElementType::I64 => 8,
            ElementType::U8 => 1,
        }
    }
}

/// Channel type for image-backed storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageChannel {
    /// 2-byte half-float channels.
    Half,
    /// 4-byte full-float channels.
    Float,
}

impl ImageChannel {
    /// Size of one channel in bytes.
    pub fn byte_width(&self) -> usize {
        match self {
            ImageChannel::Half => 2,
            ImageChannel::Float => 4,
        }
    }

    fn texture_format(&self) -> wgpu::TextureFormat {
        match self {
            ImageChannel::Half => wgpu::TextureFormat::Rgba16Float,
            ImageChannel::Float => wgpu::TextureFormat::Rgba32Float,
        }
    }
}

/// Backing representation declared for a buffer's elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageType {
    /// Contiguous byte-addressable layout.
    Linear(ElementType),

    /// RGBA texture of extent (cols, rows). The element count must equal
    /// `rows * cols`; the true allocation footprint includes row-pitch
    /// padding owned by the device, so `size * byte_width` is a logical
    /// length only.
    Image {
        channel: ImageChannel,
        rows: usize,
        cols: usize,
    },
}

impl StorageType {
    /// Image storage with the channel precision the context prefers.
    pub fn image_for(ctx: &DeviceContext, rows: usize, cols: usize) -> Self {
        let channel = if ctx.prefer_half() {
            ImageChannel::Half
        } else {
            ImageChannel::Float
        };
        StorageType::Image {
            channel,
            rows,
            cols,
        }
    }

    /// Logical size of one element in bytes.
    pub fn byte_width(&self) -> usize {
        match self {
            StorageType::Linear(el) => el.byte_width(),
            StorageType::Image { channel, .. } => channel.byte_width(),
        }
    }

    /// Whether this type is image-backed.
    pub fn is_image(&self) -> bool {
        matches!(self, StorageType::Image { .. })
    }

    /// Validate an element count against this type's declared shape.
    ///
    /// Runs before any device allocation so a shape mismatch never touches
    /// the device.
    pub(crate) fn check_size(&self, size: usize) -> Result<()> {
        if let StorageType::Image { rows, cols, .. } = self {
            if size != rows * cols {
                return Err(RuntimeError::Unsupported(format!(
                    "image size mismatch: {size} elements != {rows}x{cols} shape"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
enum Storage {
    Linear(wgpu::Buffer),
    Image {
        // Texture kept alive for the view's lifetime.
        #[allow(dead_code)]
        texture: wgpu::Texture,
        view: wgpu::TextureView,
    },
}

/// An owned region of device memory holding `size` elements.
#[derive(Debug)]
pub struct DeviceBuffer {
    storage: Storage,
    size: usize,
    ty: StorageType,
}

impl DeviceBuffer {
    /// Allocate a buffer of `size` elements of the given type.
    ///
    /// Image types are validated (`size == rows * cols`) before allocation;
    /// linear types allocate `size * byte_width` bytes with read/write
    /// storage access.
    ///
    /// # Errors
    /// [`RuntimeError::Unsupported`] on an image shape mismatch; native
    /// allocation failures propagate from the device.
    pub fn allocate(ctx: &DeviceContext, size: usize, ty: StorageType) -> Result<Self> {
        ty.check_size(size)?;

        let storage = match &ty {
            StorageType::Image {
                channel,
                rows,
                cols,
            } => {
                let texture = ctx.device().create_texture(&wgpu::TextureDescriptor {
                    label: Some("tephra image buffer"),
                    size: wgpu::Extent3d {
                        width: *cols as u32,
                        height: *rows as u32,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: channel.texture_format(),
                    usage: wgpu::TextureUsages::TEXTURE_BINDING
                        | wgpu::TextureUsages::STORAGE_BINDING,
                    view_formats: &[],
                });
                let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
                Storage::Image { texture, view }
            }
            StorageType::Linear(_) => {
                let buffer = ctx.device().create_buffer(&wgpu::BufferDescriptor {
                    label: Some("tephra buffer"),
                    size: aligned_len(size * ty.byte_width()),
                    usage: wgpu::BufferUsages::STORAGE
                        | wgpu::BufferUsages::COPY_SRC
                        | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                Storage::Linear(buffer)
            }
        };

        Ok(Self { storage, size, ty })
    }

    /// Number of elements in the buffer.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The declared storage type.
    pub fn storage_type(&self) -> &StorageType {
        &self.ty
    }

    /// Logical length in bytes (`size * byte_width`). For image-backed
    /// buffers the true footprint differs because of row-pitch padding.
    pub fn byte_len(&self) -> usize {
        self.size * self.ty.byte_width()
    }

    /// Enqueue a non-blocking host-to-device transfer.
    ///
    /// Returns before the transfer necessarily completes; the queue is
    /// in-order but the host is not synchronized to it, so completion is only
    /// observable at the next blocking point ([`copy_out`](Self::copy_out) or
    /// a waited launch).
    ///
    /// # Errors
    /// [`RuntimeError::Unsupported`] for image-backed buffers or a host slice
    /// whose byte length differs from the buffer's.
    pub fn copy_in<T: Pod>(&self, ctx: &DeviceContext, data: &[T]) -> Result<()> {
        let buffer = self.linear_backing("copy into")?;
        let bytes: &[u8] = bytemuck::cast_slice(data);
        self.check_host_len(bytes.len())?;

        ctx.queue().write_buffer(buffer, 0, bytes);
        Ok(())
    }

    /// Blocking device-to-host transfer.
    ///
    /// Blocks until the transfer (and, because the queue is in-order, every
    /// previously enqueued command) has completed.
    ///
    /// # Errors
    /// [`RuntimeError::Unsupported`] for image-backed buffers or a host slice
    /// whose byte length differs from the buffer's; mapping failures
    /// propagate from the device.
    pub fn copy_out<T: Pod>(&self, ctx: &DeviceContext, out: &mut [T]) -> Result<()> {
        let buffer = self.linear_backing("copy out of")?;
        let out_bytes: &mut [u8] = bytemuck::cast_slice_mut(out);
        self.check_host_len(out_bytes.len())?;

        let alloc_len = aligned_len(self.byte_len());
        let staging = ctx.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("tephra readback staging"),
            size: alloc_len,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = ctx
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("tephra readback"),
            });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, alloc_len);
        ctx.queue().submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        ctx.drain()?;

        receiver
            .recv()
            .map_err(|e| RuntimeError::Execution(format!("readback channel closed: {e}")))??;

        let mapped = slice.get_mapped_range();
        out_bytes.copy_from_slice(&mapped[..out_bytes.len()]);
        drop(mapped);
        staging.unmap();

        Ok(())
    }

    /// Resolve this buffer to the binding resource a dispatch will see.
    pub(crate) fn binding_resource(&self) -> wgpu::BindingResource<'_> {
        match &self.storage {
            Storage::Linear(buffer) => buffer.as_entire_binding(),
            Storage::Image { view, .. } => wgpu::BindingResource::TextureView(view),
        }
    }

    fn linear_backing(&self, verb: &str) -> Result<&wgpu::Buffer> {
        match &self.storage {
            Storage::Linear(buffer) => Ok(buffer),
            Storage::Image { .. } => Err(RuntimeError::Unsupported(format!(
                "can't {verb} an image-backed buffer"
            ))),
        }
    }

    fn check_host_len(&self, host_bytes: usize) -> Result<()> {
        if host_bytes != self.byte_len() {
            return Err(RuntimeError::Unsupported(format!(
                "host slice is {host_bytes} bytes, buffer holds {}",
                self.byte_len()
            )));
        }
        Ok(())
    }
}

/// Buffer allocations are rounded up to wgpu's 4-byte minimum granularity.
fn aligned_len(bytes: usize) -> u64 {
    (((bytes + 3) & !3).max(4)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_byte_widths() {
        assert_eq!(ElementType::F32.byte_width(), 4);
        assert_eq!(ElementType::F16.byte_width(), 2);
        assert_eq!(ElementType::I64.byte_width(), 8);
        assert_eq!(ElementType::U8.byte_width(), 1);
    }

    #[test]
    fn test_image_shape_mismatch_rejected_before_allocation() {
        let ty = StorageType::Image {
            channel: ImageChannel::Float,
            rows: 4,
            cols: 8,
        };
        // 31 != 4 * 8
        let err = ty.check_size(31).unwrap_err();
        assert!(matches!(err, RuntimeError::Unsupported(_)));
        assert!(ty.check_size(32).is_ok());
    }

    #[test]
    fn test_linear_accepts_any_size() {
        let ty = StorageType::Linear(ElementType::F32);
        assert!(ty.check_size(0).is_ok());
        assert!(ty.check_size(1023).is_ok());
    }

    #[test]
    fn test_aligned_len() {
        assert_eq!(aligned_len(0), 4);
        assert_eq!(aligned_len(3), 4);
        assert_eq!(aligned_len(4), 4);
        assert_eq!(aligned_len(6), 8);
        assert_eq!(aligned_len(4096), 4096);
    }
}
