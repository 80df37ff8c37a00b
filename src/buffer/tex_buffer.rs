//! Texture Buffer Views
//!
//! A [`TexBuffer`] exposes a byte range of a linear GPU buffer to shaders as a
//! typed, read-only view. Two strategies exist:
//!
//! - **Native**: the render system binds a typed buffer view directly.
//! - **Emulated**: the buffer is repacked into a 2D image at most
//!   `max_texture_width` texels wide. The image does not alias the buffer, so
//!   the range is uploaded again on every bind.
//!
//! The strategy is chosen once, at creation, from
//! [`RenderSystemCapabilities::native_tex_buffers`](crate::render_system::RenderSystemCapabilities::native_tex_buffers).

use crate::errors::{HlmsError, Result};
use crate::render_system::{
    BufferHandle, BufferRange, EmulatedUpload, PixelFormat, RenderSystem, ShaderStage,
    TextureHandle,
};
use crate::settings::TexBufferSettings;

/// How a [`TexBuffer`] reaches the shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexBufferStrategy {
    Native,
    Emulated {
        texture: TextureHandle,
        width: u32,
        height: u32,
    },
}

/// A typed shader view over a linear buffer.
#[derive(Debug, Clone)]
pub struct TexBuffer {
    buffer: BufferHandle,
    num_elements: u64,
    bytes_per_element: u32,
    format: PixelFormat,
    max_texture_width: u32,
    strategy: TexBufferStrategy,
}

#[inline]
fn div_ceil(value: u64, by: u64) -> u64 {
    value.div_ceil(by.max(1))
}

impl TexBuffer {
    /// Wraps `buffer`, holding `num_elements` elements of `bytes_per_element`
    /// bytes, as a view of texels in `format`.
    pub fn new(
        rs: &mut dyn RenderSystem,
        buffer: BufferHandle,
        num_elements: u64,
        bytes_per_element: u32,
        format: PixelFormat,
        settings: &TexBufferSettings,
    ) -> Result<Self> {
        let max_texture_width = settings.max_texture_width.max(1);
        let strategy = if rs.capabilities().native_tex_buffers {
            TexBufferStrategy::Native
        } else {
            let total_texels =
                num_elements * u64::from(bytes_per_element) / u64::from(format.bytes_per_texel());
            let width = total_texels.min(u64::from(max_texture_width)).max(1) as u32;
            let height = div_ceil(total_texels, u64::from(max_texture_width)).max(1) as u32;
            let texture = rs.create_emulation_texture(width, height, format)?;
            log::debug!(
                "Emulating texture buffer {buffer:?} with a {width}x{height} {format:?} image"
            );
            TexBufferStrategy::Emulated {
                texture,
                width,
                height,
            }
        };

        Ok(Self {
            buffer,
            num_elements,
            bytes_per_element,
            format,
            max_texture_width,
            strategy,
        })
    }

    #[inline]
    #[must_use]
    pub fn buffer(&self) -> BufferHandle {
        self.buffer
    }

    /// Total size of the owning buffer in bytes.
    #[inline]
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.num_elements * u64::from(self.bytes_per_element)
    }

    #[inline]
    #[must_use]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    #[inline]
    #[must_use]
    pub fn strategy(&self) -> TexBufferStrategy {
        self.strategy
    }

    #[inline]
    #[must_use]
    pub fn is_emulated(&self) -> bool {
        matches!(self.strategy, TexBufferStrategy::Emulated { .. })
    }

    /// Resolves `(offset, size_bytes)` into an absolute range.
    ///
    /// `size_bytes == 0` means "from `offset` to the end of the buffer".
    pub fn resolve_range(&self, offset: u64, size_bytes: u64) -> Result<BufferRange> {
        let total = self.size_bytes();
        let out_of_bounds = || HlmsError::BufferRangeOutOfBounds {
            offset,
            size_bytes,
            buffer_size: total,
        };

        if offset >= total {
            return Err(out_of_bounds());
        }
        let size = if size_bytes == 0 {
            total - offset
        } else {
            size_bytes
        };
        if offset.checked_add(size).is_none_or(|end| end > total) {
            return Err(out_of_bounds());
        }

        Ok(BufferRange {
            buffer: self.buffer,
            offset,
            size,
        })
    }

    /// Binds `[offset, offset + size_bytes)` at `slot` of `stage`.
    pub fn bind(
        &self,
        rs: &mut dyn RenderSystem,
        stage: ShaderStage,
        slot: u32,
        offset: u64,
        size_bytes: u64,
    ) -> Result<()> {
        let range = self.resolve_range(offset, size_bytes)?;

        match self.strategy {
            TexBufferStrategy::Native => rs.bind_tex_buffer(stage, slot, range, self.format),
            TexBufferStrategy::Emulated { texture, .. } => {
                let upload = self.emulated_upload(range, texture)?;
                rs.upload_emulated_tex_buffer(&upload)?;
                rs.bind_texture(stage, slot, texture)
            }
        }
    }

    fn emulated_upload(&self, range: BufferRange, texture: TextureHandle) -> Result<EmulatedUpload> {
        let texel_bytes = self.format.bytes_per_texel();
        if range.size % u64::from(texel_bytes) != 0 {
            return Err(HlmsError::MisalignedEmulatedRange {
                size_bytes: range.size,
                texel_bytes,
            });
        }

        let max_width = u64::from(self.max_texture_width);
        let total_texels = self.size_bytes() / u64::from(texel_bytes);
        let modified_texels = range.size / u64::from(texel_bytes);

        let width = modified_texels.min(max_width).min(total_texels) as u32;
        let height = div_ceil(modified_texels, max_width) as u32;
        let row_alignment = if self.bytes_per_element % 4 == 0 { 4 } else { 1 };

        Ok(EmulatedUpload {
            source: range,
            texture,
            format: self.format,
            width,
            height,
            bytes_per_row: width * texel_bytes,
            row_alignment,
        })
    }

    #[inline]
    pub fn bind_vs(&self, rs: &mut dyn RenderSystem, slot: u32, offset: u64, size: u64) -> Result<()> {
        self.bind(rs, ShaderStage::Vertex, slot, offset, size)
    }

    #[inline]
    pub fn bind_ps(&self, rs: &mut dyn RenderSystem, slot: u32, offset: u64, size: u64) -> Result<()> {
        self.bind(rs, ShaderStage::Pixel, slot, offset, size)
    }

    #[inline]
    pub fn bind_gs(&self, rs: &mut dyn RenderSystem, slot: u32, offset: u64, size: u64) -> Result<()> {
        self.bind(rs, ShaderStage::Geometry, slot, offset, size)
    }

    #[inline]
    pub fn bind_hs(&self, rs: &mut dyn RenderSystem, slot: u32, offset: u64, size: u64) -> Result<()> {
        self.bind(rs, ShaderStage::Hull, slot, offset, size)
    }

    #[inline]
    pub fn bind_ds(&self, rs: &mut dyn RenderSystem, slot: u32, offset: u64, size: u64) -> Result<()> {
        self.bind(rs, ShaderStage::Domain, slot, offset, size)
    }

    #[inline]
    pub fn bind_cs(&self, rs: &mut dyn RenderSystem, slot: u32, offset: u64, size: u64) -> Result<()> {
        self.bind(rs, ShaderStage::Compute, slot, offset, size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_system::{RecordingRenderSystem, RenderCommand, RenderSystemCapabilities};

    fn emulating() -> RecordingRenderSystem {
        RecordingRenderSystem::new(RenderSystemCapabilities {
            native_tex_buffers: false,
            ..Default::default()
        })
    }

    #[test]
    fn zero_size_means_rest_of_buffer() {
        let mut rs = RecordingRenderSystem::default();
        let buffer = rs.create_buffer(256);
        let view = TexBuffer::new(
            &mut rs,
            buffer,
            64,
            4,
            PixelFormat::R32Float,
            &TexBufferSettings::default(),
        )
        .unwrap();

        assert_eq!(view.resolve_range(0, 0).unwrap().size, 256);
        assert_eq!(view.resolve_range(64, 0).unwrap().size, 192);
        assert!(view.resolve_range(256, 0).is_err());
        assert!(view.resolve_range(128, 129).is_err());
        assert!(view.resolve_range(u64::MAX - 1, 16).is_err());
    }

    #[test]
    fn emulated_dimensions() {
        let mut rs = emulating();
        let buffer = rs.create_buffer(16 * 5000);
        let settings = TexBufferSettings {
            max_texture_width: 2048,
        };
        let view =
            TexBuffer::new(&mut rs, buffer, 5000, 16, PixelFormat::Rgba32Float, &settings).unwrap();
        assert!(matches!(
            view.strategy(),
            TexBufferStrategy::Emulated {
                width: 2048,
                height: 3,
                ..
            }
        ));

        view.bind_cs(&mut rs, 2, 16 * 10, 16 * 100).unwrap();
        let upload = rs
            .commands()
            .iter()
            .find_map(|c| match c {
                RenderCommand::UploadEmulated(upload) => Some(*upload),
                _ => None,
            })
            .unwrap();
        assert_eq!((upload.width, upload.height), (100, 1));
        assert_eq!(upload.row_alignment, 4);
        assert_eq!(upload.bytes_per_row, 1600);
    }

    #[test]
    fn emulated_rejects_partial_texels() {
        let mut rs = emulating();
        let buffer = rs.create_buffer(64);
        let view = TexBuffer::new(
            &mut rs,
            buffer,
            16,
            4,
            PixelFormat::Rgba32Float,
            &TexBufferSettings::default(),
        )
        .unwrap();
        let err = view.bind_ps(&mut rs, 0, 0, 20).unwrap_err();
        assert!(matches!(
            err,
            HlmsError::MisalignedEmulatedRange {
                size_bytes: 20,
                texel_bytes: 16
            }
        ));
    }

    #[test]
    fn odd_element_size_uses_byte_alignment() {
        let mut rs = emulating();
        let buffer = rs.create_buffer(30);
        let view = TexBuffer::new(
            &mut rs,
            buffer,
            10,
            3,
            PixelFormat::R8Unorm,
            &TexBufferSettings::default(),
        )
        .unwrap();
        view.bind_vs(&mut rs, 0, 0, 0).unwrap();
        assert!(rs.commands().iter().any(|c| matches!(
            c,
            RenderCommand::UploadEmulated(EmulatedUpload {
                row_alignment: 1,
                width: 30,
                height: 1,
                ..
            })
        )));
    }
}
