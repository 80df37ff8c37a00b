//! Render System Abstraction
//!
//! The compute HLMS and texture buffers never talk to a graphics API
//! directly. They go through [`RenderSystem`], which provides:
//!
//! - **Capabilities**: supported shader profiles, compute targets, whether typed
//!   buffer views are native, and extension flags exported to templates
//! - **Program compilation** of fully expanded shader source
//! - **Lifetime hooks** called when a compute pipeline is created or destroyed
//!   and when a program is dropped
//! - **Bind primitives** for every shader stage, plus `set_compute_pso` and
//!   `dispatch`
//!
//! Two implementations ship with the crate:
//!
//! | Type | Use case |
//! |------|----------|
//! | [`RecordingRenderSystem`] | Headless; records every call as a [`RenderCommand`] |
//! | [`WgpuRenderSystem`]      | GPU backend built on `wgpu` (feature `backend_wgpu`) |

mod recording;
#[cfg(feature = "backend_wgpu")]
mod wgpu_backend;

pub use recording::{RecordingRenderSystem, RenderCommand};
#[cfg(feature = "backend_wgpu")]
pub use wgpu_backend::WgpuRenderSystem;

use bitflags::bitflags;
use slotmap::new_key_type;

use crate::errors::Result;
use crate::settings::{BEST_D3D_COMPUTE_TARGETS, ShaderProfile};
use crate::utils::IdString;

new_key_type! {
    /// A linear GPU buffer owned by the render system.
    pub struct BufferHandle;
    /// A texture owned by the render system.
    pub struct TextureHandle;
    /// A sampler state owned by the render system.
    pub struct SamplerHandle;
    /// A compiled GPU program.
    pub struct ProgramId;
    /// A render-system side compute pipeline.
    pub struct PsoId;
}

/// Programmable shader stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Pixel,
    Geometry,
    Hull,
    Domain,
    Compute,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 6] = [
        ShaderStage::Vertex,
        ShaderStage::Pixel,
        ShaderStage::Geometry,
        ShaderStage::Hull,
        ShaderStage::Domain,
        ShaderStage::Compute,
    ];
}

bitflags! {
    /// Access a compute shader is granted on a read/write resource.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceAccess: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
    }
}

/// Texel formats usable by texture buffers and read/write textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    R8Unorm,
    Rgba8Unorm,
    R16Float,
    Rgba16Float,
    R32Uint,
    Rg32Uint,
    Rgba32Uint,
    R32Float,
    Rg32Float,
    #[default]
    Rgba32Float,
}

impl PixelFormat {
    #[inline]
    #[must_use]
    pub fn bytes_per_texel(self) -> u32 {
        match self {
            Self::R8Unorm => 1,
            Self::R16Float => 2,
            Self::Rgba8Unorm | Self::R32Uint | Self::R32Float => 4,
            Self::Rgba16Float | Self::Rg32Uint | Self::Rg32Float => 8,
            Self::Rgba32Uint | Self::Rgba32Float => 16,
        }
    }
}

/// Size of a texture as exported to templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mipmaps: u32,
}

impl TextureInfo {
    #[must_use]
    pub fn new_2d(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: 1,
            mipmaps: 1,
        }
    }
}

/// A byte range of a linear buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferRange {
    pub buffer: BufferHandle,
    pub offset: u64,
    pub size: u64,
}

/// Repacking of a buffer range into the 2D image emulating a texture buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EmulatedUpload {
    pub source: BufferRange,
    pub texture: TextureHandle,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// Bytes per row in the source buffer.
    pub bytes_per_row: u32,
    /// Unpack row alignment, 1 or 4.
    pub row_alignment: u32,
}

impl EmulatedUpload {
    /// Texels covered by `source`.
    #[must_use]
    pub fn texel_count(&self) -> u64 {
        self.source.size / u64::from(self.format.bytes_per_texel())
    }

    /// Rows the source range fills completely.
    #[must_use]
    pub fn full_rows(&self) -> u32 {
        (self.texel_count() / u64::from(self.width.max(1))) as u32
    }

    /// Texels of the trailing partial row; 0 when the range ends on a row boundary.
    #[must_use]
    pub fn last_row_texels(&self) -> u32 {
        (self.texel_count() % u64::from(self.width.max(1))) as u32
    }
}

/// A texture bound for read/write access from a compute shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UavTextureBinding {
    pub texture: TextureHandle,
    pub access: ResourceAccess,
    pub mip_level: u32,
    pub array_index: u32,
    /// View format; `None` uses the texture's own format.
    pub format: Option<PixelFormat>,
}

/// Description of a program to compile.
#[derive(Debug, Clone, Copy)]
pub struct ProgramDesc<'a> {
    /// Debug name, usually the template file name.
    pub name: &'a str,
    pub source: &'a str,
    pub profile: ShaderProfile,
    /// Compile target, e.g. `cs_5_0`, when the profile needs one.
    pub target: Option<&'a str>,
    pub entry_point: &'a str,
}

/// What a render system can do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSystemCapabilities {
    pub name: String,
    pub shader_profiles: Vec<ShaderProfile>,
    /// Compute targets accepted for HLSL, in no particular order.
    pub compute_targets: Vec<String>,
    /// Typed buffer views are supported natively; otherwise texture buffers
    /// fall back to image emulation.
    pub native_tex_buffers: bool,
    /// Extension flags exported to templates as properties set to 1.
    pub extensions: Vec<IdString>,
}

impl Default for RenderSystemCapabilities {
    fn default() -> Self {
        Self {
            name: "headless".to_string(),
            shader_profiles: vec![ShaderProfile::Wgsl],
            compute_targets: Vec::new(),
            native_tex_buffers: true,
            extensions: Vec::new(),
        }
    }
}

impl RenderSystemCapabilities {
    #[inline]
    #[must_use]
    pub fn supports_profile(&self, profile: ShaderProfile) -> bool {
        self.shader_profiles.contains(&profile)
    }

    /// Picks the shader profile templates are written for.
    ///
    /// Walks [`ShaderProfile::DETECTION_ORDER`]; the last supported entry wins.
    /// Returns `None` when no known profile is supported.
    #[must_use]
    pub fn detect_profile(&self) -> Option<ShaderProfile> {
        ShaderProfile::DETECTION_ORDER
            .into_iter()
            .rev()
            .find(|p| self.supports_profile(*p))
    }

    /// Best supported D3D compute target, if any.
    #[must_use]
    pub fn best_compute_target(&self) -> Option<&'static str> {
        BEST_D3D_COMPUTE_TARGETS
            .into_iter()
            .find(|target| self.compute_targets.iter().any(|t| t == target))
    }
}

/// A graphics backend as seen by the compute HLMS.
///
/// All calls happen on the thread owning the graphics context.
pub trait RenderSystem {
    fn capabilities(&self) -> &RenderSystemCapabilities;

    /// Compiles fully expanded source into a program.
    fn compile_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramId>;

    /// Called once for every new compute pipeline.
    ///
    /// `program` is `None` when template expansion failed or the template
    /// disabled the stage.
    fn compute_pso_created(
        &mut self,
        program: Option<ProgramId>,
        threads_per_group: [u32; 3],
    ) -> Result<PsoId>;

    /// Called once when a compute pipeline is discarded.
    fn compute_pso_destroyed(&mut self, pso: PsoId);

    /// Called once when a program leaves the dedup cache. Pipelines built
    /// from it have already been destroyed.
    fn program_destroyed(&mut self, program: ProgramId);

    /// Size and mip count of a texture, if it is alive.
    fn texture_info(&self, texture: TextureHandle) -> Option<TextureInfo>;

    fn bind_const_buffer(&mut self, slot: u32, buffer: BufferHandle) -> Result<()>;

    /// Binds a typed view of `range` natively.
    fn bind_tex_buffer(
        &mut self,
        stage: ShaderStage,
        slot: u32,
        range: BufferRange,
        format: PixelFormat,
    ) -> Result<()>;

    /// Creates the image backing an emulated texture buffer.
    fn create_emulation_texture(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<TextureHandle>;

    /// Repacks a buffer range into its emulation image.
    fn upload_emulated_tex_buffer(&mut self, upload: &EmulatedUpload) -> Result<()>;

    fn bind_texture(&mut self, stage: ShaderStage, slot: u32, texture: TextureHandle)
    -> Result<()>;

    fn bind_sampler(&mut self, stage: ShaderStage, slot: u32, sampler: SamplerHandle)
    -> Result<()>;

    fn bind_uav_buffer(&mut self, slot: u32, range: BufferRange, access: ResourceAccess)
    -> Result<()>;

    fn bind_uav_texture(&mut self, slot: u32, binding: &UavTextureBinding) -> Result<()>;

    fn set_compute_pso(&mut self, pso: PsoId) -> Result<()>;

    fn dispatch(&mut self, num_thread_groups: [u32; 3]) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_supported_profile_wins() {
        let caps = RenderSystemCapabilities {
            shader_profiles: vec![ShaderProfile::Glsl, ShaderProfile::Hlsl],
            ..Default::default()
        };
        assert_eq!(caps.detect_profile(), Some(ShaderProfile::Glsl));

        let none = RenderSystemCapabilities {
            shader_profiles: Vec::new(),
            ..Default::default()
        };
        assert_eq!(none.detect_profile(), None);
    }

    #[test]
    fn best_compute_target_prefers_newest() {
        let caps = RenderSystemCapabilities {
            shader_profiles: vec![ShaderProfile::Hlsl],
            compute_targets: vec!["cs_4_0".into(), "cs_5_0".into()],
            ..Default::default()
        };
        assert_eq!(caps.best_compute_target(), Some("cs_5_0"));
        assert_eq!(RenderSystemCapabilities::default().best_compute_target(), None);
    }

    #[test]
    fn texel_sizes() {
        assert_eq!(PixelFormat::R8Unorm.bytes_per_texel(), 1);
        assert_eq!(PixelFormat::Rg32Float.bytes_per_texel(), 8);
        assert_eq!(PixelFormat::Rgba32Float.bytes_per_texel(), 16);
    }
}
