//! Headless render system.
//!
//! Records every call as a [`RenderCommand`] and tracks which resources and
//! pipelines are alive. Used by tests and by tools that only need the
//! expanded shaders.

use slotmap::SlotMap;

use crate::errors::{HlmsError, Result};
use crate::render_system::{
    BufferHandle, BufferRange, EmulatedUpload, PixelFormat, ProgramDesc, ProgramId, PsoId,
    RenderSystem, RenderSystemCapabilities, ResourceAccess, SamplerHandle, ShaderStage,
    TextureHandle, TextureInfo, UavTextureBinding,
};

/// One recorded render-system call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderCommand {
    CompileProgram {
        id: ProgramId,
        name: String,
    },
    PsoCreated {
        pso: PsoId,
        program: Option<ProgramId>,
        threads_per_group: [u32; 3],
    },
    PsoDestroyed(PsoId),
    ProgramDestroyed(ProgramId),
    BindConstBuffer {
        slot: u32,
        buffer: BufferHandle,
    },
    BindTexBuffer {
        stage: ShaderStage,
        slot: u32,
        range: BufferRange,
        format: PixelFormat,
    },
    CreateEmulationTexture {
        texture: TextureHandle,
        width: u32,
        height: u32,
        format: PixelFormat,
    },
    UploadEmulated(EmulatedUpload),
    BindTexture {
        stage: ShaderStage,
        slot: u32,
        texture: TextureHandle,
    },
    BindSampler {
        stage: ShaderStage,
        slot: u32,
        sampler: SamplerHandle,
    },
    BindUavBuffer {
        slot: u32,
        range: BufferRange,
        access: ResourceAccess,
    },
    BindUavTexture {
        slot: u32,
        binding: UavTextureBinding,
    },
    SetComputePso(PsoId),
    Dispatch([u32; 3]),
}

struct RecordedTexture {
    info: TextureInfo,
    format: PixelFormat,
}

struct RecordedProgram {
    name: String,
    source: String,
}

/// A [`RenderSystem`] that keeps a log instead of driving a GPU.
pub struct RecordingRenderSystem {
    caps: RenderSystemCapabilities,
    buffers: SlotMap<BufferHandle, u64>,
    textures: SlotMap<TextureHandle, RecordedTexture>,
    samplers: SlotMap<SamplerHandle, ()>,
    programs: SlotMap<ProgramId, RecordedProgram>,
    compiled_programs: usize,
    psos: SlotMap<PsoId, ()>,
    commands: Vec<RenderCommand>,
}

impl Default for RecordingRenderSystem {
    fn default() -> Self {
        Self::new(RenderSystemCapabilities::default())
    }
}

impl RecordingRenderSystem {
    #[must_use]
    pub fn new(caps: RenderSystemCapabilities) -> Self {
        Self {
            caps,
            buffers: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            samplers: SlotMap::with_key(),
            programs: SlotMap::with_key(),
            compiled_programs: 0,
            psos: SlotMap::with_key(),
            commands: Vec::new(),
        }
    }

    pub fn create_buffer(&mut self, size_bytes: u64) -> BufferHandle {
        self.buffers.insert(size_bytes)
    }

    #[must_use]
    pub fn buffer_size(&self, buffer: BufferHandle) -> Option<u64> {
        self.buffers.get(buffer).copied()
    }

    pub fn create_texture(&mut self, info: TextureInfo, format: PixelFormat) -> TextureHandle {
        self.textures.insert(RecordedTexture { info, format })
    }

    pub fn create_sampler(&mut self) -> SamplerHandle {
        self.samplers.insert(())
    }

    /// Every call recorded so far, oldest first.
    #[must_use]
    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }

    /// Drains the command log.
    pub fn take_commands(&mut self) -> Vec<RenderCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Number of programs compiled over the system's lifetime.
    #[must_use]
    pub fn program_count(&self) -> usize {
        self.compiled_programs
    }

    /// Number of programs compiled and not yet destroyed.
    #[must_use]
    pub fn live_program_count(&self) -> usize {
        self.programs.len()
    }

    #[must_use]
    pub fn program_name(&self, id: ProgramId) -> Option<&str> {
        self.programs.get(id).map(|p| p.name.as_str())
    }

    /// Source text of a live program.
    #[must_use]
    pub fn program_source(&self, id: ProgramId) -> Option<&str> {
        self.programs.get(id).map(|p| p.source.as_str())
    }

    #[must_use]
    pub fn texture_format(&self, texture: TextureHandle) -> Option<PixelFormat> {
        self.textures.get(texture).map(|t| t.format)
    }

    /// Number of pipelines created and not yet destroyed.
    #[must_use]
    pub fn live_pso_count(&self) -> usize {
        self.psos.len()
    }

    #[must_use]
    pub fn is_pso_live(&self, pso: PsoId) -> bool {
        self.psos.contains_key(pso)
    }

    fn check_buffer(&self, range: BufferRange) -> Result<()> {
        let size = self
            .buffers
            .get(range.buffer)
            .ok_or_else(|| HlmsError::UnknownResource(format!("{:?}", range.buffer)))?;
        if range.offset + range.size > *size {
            return Err(HlmsError::BufferRangeOutOfBounds {
                offset: range.offset,
                size_bytes: range.size,
                buffer_size: *size,
            });
        }
        Ok(())
    }

    fn check_texture(&self, texture: TextureHandle) -> Result<()> {
        if self.textures.contains_key(texture) {
            Ok(())
        } else {
            Err(HlmsError::UnknownResource(format!("{texture:?}")))
        }
    }
}

impl RenderSystem for RecordingRenderSystem {
    fn capabilities(&self) -> &RenderSystemCapabilities {
        &self.caps
    }

    fn compile_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramId> {
        let id = self.programs.insert(RecordedProgram {
            name: desc.name.to_string(),
            source: desc.source.to_string(),
        });
        self.compiled_programs += 1;
        self.commands.push(RenderCommand::CompileProgram {
            id,
            name: desc.name.to_string(),
        });
        Ok(id)
    }

    fn compute_pso_created(
        &mut self,
        program: Option<ProgramId>,
        threads_per_group: [u32; 3],
    ) -> Result<PsoId> {
        let pso = self.psos.insert(());
        self.commands.push(RenderCommand::PsoCreated {
            pso,
            program,
            threads_per_group,
        });
        Ok(pso)
    }

    fn compute_pso_destroyed(&mut self, pso: PsoId) {
        self.psos.remove(pso);
        self.commands.push(RenderCommand::PsoDestroyed(pso));
    }

    fn program_destroyed(&mut self, program: ProgramId) {
        self.programs.remove(program);
        self.commands.push(RenderCommand::ProgramDestroyed(program));
    }

    fn texture_info(&self, texture: TextureHandle) -> Option<TextureInfo> {
        self.textures.get(texture).map(|t| t.info)
    }

    fn bind_const_buffer(&mut self, slot: u32, buffer: BufferHandle) -> Result<()> {
        if !self.buffers.contains_key(buffer) {
            return Err(HlmsError::UnknownResource(format!("{buffer:?}")));
        }
        self.commands
            .push(RenderCommand::BindConstBuffer { slot, buffer });
        Ok(())
    }

    fn bind_tex_buffer(
        &mut self,
        stage: ShaderStage,
        slot: u32,
        range: BufferRange,
        format: PixelFormat,
    ) -> Result<()> {
        self.check_buffer(range)?;
        self.commands.push(RenderCommand::BindTexBuffer {
            stage,
            slot,
            range,
            format,
        });
        Ok(())
    }

    fn create_emulation_texture(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<TextureHandle> {
        let texture = self.create_texture(TextureInfo::new_2d(width, height), format);
        self.commands.push(RenderCommand::CreateEmulationTexture {
            texture,
            width,
            height,
            format,
        });
        Ok(texture)
    }

    fn upload_emulated_tex_buffer(&mut self, upload: &EmulatedUpload) -> Result<()> {
        self.check_buffer(upload.source)?;
        self.check_texture(upload.texture)?;
        self.commands.push(RenderCommand::UploadEmulated(*upload));
        Ok(())
    }

    fn bind_texture(
        &mut self,
        stage: ShaderStage,
        slot: u32,
        texture: TextureHandle,
    ) -> Result<()> {
        self.check_texture(texture)?;
        self.commands.push(RenderCommand::BindTexture {
            stage,
            slot,
            texture,
        });
        Ok(())
    }

    fn bind_sampler(
        &mut self,
        stage: ShaderStage,
        slot: u32,
        sampler: SamplerHandle,
    ) -> Result<()> {
        if !self.samplers.contains_key(sampler) {
            return Err(HlmsError::UnknownResource(format!("{sampler:?}")));
        }
        self.commands.push(RenderCommand::BindSampler {
            stage,
            slot,
            sampler,
        });
        Ok(())
    }

    fn bind_uav_buffer(
        &mut self,
        slot: u32,
        range: BufferRange,
        access: ResourceAccess,
    ) -> Result<()> {
        self.check_buffer(range)?;
        self.commands.push(RenderCommand::BindUavBuffer {
            slot,
            range,
            access,
        });
        Ok(())
    }

    fn bind_uav_texture(&mut self, slot: u32, binding: &UavTextureBinding) -> Result<()> {
        self.check_texture(binding.texture)?;
        self.commands.push(RenderCommand::BindUavTexture {
            slot,
            binding: *binding,
        });
        Ok(())
    }

    fn set_compute_pso(&mut self, pso: PsoId) -> Result<()> {
        if !self.is_pso_live(pso) {
            return Err(HlmsError::Backend(format!("{pso:?} was destroyed")));
        }
        self.commands.push(RenderCommand::SetComputePso(pso));
        Ok(())
    }

    fn dispatch(&mut self, num_thread_groups: [u32; 3]) -> Result<()> {
        self.commands.push(RenderCommand::Dispatch(num_thread_groups));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_pso_lifetime() {
        let mut rs = RecordingRenderSystem::default();
        let pso = rs.compute_pso_created(None, [64, 1, 1]).unwrap();
        assert!(rs.is_pso_live(pso));
        assert!(rs.set_compute_pso(pso).is_ok());

        rs.compute_pso_destroyed(pso);
        assert!(!rs.is_pso_live(pso));
        assert_eq!(rs.live_pso_count(), 0);
        assert!(rs.set_compute_pso(pso).is_err());
    }

    #[test]
    fn destroyed_programs_are_released() {
        let mut rs = RecordingRenderSystem::default();
        let desc = ProgramDesc {
            name: "p",
            source: "fn main() {}",
            profile: crate::settings::ShaderProfile::Wgsl,
            target: None,
            entry_point: "main",
        };
        let id = rs.compile_program(&desc).unwrap();
        assert_eq!(rs.program_source(id), Some("fn main() {}"));

        rs.program_destroyed(id);
        assert_eq!(rs.program_source(id), None);
        assert_eq!(rs.live_program_count(), 0);
        assert_eq!(rs.program_count(), 1);

        // Slots are reused without aliasing the old handle.
        let again = rs.compile_program(&desc).unwrap();
        assert_ne!(again, id);
        assert_eq!(rs.live_program_count(), 1);
    }

    #[test]
    fn rejects_out_of_range_views() {
        let mut rs = RecordingRenderSystem::default();
        let buffer = rs.create_buffer(64);
        let range = BufferRange {
            buffer,
            offset: 32,
            size: 64,
        };
        assert!(
            rs.bind_tex_buffer(ShaderStage::Compute, 0, range, PixelFormat::R32Float)
                .is_err()
        );
        assert!(rs.commands().is_empty());
    }
}
