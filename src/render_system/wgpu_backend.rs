//! `wgpu` render system.
//!
//! Programs are WGSL shader modules and compute PSOs are
//! `wgpu::ComputePipeline`s with an automatic layout. Slots map onto bind
//! groups by resource class:
//!
//! | Group | Contents |
//! |-------|----------|
//! | 0 | constant buffers (uniform) |
//! | 1 | texture buffers and sampled textures |
//! | 2 | samplers |
//! | 3 | read/write buffers and storage textures |
//!
//! The binding index inside a group is the slot. Bindings are collected by the
//! bind calls and consumed by the next [`RenderSystem::dispatch`]; the shader
//! stage argument is ignored since only compute work is submitted.

use std::collections::BTreeMap;
use std::num::NonZeroU64;

use slotmap::SlotMap;

use crate::errors::{HlmsError, Result};
use crate::render_system::{
    BufferHandle, BufferRange, EmulatedUpload, PixelFormat, ProgramDesc, ProgramId, PsoId,
    RenderSystem, RenderSystemCapabilities, ResourceAccess, SamplerHandle, ShaderStage,
    TextureHandle, TextureInfo, UavTextureBinding,
};
use crate::settings::ShaderProfile;
use crate::utils::IdString;

const GROUP_CONST_BUFFERS: usize = 0;
const GROUP_TEXTURES: usize = 1;
const GROUP_SAMPLERS: usize = 2;
const GROUP_UAVS: usize = 3;
const GROUP_COUNT: usize = 4;

fn texture_format(format: PixelFormat) -> wgpu::TextureFormat {
    match format {
        PixelFormat::R8Unorm => wgpu::TextureFormat::R8Unorm,
        PixelFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        PixelFormat::R16Float => wgpu::TextureFormat::R16Float,
        PixelFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        PixelFormat::R32Uint => wgpu::TextureFormat::R32Uint,
        PixelFormat::Rg32Uint => wgpu::TextureFormat::Rg32Uint,
        PixelFormat::Rgba32Uint => wgpu::TextureFormat::Rgba32Uint,
        PixelFormat::R32Float => wgpu::TextureFormat::R32Float,
        PixelFormat::Rg32Float => wgpu::TextureFormat::Rg32Float,
        PixelFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
    }
}

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    info: TextureInfo,
}

struct GpuPso {
    pipeline: Option<wgpu::ComputePipeline>,
}

#[derive(Debug, Clone, Copy)]
enum Bound {
    Buffer(BufferRange),
    Texture(TextureHandle),
    StorageTexture(UavTextureBinding),
    Sampler(SamplerHandle),
}

enum Resolved<'a> {
    Buffer(wgpu::BufferBinding<'a>),
    View(wgpu::TextureView),
    Sampler(&'a wgpu::Sampler),
}

/// A [`RenderSystem`] submitting compute work through `wgpu`.
pub struct WgpuRenderSystem {
    device: wgpu::Device,
    queue: wgpu::Queue,
    caps: RenderSystemCapabilities,

    buffers: SlotMap<BufferHandle, wgpu::Buffer>,
    textures: SlotMap<TextureHandle, GpuTexture>,
    samplers: SlotMap<SamplerHandle, wgpu::Sampler>,

    programs: SlotMap<ProgramId, wgpu::ShaderModule>,
    psos: SlotMap<PsoId, GpuPso>,

    bound: [BTreeMap<u32, Bound>; GROUP_COUNT],
    current_pso: Option<PsoId>,
}

impl WgpuRenderSystem {
    #[must_use]
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let mut extensions = Vec::new();
        if device.features().contains(wgpu::Features::SHADER_F16) {
            extensions.push(IdString::new("wgpu_shader_f16"));
        }

        let caps = RenderSystemCapabilities {
            name: "wgpu".to_string(),
            shader_profiles: vec![ShaderProfile::Wgsl],
            compute_targets: Vec::new(),
            native_tex_buffers: true,
            extensions,
        };

        Self {
            device,
            queue,
            caps,
            buffers: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            samplers: SlotMap::with_key(),
            programs: SlotMap::with_key(),
            psos: SlotMap::with_key(),
            bound: Default::default(),
            current_pso: None,
        }
    }

    /// Creates a device without a surface.
    pub async fn headless(power_preference: wgpu::PowerPreference) -> Result<Self> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| HlmsError::Backend(e.to_string()))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("HLMS Compute Device"),
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await
            .map_err(|e| HlmsError::Backend(e.to_string()))?;

        Ok(Self::new(device, queue))
    }

    #[inline]
    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[inline]
    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn create_buffer(&mut self, size: u64, usage: wgpu::BufferUsages) -> BufferHandle {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("HLMS Buffer"),
            size,
            usage,
            mapped_at_creation: false,
        });
        self.buffers.insert(buffer)
    }

    pub fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<()> {
        let buffer = self.buffer(buffer)?;
        self.queue.write_buffer(buffer, offset, data);
        Ok(())
    }

    pub fn create_texture(
        &mut self,
        info: TextureInfo,
        format: PixelFormat,
        usage: wgpu::TextureUsages,
    ) -> TextureHandle {
        let dimension = if info.depth > 1 {
            wgpu::TextureDimension::D3
        } else {
            wgpu::TextureDimension::D2
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("HLMS Texture"),
            size: wgpu::Extent3d {
                width: info.width,
                height: info.height,
                depth_or_array_layers: info.depth,
            },
            mip_level_count: info.mipmaps.max(1),
            sample_count: 1,
            dimension,
            format: texture_format(format),
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.textures.insert(GpuTexture {
            texture,
            view,
            info,
        })
    }

    pub fn create_sampler(&mut self, desc: &wgpu::SamplerDescriptor<'_>) -> SamplerHandle {
        let sampler = self.device.create_sampler(desc);
        self.samplers.insert(sampler)
    }

    fn buffer(&self, handle: BufferHandle) -> Result<&wgpu::Buffer> {
        self.buffers
            .get(handle)
            .ok_or_else(|| HlmsError::UnknownResource(format!("{handle:?}")))
    }

    fn texture(&self, handle: TextureHandle) -> Result<&GpuTexture> {
        self.textures
            .get(handle)
            .ok_or_else(|| HlmsError::UnknownResource(format!("{handle:?}")))
    }

    fn buffer_binding(&self, range: BufferRange) -> Result<wgpu::BufferBinding<'_>> {
        Ok(wgpu::BufferBinding {
            buffer: self.buffer(range.buffer)?,
            offset: range.offset,
            size: NonZeroU64::new(range.size),
        })
    }

    fn resolve(&self, bound: &Bound) -> Result<Resolved<'_>> {
        Ok(match *bound {
            Bound::Buffer(range) => Resolved::Buffer(self.buffer_binding(range)?),
            Bound::Texture(handle) => Resolved::View(self.texture(handle)?.view.clone()),
            Bound::StorageTexture(binding) => {
                let texture = self.texture(binding.texture)?;
                Resolved::View(texture.texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some("HLMS Storage View"),
                    format: binding.format.map(texture_format),
                    base_mip_level: binding.mip_level,
                    mip_level_count: Some(1),
                    base_array_layer: binding.array_index,
                    array_layer_count: Some(1),
                    ..Default::default()
                }))
            }
            Bound::Sampler(handle) => Resolved::Sampler(
                self.samplers
                    .get(handle)
                    .ok_or_else(|| HlmsError::UnknownResource(format!("{handle:?}")))?,
            ),
        })
    }

    fn build_bind_group(
        &self,
        pipeline: &wgpu::ComputePipeline,
        group: usize,
    ) -> Result<wgpu::BindGroup> {
        let resolved = self.bound[group]
            .iter()
            .map(|(slot, bound)| Ok((*slot, self.resolve(bound)?)))
            .collect::<Result<Vec<_>>>()?;

        let entries: Vec<wgpu::BindGroupEntry<'_>> = resolved
            .iter()
            .map(|(slot, resource)| wgpu::BindGroupEntry {
                binding: *slot,
                resource: match resource {
                    Resolved::Buffer(binding) => wgpu::BindingResource::Buffer(binding.clone()),
                    Resolved::View(view) => wgpu::BindingResource::TextureView(view),
                    Resolved::Sampler(sampler) => wgpu::BindingResource::Sampler(sampler),
                },
            })
            .collect();

        let layout = pipeline.get_bind_group_layout(group as u32);
        Ok(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("HLMS Compute BindGroup"),
            layout: &layout,
            entries: &entries,
        }))
    }
}

impl RenderSystem for WgpuRenderSystem {
    fn capabilities(&self) -> &RenderSystemCapabilities {
        &self.caps
    }

    fn compile_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramId> {
        if desc.profile != ShaderProfile::Wgsl {
            return Err(HlmsError::Backend(format!(
                "wgpu cannot compile {} programs ({})",
                desc.profile.name(),
                desc.name
            )));
        }

        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(desc.name),
                source: wgpu::ShaderSource::Wgsl(desc.source.into()),
            });

        Ok(self.programs.insert(module))
    }

    fn compute_pso_created(
        &mut self,
        program: Option<ProgramId>,
        threads_per_group: [u32; 3],
    ) -> Result<PsoId> {
        let pipeline = match program {
            Some(id) => {
                let module = self
                    .programs
                    .get(id)
                    .ok_or_else(|| HlmsError::UnknownResource(format!("{id:?}")))?;
                let label = format!(
                    "HLMS Compute Pipeline {}x{}x{}",
                    threads_per_group[0], threads_per_group[1], threads_per_group[2]
                );
                Some(
                    self.device
                        .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                            label: Some(&label),
                            layout: None,
                            module,
                            entry_point: Some("main"),
                            compilation_options: wgpu::PipelineCompilationOptions::default(),
                            cache: None,
                        }),
                )
            }
            None => None,
        };

        Ok(self.psos.insert(GpuPso { pipeline }))
    }

    fn compute_pso_destroyed(&mut self, pso: PsoId) {
        self.psos.remove(pso);
        if self.current_pso == Some(pso) {
            self.current_pso = None;
        }
    }

    fn program_destroyed(&mut self, program: ProgramId) {
        self.programs.remove(program);
    }

    fn texture_info(&self, texture: TextureHandle) -> Option<TextureInfo> {
        self.textures.get(texture).map(|t| t.info)
    }

    fn bind_const_buffer(&mut self, slot: u32, buffer: BufferHandle) -> Result<()> {
        let size = self.buffer(buffer)?.size();
        self.bound[GROUP_CONST_BUFFERS].insert(
            slot,
            Bound::Buffer(BufferRange {
                buffer,
                offset: 0,
                size,
            }),
        );
        Ok(())
    }

    fn bind_tex_buffer(
        &mut self,
        _stage: ShaderStage,
        slot: u32,
        range: BufferRange,
        _format: PixelFormat,
    ) -> Result<()> {
        self.buffer(range.buffer)?;
        self.bound[GROUP_TEXTURES].insert(slot, Bound::Buffer(range));
        Ok(())
    }

    fn create_emulation_texture(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<TextureHandle> {
        Ok(self.create_texture(
            TextureInfo::new_2d(width, height),
            format,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        ))
    }

    fn upload_emulated_tex_buffer(&mut self, upload: &EmulatedUpload) -> Result<()> {
        let full_rows = upload.full_rows();
        if full_rows > 1 && upload.bytes_per_row % wgpu::COPY_BYTES_PER_ROW_ALIGNMENT != 0 {
            return Err(HlmsError::Backend(format!(
                "emulated texture buffer rows of {} bytes are not {}-byte aligned",
                upload.bytes_per_row,
                wgpu::COPY_BYTES_PER_ROW_ALIGNMENT
            )));
        }

        let buffer = self.buffer(upload.source.buffer)?;
        let texture = &self.texture(upload.texture)?.texture;

        let copy = |encoder: &mut wgpu::CommandEncoder, offset: u64, row: u32, width: u32, rows: u32| {
            encoder.copy_buffer_to_texture(
                wgpu::TexelCopyBufferInfo {
                    buffer,
                    layout: wgpu::TexelCopyBufferLayout {
                        offset,
                        bytes_per_row: (rows > 1).then_some(upload.bytes_per_row),
                        rows_per_image: None,
                    },
                },
                wgpu::TexelCopyTextureInfo {
                    texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d { x: 0, y: row, z: 0 },
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::Extent3d {
                    width,
                    height: rows,
                    depth_or_array_layers: 1,
                },
            );
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("HLMS Tex Buffer Upload"),
            });

        // Whole rows first, then the partial row so the copy never reads past
        // the end of the bound range.
        if full_rows > 0 {
            copy(&mut encoder, upload.source.offset, 0, upload.width, full_rows);
        }
        let tail = upload.last_row_texels();
        if tail > 0 {
            let offset =
                upload.source.offset + u64::from(full_rows) * u64::from(upload.bytes_per_row);
            copy(&mut encoder, offset, full_rows, tail, 1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn bind_texture(
        &mut self,
        _stage: ShaderStage,
        slot: u32,
        texture: TextureHandle,
    ) -> Result<()> {
        self.texture(texture)?;
        self.bound[GROUP_TEXTURES].insert(slot, Bound::Texture(texture));
        Ok(())
    }

    fn bind_sampler(
        &mut self,
        _stage: ShaderStage,
        slot: u32,
        sampler: SamplerHandle,
    ) -> Result<()> {
        if !self.samplers.contains_key(sampler) {
            return Err(HlmsError::UnknownResource(format!("{sampler:?}")));
        }
        self.bound[GROUP_SAMPLERS].insert(slot, Bound::Sampler(sampler));
        Ok(())
    }

    fn bind_uav_buffer(
        &mut self,
        slot: u32,
        range: BufferRange,
        _access: ResourceAccess,
    ) -> Result<()> {
        self.buffer(range.buffer)?;
        self.bound[GROUP_UAVS].insert(slot, Bound::Buffer(range));
        Ok(())
    }

    fn bind_uav_texture(&mut self, slot: u32, binding: &UavTextureBinding) -> Result<()> {
        self.texture(binding.texture)?;
        self.bound[GROUP_UAVS].insert(slot, Bound::StorageTexture(*binding));
        Ok(())
    }

    fn set_compute_pso(&mut self, pso: PsoId) -> Result<()> {
        if !self.psos.contains_key(pso) {
            return Err(HlmsError::Backend(format!("{pso:?} was destroyed")));
        }
        self.current_pso = Some(pso);
        Ok(())
    }

    fn dispatch(&mut self, num_thread_groups: [u32; 3]) -> Result<()> {
        let pso = self
            .current_pso
            .ok_or_else(|| HlmsError::Backend("dispatch without a compute PSO".to_string()))?;

        let pipeline = self.psos.get(pso).and_then(|p| p.pipeline.as_ref());

        if let Some(pipeline) = pipeline {
            let bind_groups = (0..GROUP_COUNT)
                .filter(|group| !self.bound[*group].is_empty())
                .map(|group| Ok((group as u32, self.build_bind_group(pipeline, group)?)))
                .collect::<Result<Vec<_>>>()?;

            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("HLMS Compute Encoder"),
                });
            {
                let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("HLMS Compute Pass"),
                    timestamp_writes: None,
                });
                cpass.set_pipeline(pipeline);
                for (group, bind_group) in &bind_groups {
                    cpass.set_bind_group(*group, bind_group, &[]);
                }
                let [x, y, z] = num_thread_groups;
                cpass.dispatch_workgroups(x, y, z);
            }
            self.queue.submit(std::iter::once(encoder.finish()));
        } else {
            log::warn!("Skipping dispatch: {pso:?} has no program");
        }

        for group in &mut self.bound {
            group.clear();
        }
        Ok(())
    }
}
