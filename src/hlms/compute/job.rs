//! Compute jobs.
//!
//! A [`ComputeJob`] names a template, the piece files expanded before it, the
//! resources bound at dispatch and the dispatch shape. Its property set is the
//! fingerprint under which the compiled pipeline is cached.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::buffer::TexBuffer;
use crate::hlms::compute::names;
use crate::hlms::compute::pso::PsoCacheIndex;
use crate::hlms::property::PropertySet;
use crate::render_system::{
    BufferHandle, BufferRange, PixelFormat, RenderSystem, ResourceAccess, SamplerHandle,
    TextureHandle, UavTextureBinding,
};
use crate::utils::IdString;

/// A read-only resource bound at a texture slot.
#[derive(Debug, Clone)]
pub enum TexSlot {
    /// A texture buffer range; `size_bytes == 0` binds the rest of the buffer.
    Buffer {
        view: Arc<TexBuffer>,
        offset: u64,
        size_bytes: u64,
    },
    /// A sampled image.
    Texture {
        texture: TextureHandle,
        sampler: Option<SamplerHandle>,
    },
}

/// A read/write resource bound at a UAV slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UavSlot {
    Buffer {
        range: BufferRange,
        access: ResourceAccess,
    },
    Texture(UavTextureBinding),
}

pub struct ComputeJob {
    name: IdString,
    ref_name: String,
    source_file: String,
    piece_files: Vec<String>,

    threads_per_group: [u32; 3],
    num_thread_groups: [u32; 3],
    /// Properties set from code.
    user_properties: PropertySet,
    /// `user_properties` plus the auto properties of the last refresh.
    properties: PropertySet,

    const_buffers: BTreeMap<u32, BufferHandle>,
    texture_slots: Vec<Option<TexSlot>>,
    uav_slots: Vec<Option<UavSlot>>,
    inform_shader_of_texture_data: bool,

    pub(crate) pso_cache_index: PsoCacheIndex,
}

impl std::fmt::Debug for ComputeJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeJob")
            .field("name", &self.name)
            .field("source_file", &self.source_file)
            .field("pso_cache_index", &self.pso_cache_index)
            .finish_non_exhaustive()
    }
}

fn slot_props<T>(slots: &[Option<T>]) -> (i32, i32) {
    let max = slots
        .iter()
        .rposition(Option::is_some)
        .map_or(0, |last| last as i32 + 1);
    (slots.len() as i32, max)
}

fn ensure_slot<T>(slots: &mut Vec<Option<T>>, slot: u32) -> &mut Option<T> {
    let slot = slot as usize;
    if slots.len() <= slot {
        slots.resize_with(slot + 1, || None);
    }
    &mut slots[slot]
}

impl ComputeJob {
    pub(crate) fn new(
        name: IdString,
        ref_name: impl Into<String>,
        source_file: impl Into<String>,
        piece_files: Vec<String>,
    ) -> Self {
        Self {
            name,
            ref_name: ref_name.into(),
            source_file: source_file.into(),
            piece_files,
            threads_per_group: [0; 3],
            num_thread_groups: [0; 3],
            user_properties: PropertySet::new(),
            properties: PropertySet::new(),
            const_buffers: BTreeMap::new(),
            texture_slots: Vec::new(),
            uav_slots: Vec::new(),
            inform_shader_of_texture_data: false,
            pso_cache_index: PsoCacheIndex::INVALID,
        }
    }

    #[inline]
    fn invalidate(&mut self) {
        self.pso_cache_index = PsoCacheIndex::INVALID;
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> IdString {
        self.name
    }

    /// Human readable name, used in logs.
    #[inline]
    #[must_use]
    pub fn ref_name(&self) -> &str {
        &self.ref_name
    }

    #[inline]
    #[must_use]
    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    #[inline]
    #[must_use]
    pub fn piece_files(&self) -> &[String] {
        &self.piece_files
    }

    #[inline]
    #[must_use]
    pub fn properties(&self) -> &PropertySet {
        &self.properties
    }

    #[inline]
    #[must_use]
    pub fn pso_cache_index(&self) -> PsoCacheIndex {
        self.pso_cache_index
    }

    // ── Properties ───────────────────────────────────────────────────────────

    pub fn set_property(&mut self, key: impl Into<IdString>, value: i32) {
        let key = key.into();
        self.user_properties.set(key, value);
        self.properties.set(key, value);
        self.invalidate();
    }

    #[must_use]
    pub fn get_property(&self, key: &str) -> i32 {
        self.properties.get(key)
    }

    pub fn remove_property(&mut self, key: &str) {
        if self.user_properties.remove(key) {
            self.properties.remove(key);
            self.invalidate();
        }
    }

    // ── Dispatch shape ───────────────────────────────────────────────────────

    /// Threads per group. Zero components are left to the template.
    pub fn set_threads_per_group(&mut self, x: u32, y: u32, z: u32) {
        self.threads_per_group = [x, y, z];
        self.invalidate();
    }

    /// Thread groups per dispatch. Zero components are left to the template.
    pub fn set_num_thread_groups(&mut self, x: u32, y: u32, z: u32) {
        self.num_thread_groups = [x, y, z];
        self.invalidate();
    }

    #[inline]
    #[must_use]
    pub fn threads_per_group(&self) -> [u32; 3] {
        self.threads_per_group
    }

    #[inline]
    #[must_use]
    pub fn num_thread_groups(&self) -> [u32; 3] {
        self.num_thread_groups
    }

    // ── Resources ────────────────────────────────────────────────────────────

    pub fn set_const_buffer(&mut self, slot: u32, buffer: Option<BufferHandle>) {
        match buffer {
            Some(buffer) => {
                self.const_buffers.insert(slot, buffer);
            }
            None => {
                self.const_buffers.remove(&slot);
            }
        }
    }

    /// Resizes the texture slot table, dropping bindings beyond `count`.
    pub fn set_num_tex_units(&mut self, count: u32) {
        self.texture_slots.resize_with(count as usize, || None);
        self.invalidate();
    }

    pub fn set_num_uav_units(&mut self, count: u32) {
        self.uav_slots.resize_with(count as usize, || None);
        self.invalidate();
    }

    pub fn set_tex_buffer(&mut self, slot: u32, view: Arc<TexBuffer>, offset: u64, size_bytes: u64) {
        *ensure_slot(&mut self.texture_slots, slot) = Some(TexSlot::Buffer {
            view,
            offset,
            size_bytes,
        });
        self.invalidate();
    }

    pub fn set_texture(&mut self, slot: u32, texture: TextureHandle, sampler: Option<SamplerHandle>) {
        *ensure_slot(&mut self.texture_slots, slot) = Some(TexSlot::Texture { texture, sampler });
        self.invalidate();
    }

    pub fn clear_texture_slot(&mut self, slot: u32) {
        if let Some(entry) = self.texture_slots.get_mut(slot as usize) {
            *entry = None;
            self.invalidate();
        }
    }

    pub fn set_uav_buffer(&mut self, slot: u32, range: BufferRange, access: ResourceAccess) {
        *ensure_slot(&mut self.uav_slots, slot) = Some(UavSlot::Buffer { range, access });
        self.invalidate();
    }

    pub fn set_uav_texture(
        &mut self,
        slot: u32,
        texture: TextureHandle,
        access: ResourceAccess,
        mip_level: u32,
        array_index: u32,
        format: Option<PixelFormat>,
    ) {
        *ensure_slot(&mut self.uav_slots, slot) = Some(UavSlot::Texture(UavTextureBinding {
            texture,
            access,
            mip_level,
            array_index,
            format,
        }));
        self.invalidate();
    }

    pub fn clear_uav_slot(&mut self, slot: u32) {
        if let Some(entry) = self.uav_slots.get_mut(slot as usize) {
            *entry = None;
            self.invalidate();
        }
    }

    /// Exports `texture{N}_width/_height/_depth/_mipmaps` for image slots.
    pub fn set_inform_shader_of_texture_data(&mut self, inform: bool) {
        self.inform_shader_of_texture_data = inform;
        self.invalidate();
    }

    #[inline]
    #[must_use]
    pub fn const_buffers(&self) -> &BTreeMap<u32, BufferHandle> {
        &self.const_buffers
    }

    #[inline]
    #[must_use]
    pub fn texture_slots(&self) -> &[Option<TexSlot>] {
        &self.texture_slots
    }

    #[inline]
    #[must_use]
    pub fn uav_slots(&self) -> &[Option<UavSlot>] {
        &self.uav_slots
    }

    // ── Auto properties ──────────────────────────────────────────────────────

    fn set_auto(&mut self, key: impl Into<IdString>, value: i32) {
        self.properties.set(key, value);
    }

    /// Rewrites the properties derived from the job's state.
    ///
    /// The fingerprint is rebuilt from the user properties, so slots that were
    /// cleared leave no stale entries. An auto property shadows a user
    /// property of the same name until the next refresh.
    pub(crate) fn update_auto_properties(&mut self, rs: &dyn RenderSystem) {
        self.properties.clone_from(&self.user_properties);

        for axis in 0..3 {
            if self.threads_per_group[axis] != 0 {
                self.set_auto(names::THREADS_PER_GROUP[axis], self.threads_per_group[axis] as i32);
            }
            if self.num_thread_groups[axis] != 0 {
                self.set_auto(names::NUM_THREAD_GROUPS[axis], self.num_thread_groups[axis] as i32);
            }
        }

        let (num_textures, max_texture) = slot_props(&self.texture_slots);
        self.set_auto(names::NUM_TEXTURE_SLOTS, num_textures);
        self.set_auto(names::MAX_TEXTURE_SLOT, max_texture);

        let mut texture_props = Vec::new();
        for (slot, entry) in self.texture_slots.iter().enumerate() {
            match entry {
                Some(TexSlot::Buffer { .. }) => texture_props.push((names::texture_is_buffer(slot), 1)),
                Some(TexSlot::Texture { texture, .. }) => {
                    texture_props.push((names::texture_is_buffer(slot), 0));
                    if self.inform_shader_of_texture_data
                        && let Some(info) = rs.texture_info(*texture)
                    {
                        let [w, h, d, m] = names::texture_dimensions(slot);
                        texture_props.push((w, info.width as i32));
                        texture_props.push((h, info.height as i32));
                        texture_props.push((d, info.depth as i32));
                        texture_props.push((m, info.mipmaps as i32));
                    }
                }
                None => {}
            }
        }

        let (num_uavs, max_uav) = slot_props(&self.uav_slots);
        self.set_auto(names::NUM_UAV_SLOTS, num_uavs);
        self.set_auto(names::MAX_UAV_SLOT, max_uav);

        for (slot, entry) in self.uav_slots.iter().enumerate() {
            let Some(entry) = entry else { continue };
            let is_buffer = matches!(entry, UavSlot::Buffer { .. });
            texture_props.push((names::uav_is_buffer(slot), i32::from(is_buffer)));
        }

        for (key, value) in texture_props {
            self.set_auto(&key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_system::{RecordingRenderSystem, TextureInfo};

    fn job() -> ComputeJob {
        ComputeJob::new(IdString::new("test/job"), "job", "job.wgsl", Vec::new())
    }

    #[test]
    fn setters_invalidate_cached_index() {
        let mut job = job();
        job.pso_cache_index = PsoCacheIndex(3);
        job.set_property("use_lds", 1);
        assert_eq!(job.pso_cache_index(), PsoCacheIndex::INVALID);

        job.pso_cache_index = PsoCacheIndex(3);
        job.set_threads_per_group(64, 1, 1);
        assert!(!job.pso_cache_index().is_valid());
    }

    #[test]
    fn auto_properties_follow_slots() {
        let mut rs = RecordingRenderSystem::default();
        let texture = rs.create_texture(
            TextureInfo {
                width: 256,
                height: 128,
                depth: 1,
                mipmaps: 9,
            },
            PixelFormat::Rgba8Unorm,
        );
        let buffer = rs.create_buffer(64);

        let mut job = job();
        job.set_threads_per_group(8, 8, 1);
        job.set_texture(2, texture, None);
        job.set_uav_buffer(
            0,
            BufferRange {
                buffer,
                offset: 0,
                size: 64,
            },
            ResourceAccess::WRITE,
        );
        job.set_inform_shader_of_texture_data(true);
        job.update_auto_properties(&rs);

        let props = job.properties();
        assert_eq!(props.get("threads_per_group_x"), 8);
        assert_eq!(props.get("threads_per_group_y"), 8);
        assert!(!props.contains("num_thread_groups_x"));
        assert_eq!(props.get("num_texture_slots"), 3);
        assert_eq!(props.get("max_texture_slot"), 3);
        assert_eq!(props.get("texture2_is_buffer"), 0);
        assert_eq!(props.get("texture2_width"), 256);
        assert_eq!(props.get("texture2_mipmaps"), 9);
        assert_eq!(props.get("num_uav_slots"), 1);
        assert_eq!(props.get("uav0_is_buffer"), 1);

        job.clear_texture_slot(2);
        job.update_auto_properties(&rs);
        let props = job.properties();
        assert_eq!(props.get("max_texture_slot"), 0);
        assert!(!props.contains("texture2_is_buffer"));
        assert!(!props.contains("texture2_width"));
    }

    #[test]
    fn refresh_keeps_user_properties_with_auto_names() {
        let rs = RecordingRenderSystem::default();
        let mut job = job();
        job.set_num_thread_groups(4, 1, 1);
        job.update_auto_properties(&rs);
        assert_eq!(job.get_property("num_thread_groups_x"), 4);

        // The shape moves to a property set from code; the next refresh
        // exports nothing for it and must not drop the user value.
        job.set_num_thread_groups(0, 0, 0);
        job.set_property("num_thread_groups_x", 16);
        job.set_property("use_lds", 1);
        job.update_auto_properties(&rs);
        assert_eq!(job.get_property("num_thread_groups_x"), 16);
        assert_eq!(job.get_property("use_lds"), 1);

        job.remove_property("num_thread_groups_x");
        job.update_auto_properties(&rs);
        assert!(!job.properties().contains("num_thread_groups_x"));
    }
}
