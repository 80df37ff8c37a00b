//! Compute HLMS
//!
//! Owns the registered [`ComputeJob`]s, the compute PSO cache and the program
//! dedup cache, and turns `dispatch(job)` into render-system calls.
//!
//! # Dispatch
//!
//! ```text
//! dispatch(job)
//!   ├─ cached index valid? ──────────────────────────────┐
//!   │   no: refresh auto properties                       │
//!   │       find entry with equal properties              │
//!   │         hit:  remember index                        │
//!   │         miss: compile → push → remember index       │
//!   └─ bind const buffers → textures → UAVs → PSO → dispatch
//! ```
//!
//! # Compile
//!
//! 1. Copy the job's properties into a working set and add render-system
//!    properties (extensions, `GL3Plus`, `hlms_high_quality`)
//! 2. Expand the job's piece files, then its template
//! 3. Hash the result and reuse or compile the program
//! 4. Read the dispatch shape from the working set; a zero component is fatal
//!
//! A template syntax error is logged and yields a PSO without a program.

pub mod job;
pub mod names;
pub mod pso;

pub use job::{ComputeJob, TexSlot, UavSlot};
pub use pso::{ComputePso, ComputePsoCache, PsoCacheEntry, PsoCacheIndex};

use std::path::Path;

use rustc_hash::FxHashMap;

use crate::errors::{HlmsError, Result};
use crate::hlms::program_cache::ShaderProgramCache;
use crate::hlms::property::PropertySet;
use crate::hlms::provider::ResourceProvider;
use crate::hlms::template::ShaderTemplateCompiler;
use crate::render_system::{ProgramDesc, RenderSystem, ShaderStage};
use crate::settings::{HlmsSettings, ShaderProfile};
use crate::utils::IdString;

fn read_shape(props: &PropertySet, keys: [&str; 3]) -> [u32; 3] {
    keys.map(|key| u32::try_from(props.get(key)).unwrap_or(0))
}

/// Template expansion and program compilation state.
struct ComputeCompiler {
    settings: HlmsSettings,
    provider: Box<dyn ResourceProvider>,
    profile: ShaderProfile,
    compute_target: Option<&'static str>,
    rs_extensions: Vec<IdString>,
    templates: ShaderTemplateCompiler,
    programs: ShaderProgramCache,
}

impl ComputeCompiler {
    fn file_ext(&self) -> &str {
        self.settings
            .shader_file_ext
            .as_deref()
            .unwrap_or_else(|| self.profile.file_extension())
    }

    /// Appends the profile extension to names without one.
    fn resolve_file_name(&self, name: &str) -> String {
        if Path::new(name).extension().is_some() {
            name.to_string()
        } else {
            format!("{name}{}", self.file_ext())
        }
    }

    fn expand(&mut self, job: &ComputeJob, props: &mut PropertySet) -> Result<(String, Option<String>)> {
        self.templates.clear_pieces();

        let ext = self.file_ext().to_string();
        let mut syntax_error = false;
        for piece_file in job.piece_files().iter().filter(|f| f.contains(ext.as_str())) {
            let text = self.provider.open(piece_file)?;
            if let Err(e) = self.templates.process_piece_file(&text, props) {
                log::warn!("HLMS syntax error in piece file {piece_file}: {e}");
                syntax_error = true;
            }
        }

        let source_name = self.resolve_file_name(job.source_file());
        let source = self.provider.open(&source_name)?;

        match self.templates.expand(&source, props) {
            Ok(expanded) if !syntax_error => Ok((source_name, Some(expanded))),
            Ok(_) => Ok((source_name, None)),
            Err(e) => {
                log::warn!(
                    "There were HLMS syntax errors while parsing {source_name} for job '{}': {e}",
                    job.ref_name()
                );
                Ok((source_name, None))
            }
        }
    }

    fn write_debug_output(&self, file_name: &str, source: &str) {
        let path = self.settings.output_path.join(file_name);
        match std::fs::write(&path, source) {
            Ok(()) => log::debug!("Wrote expanded compute shader to {}", path.display()),
            Err(e) => log::warn!("Could not write {}: {e}", path.display()),
        }
    }

    fn compile(
        &mut self,
        job: &ComputeJob,
        fingerprint_index: usize,
        rs: &mut dyn RenderSystem,
    ) -> Result<ComputePso> {
        let mut props = job.properties().clone();
        for ext in &self.rs_extensions {
            props.set(*ext, 1);
        }
        if self.profile == ShaderProfile::Glsl {
            props.set(names::GL3_PLUS, 330);
        }
        props.set(names::HIGH_QUALITY, i32::from(self.settings.high_quality));

        let (source_name, expanded) = self.expand(job, &mut props)?;
        let program_name = format!("{fingerprint_index}{source_name}");

        let program = match expanded {
            Some(source) => {
                if self.settings.debug_output {
                    self.write_debug_output(&program_name, &source);
                }

                // The working set is dropped after this compile, which resets
                // the flag for the next one.
                if props.get(names::DISABLE_STAGE) == 0 {
                    let desc = ProgramDesc {
                        name: &program_name,
                        source: &source,
                        profile: self.profile,
                        target: self.compute_target,
                        entry_point: "main",
                    };
                    Some(self.programs.get_or_compile(rs, &desc)?.0)
                } else {
                    None
                }
            }
            None => None,
        };

        let threads_per_group = read_shape(&props, names::THREADS_PER_GROUP);
        let num_thread_groups = read_shape(&props, names::NUM_THREAD_GROUPS);
        if threads_per_group.contains(&0) || num_thread_groups.contains(&0) {
            return Err(HlmsError::InvalidDispatchShape {
                job: job.ref_name().to_string(),
                threads_per_group,
                num_thread_groups,
            });
        }

        let backend = rs.compute_pso_created(program.as_ref().map(|p| p.id), threads_per_group)?;

        Ok(ComputePso {
            program,
            threads_per_group,
            num_thread_groups,
            backend,
        })
    }
}

/// The compute flavour of the HLMS.
pub struct HlmsCompute {
    compiler: ComputeCompiler,
    pso_cache: ComputePsoCache,
    jobs: FxHashMap<IdString, ComputeJob>,
}

impl HlmsCompute {
    /// Creates an HLMS reading templates from `provider`.
    ///
    /// Call [`change_render_system`](Self::change_render_system) before the
    /// first dispatch so the shader profile matches the render system.
    pub fn new(settings: HlmsSettings, provider: impl ResourceProvider + 'static) -> Self {
        Self {
            compiler: ComputeCompiler {
                settings,
                provider: Box::new(provider),
                profile: ShaderProfile::default(),
                compute_target: None,
                rs_extensions: Vec::new(),
                templates: ShaderTemplateCompiler::new(),
                programs: ShaderProgramCache::new(),
            },
            pso_cache: ComputePsoCache::new(),
            jobs: FxHashMap::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &HlmsSettings {
        &self.compiler.settings
    }

    #[inline]
    #[must_use]
    pub fn shader_profile(&self) -> ShaderProfile {
        self.compiler.profile
    }

    #[inline]
    #[must_use]
    pub fn compute_target(&self) -> Option<&'static str> {
        self.compiler.compute_target
    }

    #[inline]
    #[must_use]
    pub fn pso_cache(&self) -> &ComputePsoCache {
        &self.pso_cache
    }

    #[inline]
    #[must_use]
    pub fn program_cache(&self) -> &ShaderProgramCache {
        &self.compiler.programs
    }

    // ── Render system ────────────────────────────────────────────────────────

    /// Switches to `next`, tearing down every PSO through `previous`.
    pub fn change_render_system(
        &mut self,
        previous: Option<&mut dyn RenderSystem>,
        next: &dyn RenderSystem,
    ) {
        if let Some(previous) = previous {
            self.clear_shader_cache(previous);
        }

        let caps = next.capabilities();
        self.compiler.profile = caps.detect_profile().unwrap_or_else(|| {
            log::warn!(
                "Render system '{}' supports no known shader profile, keeping {}",
                caps.name,
                self.compiler.profile.name()
            );
            self.compiler.profile
        });
        self.compiler.compute_target = if self.compiler.profile == ShaderProfile::Hlsl {
            caps.best_compute_target()
        } else {
            None
        };
        self.compiler.rs_extensions.clone_from(&caps.extensions);

        log::info!(
            "Compute HLMS using {} profile on '{}'",
            self.compiler.profile.name(),
            caps.name
        );
    }

    /// Destroys every cached PSO and forgets every compiled program.
    ///
    /// Every job's cached index is reset, so the next dispatch recompiles.
    pub fn clear_shader_cache(&mut self, rs: &mut dyn RenderSystem) {
        let mut destroyed = 0usize;
        for entry in self.pso_cache.drain() {
            rs.compute_pso_destroyed(entry.pso.backend);
            destroyed += 1;
        }
        for job in self.jobs.values_mut() {
            job.pso_cache_index = PsoCacheIndex::INVALID;
        }
        self.compiler.programs.clear(rs);
        self.compiler.templates.clear_pieces();

        log::info!("Cleared compute shader cache ({destroyed} PSOs)");
    }

    // ── Job registry ─────────────────────────────────────────────────────────

    /// Registers a job under `name`, replacing any job with the same name.
    pub fn create_compute_job(
        &mut self,
        name: &str,
        ref_name: &str,
        source_file: &str,
        piece_files: &[&str],
    ) -> &mut ComputeJob {
        let id = IdString::new(name);
        let job = ComputeJob::new(
            id,
            ref_name,
            source_file,
            piece_files.iter().map(ToString::to_string).collect(),
        );
        self.jobs.entry(id).insert_entry(job).into_mut()
    }

    pub fn find_compute_job(&mut self, name: &str) -> Result<&mut ComputeJob> {
        self.find_compute_job_no_throw(name)
            .ok_or_else(|| HlmsError::ComputeJobNotFound(name.to_string()))
    }

    pub fn find_compute_job_no_throw(&mut self, name: &str) -> Option<&mut ComputeJob> {
        IdString::lookup(name).and_then(|id| self.jobs.get_mut(&id))
    }

    pub fn destroy_compute_job(&mut self, name: &str) -> Result<()> {
        IdString::lookup(name)
            .and_then(|id| self.jobs.remove(&id))
            .map(|_| ())
            .ok_or_else(|| HlmsError::ComputeJobNotFound(name.to_string()))
    }

    /// Removes every job and clears the PSO cache.
    pub fn destroy_all_compute_jobs(&mut self, rs: &mut dyn RenderSystem) {
        self.clear_shader_cache(rs);
        self.jobs.clear();
    }

    #[must_use]
    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    // ── Dispatch ─────────────────────────────────────────────────────────────

    /// Binds the job's resources and dispatches it, compiling on first use.
    pub fn dispatch(&mut self, name: &str, rs: &mut dyn RenderSystem) -> Result<()> {
        let job = IdString::lookup(name)
            .and_then(|id| self.jobs.get_mut(&id))
            .ok_or_else(|| HlmsError::ComputeJobNotFound(name.to_string()))?;

        if !self.pso_cache.contains(job.pso_cache_index) {
            job.update_auto_properties(&*rs);

            job.pso_cache_index = match self.pso_cache.find(job.properties()) {
                Some(index) => index,
                None => {
                    let pso = self.compiler.compile(job, self.pso_cache.len(), rs)?;
                    self.pso_cache
                        .push(job.properties().clone(), pso)
                }
            };
        }

        let Some(entry) = self.pso_cache.get(job.pso_cache_index) else {
            return Err(HlmsError::Backend(format!(
                "compute job '{}' has no cached PSO",
                job.ref_name()
            )));
        };

        for (&slot, &buffer) in job.const_buffers() {
            rs.bind_const_buffer(slot, buffer)?;
        }

        for (slot, tex) in job.texture_slots().iter().enumerate() {
            let slot = slot as u32;
            match tex {
                Some(TexSlot::Buffer {
                    view,
                    offset,
                    size_bytes,
                }) => view.bind_cs(rs, slot, *offset, *size_bytes)?,
                Some(TexSlot::Texture { texture, sampler }) => {
                    rs.bind_texture(ShaderStage::Compute, slot, *texture)?;
                    if let Some(sampler) = sampler {
                        rs.bind_sampler(ShaderStage::Compute, slot, *sampler)?;
                    }
                }
                None => {}
            }
        }

        for (slot, uav) in job.uav_slots().iter().enumerate() {
            let slot = slot as u32;
            match uav {
                Some(UavSlot::Buffer { range, access }) => {
                    rs.bind_uav_buffer(slot, *range, *access)?;
                }
                Some(UavSlot::Texture(binding)) => rs.bind_uav_texture(slot, binding)?,
                None => {}
            }
        }

        rs.set_compute_pso(entry.pso.backend)?;
        rs.dispatch(entry.pso.num_thread_groups)
    }
}
