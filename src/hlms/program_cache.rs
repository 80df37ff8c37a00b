//! Shader Program Cache
//!
//! Deduplicates compiled programs by hashing the **final** expanded source with
//! [`hash_128`]. Jobs whose properties differ only in ways that do not change
//! the generated text share one program, even across unrelated jobs.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::errors::Result;
use crate::render_system::{ProgramDesc, ProgramId, RenderSystem};
use crate::utils::hash_128;

/// A program compiled by the render system.
#[derive(Debug, PartialEq, Eq)]
pub struct CompiledProgram {
    /// Name of the template it was expanded from.
    pub name: String,
    /// Hash of the expanded source.
    pub source_hash: u128,
    pub id: ProgramId,
}

/// Shared handle to a [`CompiledProgram`].
pub type ProgramHandle = Arc<CompiledProgram>;

/// Expanded-source hash → compiled program.
#[derive(Debug, Default)]
pub struct ShaderProgramCache {
    programs: FxHashMap<u128, ProgramHandle>,
}

impl ShaderProgramCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached program for `desc.source`, compiling it on a miss.
    ///
    /// Returns `(program, source_hash)`.
    pub fn get_or_compile(
        &mut self,
        rs: &mut dyn RenderSystem,
        desc: &ProgramDesc<'_>,
    ) -> Result<(ProgramHandle, u128)> {
        let hash = hash_128(desc.source.as_bytes());

        if let Some(program) = self.programs.get(&hash) {
            log::debug!("Reusing compute program {:032x} for '{}'", hash, desc.name);
            return Ok((Arc::clone(program), hash));
        }

        let id = rs.compile_program(desc)?;
        log::debug!("Compiled compute program {:032x} for '{}'", hash, desc.name);

        let program = Arc::new(CompiledProgram {
            name: desc.name.to_string(),
            source_hash: hash,
            id,
        });
        self.programs.insert(hash, Arc::clone(&program));
        Ok((program, hash))
    }

    #[must_use]
    pub fn get(&self, source_hash: u128) -> Option<&ProgramHandle> {
        self.programs.get(&source_hash)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Forgets every program, releasing each one through `rs`.
    pub fn clear(&mut self, rs: &mut dyn RenderSystem) {
        for (_, program) in self.programs.drain() {
            rs.program_destroyed(program.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_system::RecordingRenderSystem;
    use crate::settings::ShaderProfile;

    fn desc<'a>(name: &'a str, source: &'a str) -> ProgramDesc<'a> {
        ProgramDesc {
            name,
            source,
            profile: ShaderProfile::Wgsl,
            target: None,
            entry_point: "main",
        }
    }

    #[test]
    fn identical_source_compiles_once() {
        let mut rs = RecordingRenderSystem::default();
        let mut cache = ShaderProgramCache::new();

        let (a, ha) = cache.get_or_compile(&mut rs, &desc("a", "fn main() {}")).unwrap();
        let (b, hb) = cache.get_or_compile(&mut rs, &desc("b", "fn main() {}")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(ha, hb);
        assert_eq!(rs.program_count(), 1);

        let (c, _) = cache.get_or_compile(&mut rs, &desc("a", "fn main() { }")).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(cache.len(), 2);
        assert_eq!(rs.program_count(), 2);
    }

    #[test]
    fn clear_releases_programs() {
        let mut rs = RecordingRenderSystem::default();
        let mut cache = ShaderProgramCache::new();
        cache.get_or_compile(&mut rs, &desc("a", "fn a() {}")).unwrap();
        cache.get_or_compile(&mut rs, &desc("b", "fn b() {}")).unwrap();
        assert_eq!(rs.live_program_count(), 2);

        cache.clear(&mut rs);
        assert!(cache.is_empty());
        assert_eq!(rs.live_program_count(), 0);
    }
}
