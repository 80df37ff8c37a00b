//! High-Level Material System
//!
//! - [`property`]: interned-key property sets, the template input and cache key
//! - [`template`]: the directive preprocessor expanding templates
//! - [`program_cache`]: compiled programs deduplicated by source hash
//! - [`compute`]: compute jobs, the compute PSO cache and dispatch
//! - [`provider`]: where template and piece files come from

pub mod compute;
pub mod program_cache;
pub mod property;
pub mod provider;
pub mod template;

pub use compute::{ComputeJob, ComputePso, HlmsCompute, PsoCacheIndex, TexSlot, UavSlot};
pub use program_cache::{CompiledProgram, ProgramHandle, ShaderProgramCache};
pub use property::PropertySet;
pub use provider::{DirectoryProvider, EmbeddedTemplates, MemoryProvider, ResourceProvider};
pub use template::ShaderTemplateCompiler;
