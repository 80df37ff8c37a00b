//! Property-driven shader generation and compute pipeline caching.
//!
//! - [`hlms`]: template preprocessor, program dedup cache, compute jobs and the
//!   compute PSO cache
//! - [`buffer`]: texture-buffer views with a texture-emulation fallback
//! - [`render_system`]: the backend seam, with a recording backend and a wgpu one
//! - [`scene`]: scene graph and JSON scene import
//!
//! ```rust,ignore
//! use hlms::{HlmsCompute, HlmsSettings, EmbeddedTemplates, RecordingRenderSystem};
//!
//! let mut rs = RecordingRenderSystem::default();
//! let mut hlms = HlmsCompute::new(HlmsSettings::default(), EmbeddedTemplates);
//! hlms.change_render_system(None, &rs);
//!
//! let job = hlms.create_compute_job("PrefixSum", "PrefixSum", "compute/prefix_sum", &[]);
//! job.set_num_thread_groups(4, 1, 1);
//! hlms.dispatch("PrefixSum", &mut rs)?;
//! ```

pub mod buffer;
pub mod errors;
pub mod hlms;
pub mod render_system;
pub mod scene;
pub mod settings;
pub mod utils;

pub use buffer::{TexBuffer, TexBufferStrategy};
pub use errors::{HlmsError, Result, TemplateError};
pub use hlms::{
    ComputeJob, DirectoryProvider, EmbeddedTemplates, HlmsCompute, MemoryProvider, PropertySet,
    ResourceProvider,
};
pub use render_system::{RecordingRenderSystem, RenderSystem, RenderSystemCapabilities};
pub use scene::{ImportedScene, SceneFormatImporter, SceneGraph};
pub use settings::{HlmsSettings, ShaderProfile, TexBufferSettings};
pub use utils::IdString;
