//! GPU buffer views.

pub mod tex_buffer;

pub use tex_buffer::{TexBuffer, TexBufferStrategy};
