//! Error Types
//!
//! This module defines the error types used throughout the crate.
//!
//! # Overview
//!
//! The main error type [`HlmsError`] covers every failure that unwinds out of an
//! operation:
//! - Malformed scene documents and unresolvable node hierarchies
//! - Compute jobs with an incomplete dispatch shape
//! - Out-of-range buffer views
//! - Missing templates, jobs and backend failures
//!
//! Template syntax errors are reported separately through [`TemplateError`]. They
//! are never fatal to a dispatch: the compute HLMS logs them and produces a
//! pipeline without a program.
//!
//! # Usage
//!
//! ```rust,ignore
//! use hlms::errors::{HlmsError, Result};
//!
//! fn import() -> Result<()> {
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The main error type for the crate.
#[derive(Error, Debug)]
pub enum HlmsError {
    // ========================================================================
    // Scene Import Errors
    // ========================================================================
    /// The scene document is not valid JSON.
    #[error("Invalid JSON string in file {file}: {source}")]
    SceneParse {
        /// Logical name of the imported file
        file: String,
        #[source]
        source: serde_json::Error,
    },

    /// A `scene_nodes` entry has no `node` object.
    #[error("Object 'node' must be present in a scene_node. SceneNode: {index} File: {file}")]
    MissingNodeObject {
        /// Position of the entry in `scene_nodes`
        index: usize,
        /// Logical name of the imported file
        file: String,
    },

    /// A node names a parent that does not exist in the document.
    #[error(
        "Node {node} is child of {parent} but we could not find it or create it. \
         File {file} is malformed"
    )]
    UnresolvableParent {
        /// Index of the child node
        node: usize,
        /// Declared parent index
        parent: usize,
        /// Logical name of the imported file
        file: String,
    },

    /// Following `parent_id` from a node loops back onto itself.
    #[error("Node {node} is part of a parent_id cycle. File {file} is malformed")]
    CyclicParent {
        /// Index of the node whose parent was already being resolved
        node: usize,
        /// Logical name of the imported file
        file: String,
    },

    // ========================================================================
    // Compute Errors
    // ========================================================================
    /// Thread-group size or dispatch size has a zero component.
    #[error(
        "Compute job '{job}' has threads_per_group {threads_per_group:?} and \
         num_thread_groups {num_thread_groups:?}. Set threads_per_group_x/y/z and \
         num_thread_groups_x/y/z from code, or use @pset( threads_per_group_x, 64 ) \
         in the template"
    )]
    InvalidDispatchShape {
        /// Job name
        job: String,
        /// Threads per group read from the compiled properties
        threads_per_group: [u32; 3],
        /// Thread groups read from the compiled properties
        num_thread_groups: [u32; 3],
    },

    /// No compute job is registered under the given name.
    #[error("Compute job with name {0} not found")]
    ComputeJobNotFound(String),

    /// The resource provider has no template or piece file with this name.
    #[error("Template file not found: {0}")]
    TemplateNotFound(String),

    // ========================================================================
    // Buffer Errors
    // ========================================================================
    /// The requested view does not fit in the owning buffer.
    #[error(
        "Buffer range out of bounds: offset {offset}, size {size_bytes}, buffer size {buffer_size}"
    )]
    BufferRangeOutOfBounds {
        /// Start of the view in bytes
        offset: u64,
        /// Requested size in bytes (0 = rest of buffer)
        size_bytes: u64,
        /// Total size of the owning buffer
        buffer_size: u64,
    },

    /// Emulated texture buffers can only repack whole texels.
    #[error("Emulated texture buffer range of {size_bytes} bytes is not a multiple of {texel_bytes}")]
    MisalignedEmulatedRange {
        /// Resolved view size in bytes
        size_bytes: u64,
        /// Bytes per texel of the emulation image
        texel_bytes: u32,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// A settings file could not be deserialized.
    #[error("Invalid settings file {file}: {reason}")]
    Config {
        /// Path of the settings file
        file: String,
        /// Deserializer message
        reason: String,
    },

    // ========================================================================
    // Backend Errors
    // ========================================================================
    /// A handle does not name a live resource of the render system.
    #[error("Unknown GPU resource: {0}")]
    UnknownResource(String),

    /// The render system rejected an operation.
    #[error("Render system error: {0}")]
    Backend(String),

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A syntax error raised by one of the template preprocessor stages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// A directive could not be parsed or evaluated.
    #[error("Syntax error in @{directive}: {reason} (near \"{excerpt}\")")]
    Syntax {
        /// Directive name without the leading `@`
        directive: &'static str,
        /// What went wrong
        reason: String,
        /// A short excerpt of the template around the failure
        excerpt: String,
    },

    /// Collecting and inserting pieces stopped making progress.
    #[error("Piece insertion did not converge: {remaining} piece markers left")]
    UnresolvedPieces {
        /// Markers left after the last pass
        remaining: usize,
    },
}

/// Alias for `Result<T, HlmsError>`.
pub type Result<T> = std::result::Result<T, HlmsError>;
