//! HLMS Settings & Shader Profiles
//!
//! Configuration for the compute HLMS and the texture-buffer emulation path.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use hlms::settings::HlmsSettings;
//!
//! let settings = HlmsSettings {
//!     debug_output: true,
//!     output_path: "shader_dumps".into(),
//!     ..Default::default()
//! };
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{HlmsError, Result};

// ---------------------------------------------------------------------------
// ShaderProfile
// ---------------------------------------------------------------------------

/// Shading language a render system compiles.
///
/// The profile decides which file extension template and piece files carry,
/// and which profile-specific properties are injected before expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShaderProfile {
    Hlsl,
    Glsl,
    Glsles,
    Metal,
    #[default]
    Wgsl,
}

impl ShaderProfile {
    /// Detection order. When several profiles are supported the last one wins.
    pub const DETECTION_ORDER: [ShaderProfile; 5] = [
        ShaderProfile::Hlsl,
        ShaderProfile::Glsles,
        ShaderProfile::Glsl,
        ShaderProfile::Metal,
        ShaderProfile::Wgsl,
    ];

    /// Extension (with the leading dot) of template and piece files.
    #[inline]
    #[must_use]
    pub fn file_extension(self) -> &'static str {
        match self {
            Self::Hlsl => ".hlsl",
            Self::Glsl => ".glsl",
            Self::Glsles => ".glsles",
            Self::Metal => ".metal",
            Self::Wgsl => ".wgsl",
        }
    }

    #[inline]
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Hlsl => "hlsl",
            Self::Glsl => "glsl",
            Self::Glsles => "glsles",
            Self::Metal => "metal",
            Self::Wgsl => "wgsl",
        }
    }
}

/// D3D compute targets, sorted from best to worst.
pub const BEST_D3D_COMPUTE_TARGETS: [&str; 3] = ["cs_5_0", "cs_4_1", "cs_4_0"];

// ---------------------------------------------------------------------------
// HlmsSettings
// ---------------------------------------------------------------------------

/// Configuration of the compute HLMS.
///
/// Missing fields take their defaults when deserialized, so a settings file
/// only needs the values it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HlmsSettings {
    /// Write every expanded compute shader to [`output_path`](Self::output_path).
    pub debug_output: bool,
    /// Directory receiving debug dumps.
    pub output_path: PathBuf,
    /// Exported to templates as the `hlms_high_quality` property.
    pub high_quality: bool,
    /// Overrides the profile-derived extension used to filter piece files.
    pub shader_file_ext: Option<String>,
    pub tex_buffer: TexBufferSettings,
}

impl HlmsSettings {
    /// Loads settings from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| HlmsError::Config {
            file: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

impl Default for HlmsSettings {
    fn default() -> Self {
        Self {
            debug_output: false,
            output_path: PathBuf::from("."),
            high_quality: false,
            shader_file_ext: None,
            tex_buffer: TexBufferSettings::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// TexBufferSettings
// ---------------------------------------------------------------------------

/// Configuration of the texture-emulation fallback for texture buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TexBufferSettings {
    /// Maximum width of the 2D image a buffer is packed into.
    pub max_texture_width: u32,
}

impl Default for TexBufferSettings {
    fn default() -> Self {
        Self {
            max_texture_width: 2048,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_extensions() {
        assert_eq!(ShaderProfile::Glsl.file_extension(), ".glsl");
        assert_eq!(ShaderProfile::Wgsl.file_extension(), ".wgsl");
        assert_eq!(ShaderProfile::Hlsl.name(), "hlsl");
    }

    #[test]
    fn defaults() {
        let s = HlmsSettings::default();
        assert!(!s.debug_output);
        assert!(s.shader_file_ext.is_none());
        assert_eq!(TexBufferSettings::default().max_texture_width, 2048);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let s: HlmsSettings = serde_json::from_str(
            r#"{ "debug_output": true, "tex_buffer": { "max_texture_width": 512 } }"#,
        )
        .unwrap();
        assert!(s.debug_output);
        assert_eq!(s.output_path, PathBuf::from("."));
        assert_eq!(s.tex_buffer.max_texture_width, 512);

        let p: ShaderProfile = serde_json::from_str(r#""glsles""#).unwrap();
        assert_eq!(p, ShaderProfile::Glsles);
    }
}
