//! Property names understood by the compute HLMS.

pub const THREADS_PER_GROUP: [&str; 3] = [
    "threads_per_group_x",
    "threads_per_group_y",
    "threads_per_group_z",
];

pub const NUM_THREAD_GROUPS: [&str; 3] = [
    "num_thread_groups_x",
    "num_thread_groups_y",
    "num_thread_groups_z",
];

pub const NUM_TEXTURE_SLOTS: &str = "num_texture_slots";
pub const MAX_TEXTURE_SLOT: &str = "max_texture_slot";
pub const NUM_UAV_SLOTS: &str = "num_uav_slots";
pub const MAX_UAV_SLOT: &str = "max_uav_slot";

/// Set by a template to skip program creation for this compile only.
pub const DISABLE_STAGE: &str = "hlms_disable_stage";
pub const HIGH_QUALITY: &str = "hlms_high_quality";
/// GLSL version, exported for the GLSL profile.
pub const GL3_PLUS: &str = "GL3Plus";

pub(crate) fn texture_is_buffer(slot: usize) -> String {
    format!("texture{slot}_is_buffer")
}

pub(crate) fn uav_is_buffer(slot: usize) -> String {
    format!("uav{slot}_is_buffer")
}

/// `texture{slot}_width`, `_height`, `_depth`, `_mipmaps`.
pub(crate) fn texture_dimensions(slot: usize) -> [String; 4] {
    ["width", "height", "depth", "mipmaps"].map(|field| format!("texture{slot}_{field}"))
}
