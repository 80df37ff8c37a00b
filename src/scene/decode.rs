//! Field decoding for the scene format.
//!
//! Floats travel as the unsigned integer holding their IEEE-754 bit pattern, so
//! values round-trip exactly. Array elements that are not unsigned integers keep
//! the default component.

use glam::{Quat, Vec3, Vec4};
use serde_json::Value;

use crate::scene::item::Aabb;

#[inline]
pub(crate) fn decode_u32(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|v| u32::try_from(v).ok())
}

#[inline]
pub(crate) fn decode_float(value: &Value) -> Option<f32> {
    decode_u32(value).map(f32::from_bits)
}

fn decode_components<const N: usize>(array: &[Value], mut out: [f32; N]) -> [f32; N] {
    for (slot, value) in out.iter_mut().zip(array) {
        if let Some(f) = decode_float(value) {
            *slot = f;
        }
    }
    out
}

pub(crate) fn decode_vec3(array: &[Value]) -> Vec3 {
    Vec3::from_array(decode_components(array, [0.0; 3]))
}

pub(crate) fn decode_vec4(array: &[Value]) -> Vec4 {
    Vec4::from_array(decode_components(array, [0.0; 4]))
}

/// Element order is `[w, x, y, z]`; missing elements come from identity.
pub(crate) fn decode_quat(array: &[Value]) -> Quat {
    let [w, x, y, z] = decode_components(array, [1.0, 0.0, 0.0, 0.0]);
    Quat::from_xyzw(x, y, z, w)
}

/// `[center, half_size]`; any other shape keeps `default`.
pub(crate) fn decode_aabb(array: &[Value], default: Aabb) -> Aabb {
    match array {
        [center, half_size] => Aabb::new(
            center.as_array().map_or(Vec3::ZERO, |a| decode_vec3(a)),
            half_size.as_array().map_or(Vec3::ZERO, |a| decode_vec3(a)),
        ),
        _ => default,
    }
}

pub(crate) fn get_array<'a>(object: &'a Value, key: &str) -> Option<&'a [Value]> {
    object.get(key).and_then(Value::as_array).map(Vec::as_slice)
}

pub(crate) fn get_bool(object: &Value, key: &str) -> Option<bool> {
    object.get(key).and_then(Value::as_bool)
}

pub(crate) fn get_u32(object: &Value, key: &str) -> Option<u32> {
    object.get(key).and_then(decode_u32)
}

pub(crate) fn get_float(object: &Value, key: &str) -> Option<f32> {
    object.get(key).and_then(decode_float)
}

pub(crate) fn get_str<'a>(object: &'a Value, key: &str) -> Option<&'a str> {
    object.get(key).and_then(Value::as_str)
}
