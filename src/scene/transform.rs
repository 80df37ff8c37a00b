use glam::{Affine3A, Mat4, Quat, Vec3};

/// Local position, orientation and scale of a scene node.
///
/// The inherit flags control how the parent's derived transform is combined
/// with this one; position always follows the parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub inherit_orientation: bool,
    pub inherit_scale: bool,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
        inherit_orientation: true,
        inherit_scale: true,
    };

    #[must_use]
    pub fn new() -> Self {
        Self::IDENTITY
    }

    /// Sets the orientation, normalizing it.
    ///
    /// A degenerate (zero-length) quaternion resets to identity.
    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = if rotation.length_squared() > f32::EPSILON {
            rotation.normalize()
        } else {
            Quat::IDENTITY
        };
    }

    #[inline]
    #[must_use]
    pub fn local_matrix(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Combines this local transform with its parent's derived one.
    #[must_use]
    pub fn derive_from(&self, parent: &DerivedTransform) -> DerivedTransform {
        let rotation = if self.inherit_orientation {
            parent.rotation * self.rotation
        } else {
            self.rotation
        };
        let scale = if self.inherit_scale {
            parent.scale * self.scale
        } else {
            self.scale
        };
        DerivedTransform {
            position: parent.rotation * (parent.scale * self.position) + parent.position,
            rotation,
            scale,
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

/// A node transform in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedTransform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl DerivedTransform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    #[inline]
    #[must_use]
    pub fn matrix(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    #[inline]
    #[must_use]
    pub fn matrix_as_mat4(&self) -> Mat4 {
        Mat4::from(self.matrix())
    }
}

impl Default for DerivedTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_rotation_resets_to_identity() {
        let mut t = Transform::new();
        t.set_rotation(Quat::from_xyzw(0.0, 0.0, 0.0, 0.0));
        assert_eq!(t.rotation, Quat::IDENTITY);

        t.set_rotation(Quat::from_xyzw(0.0, 0.0, 0.0, 2.0));
        assert!((t.rotation.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn non_inherited_scale_ignores_parent() {
        let parent = DerivedTransform {
            position: Vec3::new(1.0, 0.0, 0.0),
            rotation: Quat::IDENTITY,
            scale: Vec3::splat(2.0),
        };
        let mut child = Transform::new();
        child.position = Vec3::new(1.0, 0.0, 0.0);

        let inherited = child.derive_from(&parent);
        assert_eq!(inherited.scale, Vec3::splat(2.0));
        assert_eq!(inherited.position, Vec3::new(3.0, 0.0, 0.0));

        child.inherit_scale = false;
        let own = child.derive_from(&parent);
        assert_eq!(own.scale, Vec3::ONE);
        // Position is still placed in the parent's scaled space.
        assert_eq!(own.position, Vec3::new(3.0, 0.0, 0.0));
    }
}
