use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Resource category served by one provider in the registry.
///
/// The declaration order is the order in which a dependency dictionary
/// resolves its categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    TexturePacks,
    Materials,
    Models,
    Modifiers,
    Nodes,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::TexturePacks,
        Category::Materials,
        Category::Models,
        Category::Modifiers,
        Category::Nodes,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::TexturePacks => "texturePacks",
            Category::Materials => "materials",
            Category::Models => "models",
            Category::Modifiers => "modifiers",
            Category::Nodes => "nodes",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Spatial transform: position, rotation, scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            scale: Vec3::ONE,
        }
    }

    /// Decompose an affine matrix. Shear is discarded.
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, position) = matrix.to_scale_rotation_translation();
        Self {
            position,
            rotation: rotation.normalize(),
            scale,
        }
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Compose `self` (parent) with a child-local transform.
    pub fn mul_transform(&self, child: &Transform) -> Transform {
        Transform::from_matrix(self.to_matrix() * child.to_matrix())
    }

    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.position + self.rotation * (self.scale * point)
    }

    /// Rotate around an axis expressed in this transform's local frame.
    pub fn rotate_local(&mut self, axis: Vec3, radians: f32) {
        self.rotation = (self.rotation * Quat::from_axis_angle(axis, radians)).normalize();
    }

    /// Rotate around an axis expressed in the parent frame.
    pub fn rotate_world(&mut self, axis: Vec3, radians: f32) {
        self.rotation = (Quat::from_axis_angle(axis, radians) * self.rotation).normalize();
    }
}
