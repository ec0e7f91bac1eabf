use crate::material::Material;
use glam::Vec3;
use scenecraft_common::Transform;
use std::sync::Arc;

/// Geometry a mesh draws.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Cube,
    Plane,
    Sphere,
    /// A part of an imported model file.
    Imported { source: String, part: String },
}

#[derive(Debug, Clone)]
pub struct MeshData {
    pub geometry: Geometry,
    /// Material name assigned by the source file, kept across reassignments.
    pub source_material: Option<String>,
    pub material: Option<Arc<Material>>,
    pub vertex_count: usize,
}

impl MeshData {
    pub fn primitive(geometry: Geometry, material: Option<Arc<Material>>) -> Self {
        let vertex_count = match geometry {
            Geometry::Cube => 24,
            Geometry::Plane => 4,
            Geometry::Sphere => 33 * 17,
            Geometry::Imported { .. } => 0,
        };
        Self {
            geometry,
            source_material: material.as_ref().map(|m| m.name.clone()),
            material,
            vertex_count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub intensity: f32,
    pub color: Vec3,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            intensity: 1.0,
            color: Vec3::ONE,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ObjectKind {
    Group,
    Empty,
    Mesh(MeshData),
    PointLight(Light),
}

impl ObjectKind {
    pub fn label(&self) -> &'static str {
        match self {
            ObjectKind::Group => "group",
            ObjectKind::Empty => "empty",
            ObjectKind::Mesh(_) => "mesh",
            ObjectKind::PointLight(_) => "light",
        }
    }
}

/// A renderable object with a local transform and owned children.
#[derive(Debug, Clone)]
pub struct Object3D {
    pub name: String,
    pub kind: ObjectKind,
    pub transform: Transform,
    pub visible: bool,
    pub children: Vec<Object3D>,
}

impl Object3D {
    pub fn new(name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            name: name.into(),
            kind,
            transform: Transform::IDENTITY,
            visible: true,
            children: Vec::new(),
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, ObjectKind::Group)
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, ObjectKind::Empty)
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_child(mut self, child: Object3D) -> Self {
        self.children.push(child);
        self
    }

    pub fn add(&mut self, child: Object3D) {
        self.children.push(child);
    }

    pub fn is_mesh(&self) -> bool {
        matches!(self.kind, ObjectKind::Mesh(_))
    }

    pub fn mesh(&self) -> Option<&MeshData> {
        match &self.kind {
            ObjectKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    /// Depth-first, parent before children.
    pub fn traverse<'a>(&'a self, visit: &mut impl FnMut(&'a Object3D)) {
        visit(self);
        for child in &self.children {
            child.traverse(visit);
        }
    }

    pub fn traverse_mut(&mut self, visit: &mut impl FnMut(&mut Object3D)) {
        visit(self);
        for child in &mut self.children {
            child.traverse_mut(visit);
        }
    }

    /// Visit every mesh in traversal order.
    pub fn for_each_mesh_mut(&mut self, visit: &mut impl FnMut(&mut MeshData)) {
        self.traverse_mut(&mut |object| {
            if let ObjectKind::Mesh(mesh) = &mut object.kind {
                visit(mesh);
            }
        });
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Object3D> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_by_name(name))
    }

    pub fn find_by_name_mut(&mut self, name: &str) -> Option<&mut Object3D> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_by_name_mut(name))
    }

    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.traverse(&mut |o| {
            if o.is_mesh() {
                count += 1;
            }
        });
        count
    }

    pub fn rotate_local(&mut self, axis: Vec3, radians: f32) {
        self.transform.rotate_local(axis, radians);
    }

    pub fn rotate_world(&mut self, axis: Vec3, radians: f32) {
        self.transform.rotate_world(axis, radians);
    }
}
