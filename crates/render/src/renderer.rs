use crate::object::{Object3D, ObjectKind};
use glam::Vec3;
use scenecraft_common::Transform;
use std::fmt::Write as _;

/// Camera/view configuration for rendering.
#[derive(Debug, Clone, Copy)]
pub struct RenderView {
    /// Camera position in world space.
    pub eye: Vec3,
    /// Point the camera is looking at.
    pub target: Vec3,
    /// Field of view in degrees.
    pub fov_degrees: f32,
}

impl Default for RenderView {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 10.0, 10.0),
            target: Vec3::ZERO,
            fov_degrees: 60.0,
        }
    }
}

/// One visible object in world space.
#[derive(Debug, Clone)]
pub struct SceneItem {
    /// Slash-separated names from the scene root.
    pub path: String,
    pub kind: &'static str,
    pub world: Transform,
    pub material: Option<String>,
}

/// Flattened render input.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub items: Vec<SceneItem>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flatten a visible hierarchy under `parent`. Hidden subtrees are skipped.
    pub fn push_object(&mut self, prefix: &str, object: &Object3D, parent: &Transform) {
        if !object.visible {
            return;
        }
        let world = parent.mul_transform(&object.transform);
        let path = if prefix.is_empty() {
            object.name.clone()
        } else {
            format!("{prefix}/{}", object.name)
        };
        let material = match &object.kind {
            ObjectKind::Mesh(mesh) => mesh.material.as_ref().map(|m| m.name.clone()),
            _ => None,
        };
        self.items.push(SceneItem {
            path: path.clone(),
            kind: object.kind.label(),
            world,
            material,
        });
        for child in &object.children {
            self.push_object(&path, child, &world);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn find(&self, path: &str) -> Option<&SceneItem> {
        self.items.iter().find(|i| i.path == path)
    }
}

/// Renderer-agnostic interface. All renderers implement this trait.
///
/// A renderer only reads the scene snapshot; the graph owns the objects.
pub trait Renderer {
    /// The output type produced by this renderer.
    type Output;

    /// Render one frame from the given scene and view.
    fn render(&self, scene: &Scene, view: &RenderView) -> Self::Output;
}

/// Produces a human-readable listing of a scene.
#[derive(Debug, Default)]
pub struct DebugTextRenderer;

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render(&self, scene: &Scene, view: &RenderView) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Scene ({} objects) ===", scene.len());
        let _ = writeln!(
            out,
            "Camera: eye=({:.1}, {:.1}, {:.1}) target=({:.1}, {:.1}, {:.1}) fov={:.0}",
            view.eye.x,
            view.eye.y,
            view.eye.z,
            view.target.x,
            view.target.y,
            view.target.z,
            view.fov_degrees
        );

        for item in &scene.items {
            let p = item.world.position;
            let _ = write!(
                out,
                "  {} [{}] pos=({:.2}, {:.2}, {:.2})",
                item.path, item.kind, p.x, p.y, p.z
            );
            if let Some(material) = &item.material {
                let _ = write!(out, " material={material}");
            }
            out.push('\n');
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Geometry, MeshData};

    #[test]
    fn debug_renderer_empty_scene() {
        let output = DebugTextRenderer::new().render(&Scene::new(), &RenderView::default());
        assert!(output.contains("0 objects"));
    }

    #[test]
    fn snapshot_composes_world_transforms_and_skips_hidden() {
        let mut hidden = Object3D::empty("hidden");
        hidden.visible = false;
        let root = Object3D::group("table")
            .with_transform(Transform::from_position(Vec3::new(1.0, 0.0, 0.0)))
            .with_child(
                Object3D::new(
                    "top",
                    ObjectKind::Mesh(MeshData::primitive(Geometry::Cube, None)),
                )
                .with_transform(Transform::from_position(Vec3::new(0.0, 2.0, 0.0))),
            )
            .with_child(hidden.with_child(Object3D::empty("inner")));

        let mut scene = Scene::new();
        scene.push_object("", &root, &Transform::IDENTITY);
        assert_eq!(scene.len(), 2);
        let top = scene.find("table/top").unwrap();
        assert!(top.world.position.abs_diff_eq(Vec3::new(1.0, 2.0, 0.0), 1e-5));
        assert!(scene.find("table/hidden/inner").is_none());

        let output = DebugTextRenderer::new().render(&scene, &RenderView::default());
        assert!(output.contains("table/top [mesh] pos=(1.00, 2.00, 0.00)"));
    }

    #[test]
    fn render_view_default() {
        let view = RenderView::default();
        assert_eq!(view.fov_degrees, 60.0);
        assert_eq!(view.target, Vec3::ZERO);
    }
}
