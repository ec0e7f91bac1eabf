//! Engine boundary: scene objects, asset backends and the renderer interface.
//!
//! # Invariants
//! - Renderers read [`Scene`] snapshots; they never mutate scene objects.
//! - Backends only fetch and decode; caching belongs to the asset databases.
//! - A mesh keeps its source material name across material reassignment.

mod backend;
mod material;
pub mod material_utils;
mod object;
mod renderer;
mod texture;

pub use backend::{AssetBackend, BackendError, HeadlessBackend, ModelFormat};
pub use material::{Material, MaterialKind, MaterialProperty, parse_color, parse_vector2};
pub use object::{Geometry, Light, MeshData, Object3D, ObjectKind};
pub use renderer::{DebugTextRenderer, RenderView, Renderer, Scene, SceneItem};
pub use texture::{Texture, TextureKind, TextureMapping, TextureRequest};

pub fn crate_info() -> &'static str {
    "scenecraft-render v0.1.0"
}
