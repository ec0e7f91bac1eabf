use crate::object::{Geometry, MeshData, Object3D, ObjectKind};
use crate::texture::{Texture, TextureRequest};
use async_trait::async_trait;
use glam::{Quat, Vec3};
use scenecraft_common::Transform;
use std::collections::HashMap;
use std::io::{BufReader, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Errors raised by an asset backend. Cheap to clone.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("IO error reading {path}: {message}")]
    Io { path: String, message: String },
    #[error("unsupported model format for {0}")]
    Unsupported(String),
    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },
}

/// Model decoder selected from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    Obj,
    Gltf,
    Fbx,
}

impl ModelFormat {
    /// `fbx` and `gltf`/`glb` by extension; anything else is read as OBJ.
    pub fn from_path(path: &str) -> Self {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("fbx") => ModelFormat::Fbx,
            Some("gltf" | "glb") => ModelFormat::Gltf,
            _ => ModelFormat::Obj,
        }
    }
}

/// File fetching and decoding provided by the host engine.
#[async_trait]
pub trait AssetBackend: Send + Sync {
    async fn load_texture(&self, request: TextureRequest) -> Result<Texture, BackendError>;

    async fn load_model(&self, path: &str, format: ModelFormat) -> Result<Object3D, BackendError>;

    async fn read_text(&self, path: &str) -> Result<String, BackendError>;
}

/// Backend without a GPU: textures are metadata, models are decoded into
/// mesh hierarchies. Files come from an in-memory overlay first, then from
/// disk under `root`.
#[derive(Debug, Clone, Default)]
pub struct HeadlessBackend {
    root: PathBuf,
    files: HashMap<String, Arc<[u8]>>,
}

impl HeadlessBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: HashMap::new(),
        }
    }

    /// Serve `path` from memory.
    pub fn with_file(mut self, path: impl Into<String>, contents: impl AsRef<[u8]>) -> Self {
        self.files
            .insert(normalize(&path.into()), Arc::from(contents.as_ref()));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn read_bytes(&self, path: &str) -> Result<Arc<[u8]>, BackendError> {
        if let Some(bytes) = self.files.get(&normalize(path)) {
            return Ok(bytes.clone());
        }
        let full = self.root.join(path);
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(Arc::from(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BackendError::NotFound(path.to_owned()))
            }
            Err(e) => Err(BackendError::Io {
                path: path.to_owned(),
                message: e.to_string(),
            }),
        }
    }

    async fn exists(&self, path: &str) -> bool {
        self.files.contains_key(&normalize(path))
            || tokio::fs::try_exists(self.root.join(path))
                .await
                .unwrap_or(false)
    }

    async fn load_obj(&self, path: &str) -> Result<Object3D, BackendError> {
        let bytes = self.read_bytes(path).await?;
        let text = String::from_utf8_lossy(&bytes);

        // tobj resolves material libraries synchronously, so fetch them first.
        let dir = Path::new(path).parent().unwrap_or(Path::new(""));
        let mut libraries = HashMap::new();
        for line in text.lines() {
            if let Some(name) = line.trim().strip_prefix("mtllib") {
                let name = name.trim().to_owned();
                let lib_path = dir.join(&name).to_string_lossy().into_owned();
                match self.read_bytes(&lib_path).await {
                    Ok(lib) => {
                        libraries.insert(name, lib);
                    }
                    Err(e) => tracing::warn!(model = path, error = %e, "material library missing"),
                }
            }
        }

        let options = tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        };
        let (models, materials) = tobj::load_obj_buf(
            &mut BufReader::new(Cursor::new(bytes.as_ref())),
            &options,
            |lib| match libraries.get(lib.to_string_lossy().as_ref()) {
                Some(data) => tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(data.as_ref()))),
                None => Err(tobj::LoadError::OpenFileFailed),
            },
        )
        .map_err(|e| BackendError::Parse {
            path: path.to_owned(),
            message: e.to_string(),
        })?;
        let materials = materials.unwrap_or_default();

        let mut root = Object3D::group(file_stem(path));
        for model in models {
            let source_material = model
                .mesh
                .material_id
                .and_then(|id| materials.get(id))
                .map(|m| m.name.clone());
            let mesh = MeshData {
                geometry: Geometry::Imported {
                    source: path.to_owned(),
                    part: model.name.clone(),
                },
                source_material,
                material: None,
                vertex_count: model.mesh.positions.len() / 3,
            };
            root.add(Object3D::new(model.name, ObjectKind::Mesh(mesh)));
        }
        tracing::debug!(model = path, meshes = root.children.len(), "decoded OBJ");
        Ok(root)
    }

    async fn load_gltf(&self, path: &str) -> Result<Object3D, BackendError> {
        let bytes = self.read_bytes(path).await?;
        let document = gltf::Gltf::from_slice(&bytes).map_err(|e| BackendError::Parse {
            path: path.to_owned(),
            message: e.to_string(),
        })?;

        let mut root = Object3D::group(file_stem(path));
        let scene = document
            .default_scene()
            .or_else(|| document.scenes().next());
        if let Some(scene) = scene {
            for node in scene.nodes() {
                root.add(gltf_node(path, &node));
            }
        }
        tracing::debug!(model = path, meshes = root.mesh_count(), "decoded glTF");
        Ok(root)
    }
}

fn gltf_node(path: &str, node: &gltf::Node<'_>) -> Object3D {
    let name = node
        .name()
        .map(str::to_owned)
        .unwrap_or_else(|| format!("node{}", node.index()));
    let (translation, rotation, scale) = node.transform().decomposed();
    let mut object = Object3D::group(name.clone()).with_transform(Transform {
        position: Vec3::from_array(translation),
        rotation: Quat::from_array(rotation),
        scale: Vec3::from_array(scale),
    });

    if let Some(mesh) = node.mesh() {
        let mesh_name = mesh.name().map(str::to_owned).unwrap_or(name);
        for (index, primitive) in mesh.primitives().enumerate() {
            let part = format!("{mesh_name}.{index}");
            let data = MeshData {
                geometry: Geometry::Imported {
                    source: path.to_owned(),
                    part: part.clone(),
                },
                source_material: primitive.material().name().map(str::to_owned),
                material: None,
                vertex_count: primitive
                    .get(&gltf::Semantic::Positions)
                    .map(|accessor| accessor.count())
                    .unwrap_or(0),
            };
            object.add(Object3D::new(part, ObjectKind::Mesh(data)));
        }
    }
    for child in node.children() {
        object.add(gltf_node(path, &child));
    }
    object
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches("./").to_owned()
}

fn file_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_owned())
}

#[async_trait]
impl AssetBackend for HeadlessBackend {
    async fn load_texture(&self, request: TextureRequest) -> Result<Texture, BackendError> {
        for source in &request.sources {
            if !self.exists(source).await {
                return Err(BackendError::NotFound(source.clone()));
            }
        }
        Ok(Texture::new(request))
    }

    async fn load_model(&self, path: &str, format: ModelFormat) -> Result<Object3D, BackendError> {
        match format {
            ModelFormat::Obj => self.load_obj(path).await,
            ModelFormat::Gltf => self.load_gltf(path).await,
            ModelFormat::Fbx => Err(BackendError::Unsupported(path.to_owned())),
        }
    }

    async fn read_text(&self, path: &str) -> Result<String, BackendError> {
        let bytes = self.read_bytes(path).await?;
        String::from_utf8(bytes.to_vec()).map_err(|e| BackendError::Parse {
            path: path.to_owned(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::{TextureKind, TextureMapping};

    const CUBE_OBJ: &str = "\
mtllib chair.mtl
o Seat
v 0 0 0
v 1 0 0
v 1 1 0
usemtl Wood
f 1 2 3
o Leg
v 0 0 1
v 1 0 1
v 1 1 1
usemtl Metal
f 4 5 6
";

    const CUBE_MTL: &str = "newmtl Wood\nKd 0.5 0.3 0.1\nnewmtl Metal\nKd 0.7 0.7 0.7\n";

    #[test]
    fn format_follows_extension() {
        assert_eq!(ModelFormat::from_path("a/b.FBX"), ModelFormat::Fbx);
        assert_eq!(ModelFormat::from_path("scene.glb"), ModelFormat::Gltf);
        assert_eq!(ModelFormat::from_path("scene.gltf"), ModelFormat::Gltf);
        assert_eq!(ModelFormat::from_path("chair.obj"), ModelFormat::Obj);
        assert_eq!(ModelFormat::from_path("noext"), ModelFormat::Obj);
    }

    #[tokio::test]
    async fn decodes_obj_with_materials_from_overlay() {
        let backend = HeadlessBackend::default()
            .with_file("models/chair.obj", CUBE_OBJ)
            .with_file("models/chair.mtl", CUBE_MTL);
        let model = backend
            .load_model("models/chair.obj", ModelFormat::Obj)
            .await
            .unwrap();
        assert_eq!(model.name, "chair");
        let names: Vec<_> = model
            .children
            .iter()
            .map(|c| c.mesh().and_then(|m| m.source_material.clone()))
            .collect();
        assert_eq!(names, [Some("Wood".to_string()), Some("Metal".to_string())]);
    }

    #[tokio::test]
    async fn fbx_is_unsupported() {
        let backend = HeadlessBackend::default().with_file("a.fbx", "");
        let err = backend.load_model("a.fbx", ModelFormat::Fbx).await.unwrap_err();
        assert!(matches!(err, BackendError::Unsupported(_)));
    }

    #[tokio::test]
    async fn texture_requires_every_source() {
        let backend = HeadlessBackend::default().with_file("sky/px.jpg", "");
        let request = TextureRequest {
            name: "sky".into(),
            kind: TextureKind::Cubemap,
            sources: vec!["sky/px.jpg".into(), "sky/nx.jpg".into()],
        };
        let err = backend.load_texture(request.clone()).await.unwrap_err();
        assert_eq!(err, BackendError::NotFound("sky/nx.jpg".into()));

        let backend = backend.with_file("sky/nx.jpg", "");
        let texture = backend.load_texture(request).await.unwrap();
        assert_eq!(texture.mapping, TextureMapping::CubeReflection);
        assert!(texture.is_env_map());
    }

    #[tokio::test]
    async fn reads_text_from_disk_under_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("node.dae"), "<COLLADA/>").unwrap();
        let backend = HeadlessBackend::new(dir.path());
        assert_eq!(backend.read_text("node.dae").await.unwrap(), "<COLLADA/>");
        assert!(matches!(
            backend.read_text("missing.dae").await,
            Err(BackendError::NotFound(_))
        ));
    }
}
