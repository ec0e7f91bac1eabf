use crate::graph::SceneNodeGraph;
use crate::loader::NodeDatabase;
use scenecraft_assets::{
    AssetError, ConfigLoader, MaterialDatabase, ModelDatabase, ModifierDatabase, ObjectDatabase,
    ProjectConfig, Registry, RegistryBuilder, TexturePackDatabase,
};
use scenecraft_common::Category;
use scenecraft_render::{AssetBackend, HeadlessBackend};
use std::path::Path;
use std::sync::Arc;

/// Every database of a project, wired into one registry.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub project: ProjectConfig,
    pub registry: Registry,
    pub texture_packs: TexturePackDatabase,
    pub materials: MaterialDatabase,
    pub models: ModelDatabase,
    pub modifiers: ModifierDatabase,
    pub nodes: NodeDatabase,
}

impl Workspace {
    pub fn from_project_file(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        Self::from_project(ProjectConfig::from_file(path)?)
    }

    /// Reads assets from disk under the project's asset root.
    pub fn from_project(project: ProjectConfig) -> Result<Self, AssetError> {
        let backend = Arc::new(HeadlessBackend::new(project.asset_root.clone()));
        Self::with_backend(project, backend, |builder| builder)
    }

    /// `configure` may add named callbacks before the registry is built.
    pub fn with_backend(
        project: ProjectConfig,
        backend: Arc<dyn AssetBackend>,
        configure: impl FnOnce(RegistryBuilder) -> RegistryBuilder,
    ) -> Result<Self, AssetError> {
        let texture_packs: TexturePackDatabase = open_database(&project, Category::TexturePacks)?;
        let materials: MaterialDatabase = open_database(&project, Category::Materials)?;
        let models: ModelDatabase = open_database(&project, Category::Models)?;
        let modifiers: ModifierDatabase = open_database(&project, Category::Modifiers)?;
        let nodes: NodeDatabase = open_database(&project, Category::Nodes)?;

        let builder = Registry::builder(backend)
            .provider(texture_packs.clone())
            .provider(materials.clone())
            .provider(models.clone())
            .provider(modifiers.clone())
            .provider(nodes.clone());
        let registry = configure(builder).build();
        tracing::info!(
            texture_packs = texture_packs.len(),
            materials = materials.len(),
            models = models.len(),
            modifiers = modifiers.len(),
            nodes = nodes.len(),
            "workspace opened"
        );
        Ok(Self {
            project,
            registry,
            texture_packs,
            materials,
            models,
            modifiers,
            nodes,
        })
    }

    /// An empty graph resolving pre-connects through this workspace.
    pub fn graph(&self) -> SceneNodeGraph {
        SceneNodeGraph::new(self.registry.clone())
    }

    /// Load `key` with its dependencies and attach it as the central node.
    /// `None` when the key has no config.
    pub async fn assemble(&self, key: &str) -> Result<Option<SceneNodeGraph>, AssetError> {
        let Some(node) = self.nodes.load(&self.registry, key).await? else {
            return Ok(None);
        };
        let mut graph = self.graph();
        graph.add_node((*node).clone());
        Ok(Some(graph))
    }

    /// Project's central node.
    pub async fn assemble_central(&self) -> Result<Option<SceneNodeGraph>, AssetError> {
        match self.project.central_node.clone() {
            Some(key) => self.assemble(&key).await,
            None => Ok(None),
        }
    }
}

fn open_database<L: ConfigLoader>(
    project: &ProjectConfig,
    category: Category,
) -> Result<ObjectDatabase<L>, AssetError> {
    match project.config_path(category) {
        Some(path) => ObjectDatabase::from_file(path),
        None => {
            tracing::debug!(%category, "no config document");
            Ok(ObjectDatabase::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EndpointId, GraphEvent};
    use crate::node::SceneNode;
    use crate::test_support::ROOM;
    use glam::Vec3;
    use std::sync::Mutex;

    const DESK: &str = r##"<COLLADA>
  <library_visual_scenes>
    <visual_scene id="Scene">
      <node name="primitive/cube:top"/>
      <node name="connection/plug:base">
        <matrix>1 0 0 0 0 1 0 -1 0 0 1 0 0 0 0 1</matrix>
      </node>
    </visual_scene>
  </library_visual_scenes>
</COLLADA>"##;

    fn write_project(dir: &Path) -> std::path::PathBuf {
        let write = |name: &str, contents: &str| {
            let path = dir.join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, contents).unwrap();
        };
        write("assets/scenes/room.dae", ROOM);
        write("assets/scenes/desk.dae", DESK);
        write(
            "assets/models/chair.obj",
            "o Seat\nv 0 0 0\nv 1 0 0\nv 1 1 0\nf 1 2 3\n",
        );
        write(
            "configs/materials.yaml",
            "oak:\n  type: standard\nfabric:\n  type: basic\nspare:\n  type: phong\n",
        );
        write("configs/models.yaml", "chair:\n  source: models/chair.obj\n");
        write(
            "configs/nodes.yaml",
            "room:\n  source: scenes/room.dae\n  onNodeLoaded: seen\n  preConnects:\n    - node: desk\n      plugKey: base\n      receiverKey: seat\ndesk:\n  source: scenes/desk.dae\n",
        );
        write(
            "project.yaml",
            "assetRoot: assets\nmaterials: configs/materials.yaml\nmodels: configs/models.yaml\nnodes: configs/nodes.yaml\ncentralNode: room\n",
        );
        dir.join("project.yaml")
    }

    #[tokio::test]
    async fn assembles_the_central_node_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::from_project_file(write_project(dir.path())).unwrap();
        let mut graph = workspace.assemble_central().await.unwrap().unwrap();

        assert_eq!(graph.central(), Some("room"));
        assert!(graph.contains("desk"));
        let seat = EndpointId::new("room", "seat");
        let base = EndpointId::new("desk", "base");
        assert!(graph.has_connection(&seat, &base));

        let scene = graph.scene();
        let top = scene.find("desk/top").unwrap();
        assert!(top.world.position.abs_diff_eq(Vec3::new(6.0, 2.0, 3.0), 1e-4));
        assert!(
            graph
                .drain_events()
                .iter()
                .any(|e| matches!(e, GraphEvent::ConnectionEstablished(_)))
        );
    }

    #[tokio::test]
    async fn callbacks_reach_the_registry() {
        let dir = tempfile::tempdir().unwrap();
        let project = ProjectConfig::from_file(write_project(dir.path())).unwrap();
        let backend = Arc::new(HeadlessBackend::new(project.asset_root.clone()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let workspace = Workspace::with_backend(project, backend, move |builder| {
            builder.callback("seen", move |event| {
                if let Some(node) = event.downcast::<SceneNode>() {
                    sink.lock().unwrap().push(node.key().to_owned());
                }
            })
        })
        .unwrap();
        workspace.assemble("room").await.unwrap();
        assert_eq!(*seen.lock().unwrap(), ["room"]);
    }

    #[tokio::test]
    async fn unknown_node_assembles_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::from_project_file(write_project(dir.path())).unwrap();
        assert!(workspace.assemble("attic").await.unwrap().is_none());
        assert!(workspace.texture_packs.is_empty());
    }
}
