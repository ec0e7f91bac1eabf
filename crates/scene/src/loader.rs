use crate::connection::{ConnectionProperties, SceneNodeConnection};
use crate::node::{PreConnect, SceneNode};
use crate::source::{ObjectSpecification, ObjectType, SceneSource};
use async_trait::async_trait;
use glam::Vec3;
use scenecraft_assets::{
    AssetError, ConfigLoader, DependencyDictionary, LoadContext, LoaderConfig, ModifierConfig,
    ObjectDatabase, Registry,
};
use scenecraft_common::Category;
use scenecraft_render::material_utils::apply_material_array;
use scenecraft_render::{
    AssetBackend, Material, MaterialKind, MaterialProperty, MeshData, Object3D, ObjectKind,
};
use scenecraft_schema::{Schema, SchemaKey, builtin};
use serde::Deserialize;
use serde_yaml::Mapping;
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

pub type NodeDatabase = ObjectDatabase<NodeLoader>;

/// Material of primitives that name none.
static PRIMITIVE_MATERIAL: LazyLock<Arc<Material>> = LazyLock::new(|| {
    Arc::new(
        Material::new("default", MaterialKind::Basic)
            .with_property("color", MaterialProperty::Color(Vec3::new(1.0, 0.0, 0.0))),
    )
});

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeConfig {
    source: String,
    #[serde(default)]
    modifiers: Vec<String>,
    #[serde(default)]
    local_modifiers: Vec<Mapping>,
    #[serde(default)]
    pre_connects: Vec<PreConnect>,
    #[serde(default)]
    connection_properties: BTreeMap<String, ConnectionProperties>,
    #[serde(default)]
    material_map_ignore: Vec<String>,
    on_node_loaded: Option<String>,
}

/// Builds a [`SceneNode`] from a COLLADA source and its node config.
pub struct NodeLoader {
    key: String,
    config: NodeConfig,
    source: Option<Arc<SceneSource>>,
}

impl NodeLoader {
    async fn read_source(
        &self,
        backend: &Arc<dyn AssetBackend>,
    ) -> Result<Arc<SceneSource>, AssetError> {
        if let Some(source) = &self.source {
            return Ok(source.clone());
        }
        let text = backend.read_text(&self.config.source).await?;
        let source = SceneSource::parse(&text).map_err(|e| AssetError::Load {
            category: Category::Nodes,
            key: self.key.clone(),
            message: format!("{}: {e}", self.config.source),
        })?;
        Ok(Arc::new(source))
    }

    /// Distinct pre-connect targets in declaration order.
    fn pre_connect_nodes(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for pre in &self.config.pre_connects {
            if !keys.contains(&pre.node) {
                keys.push(pre.node.clone());
            }
        }
        keys
    }

    fn build_object(&self, ctx: &LoadContext, spec: &ObjectSpecification) -> Option<Object3D> {
        let mut object = match spec.object_type {
            ObjectType::Model => {
                let Some(model) = ctx.object::<Object3D>(Category::Models, &spec.key) else {
                    tracing::warn!(node = %self.key, model = %spec.key, "model not available");
                    return None;
                };
                (*model).clone()
            }
            ObjectType::Primitive(primitive) => Object3D::new(
                &spec.key,
                ObjectKind::Mesh(MeshData::primitive(
                    primitive.geometry(),
                    Some(PRIMITIVE_MATERIAL.clone()),
                )),
            ),
            ObjectType::PointLight => Object3D::new(&spec.key, ObjectKind::PointLight(spec.light)),
            ObjectType::Connection(_) => Object3D::group(&spec.key),
            ObjectType::Empty => Object3D::empty(&spec.key),
        };
        object.name = spec.key.clone();
        object.transform = spec.transform.mul_transform(&object.transform);
        self.apply_materials(ctx, spec, &mut object);
        Some(object)
    }

    /// Referenced materials in slot order; the first one covers the rest.
    fn apply_materials(&self, ctx: &LoadContext, spec: &ObjectSpecification, object: &mut Object3D) {
        let Some(first) = spec.materials.first() else {
            return;
        };
        let fallback = ctx.material(first);
        let materials: Vec<Arc<Material>> = spec
            .materials
            .iter()
            .filter_map(|key| {
                let material = ctx.material(key);
                if material.is_none() {
                    tracing::debug!(node = %self.key, material = %key, "material not loaded");
                }
                material.or_else(|| fallback.clone())
            })
            .collect();
        apply_material_array(object, &materials, fallback.as_ref());
    }
}

#[async_trait]
impl ConfigLoader for NodeLoader {
    type Output = SceneNode;

    const CATEGORY: Category = Category::Nodes;

    fn schema() -> &'static Schema {
        builtin(SchemaKey::Node)
    }

    fn from_config(config: LoaderConfig, _registry: &Registry) -> Result<Self, AssetError> {
        Ok(Self {
            key: config.key().to_owned(),
            config: config.deserialize()?,
            source: None,
        })
    }

    async fn dependencies(&mut self, registry: &Registry) -> Result<DependencyDictionary, AssetError> {
        let source = self.read_source(registry.backend()).await?;
        let dependencies = DependencyDictionary::new()
            .with_keys(
                Category::Materials,
                source.material_keys(&self.config.material_map_ignore),
            )
            .with_keys(Category::Models, source.model_keys())
            .with_keys(Category::Modifiers, self.config.modifiers.iter().cloned())
            .with_keys(Category::Nodes, self.pre_connect_nodes());
        self.source = Some(source);
        Ok(dependencies)
    }

    async fn load(&self, ctx: &LoadContext) -> Result<SceneNode, AssetError> {
        let source = self.read_source(ctx.backend()).await?;
        let mut node = SceneNode::new(&self.key);

        for spec in source.specifications() {
            let Some(object) = self.build_object(ctx, spec) else {
                continue;
            };
            match spec.object_type {
                ObjectType::Connection(kind) => {
                    let mut connection = SceneNodeConnection::new(kind, object);
                    if let Some(properties) = self.config.connection_properties.get(&spec.key) {
                        connection.apply_properties(properties);
                    }
                    node.add_connection(&spec.key, connection);
                }
                _ => node.add_object(&spec.key, object),
            }
        }

        node.pre_connects = self.config.pre_connects.clone();
        for key in &self.config.modifiers {
            match ctx.object::<ModifierConfig>(Category::Modifiers, key) {
                Some(modifier) => node.add_modifier((*modifier).clone()),
                None => tracing::warn!(node = %self.key, modifier = %key, "modifier not available"),
            }
        }
        for (index, raw) in self.config.local_modifiers.iter().enumerate() {
            let key = format!("{}:local{index}", self.key);
            node.add_modifier(ModifierConfig::from_inline(key, raw.clone())?);
        }

        tracing::debug!(
            node = %self.key,
            objects = node.objects().len(),
            connections = node.connections().len(),
            modifiers = node.modifiers().len(),
            "scene node loaded"
        );
        Ok(node)
    }

    fn loaded_callback(&self) -> Option<&str> {
        self.config.on_node_loaded.as_deref()
    }
}
