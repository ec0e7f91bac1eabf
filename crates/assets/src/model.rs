use crate::dependencies::DependencyDictionary;
use crate::error::AssetError;
use crate::loader::{ConfigLoader, LoadContext, LoaderConfig};
use crate::registry::Registry;
use async_trait::async_trait;
use glam::Vec3;
use scenecraft_common::Category;
use scenecraft_render::material_utils::{apply_material_array, apply_material_map};
use scenecraft_render::{Material, ModelFormat, Object3D};
use scenecraft_schema::{Schema, SchemaKey, builtin};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelConfig {
    source: String,
    material: Option<String>,
    #[serde(default)]
    materials: Vec<String>,
    #[serde(default)]
    material_map: BTreeMap<String, String>,
    rotate_x: f32,
    rotate_y: f32,
    rotate_z: f32,
    rotate_local: bool,
}

pub struct ModelLoader {
    key: String,
    config: ModelConfig,
}

impl ModelLoader {
    /// `material`, then `materials`, then `materialMap` targets.
    fn required_materials(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        let all = self
            .config
            .material
            .iter()
            .chain(&self.config.materials)
            .chain(self.config.material_map.values());
        for key in all {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
        keys
    }

    fn material(&self, ctx: &LoadContext, key: &str) -> Option<Arc<Material>> {
        let material = ctx.material(key);
        if material.is_none() {
            tracing::warn!(model = %self.key, material = key, "material not available");
        }
        material
    }

    fn apply_materials(&self, ctx: &LoadContext, object: &mut Object3D) {
        let designated = self
            .config
            .material
            .as_deref()
            .or(self.config.materials.first().map(String::as_str));
        let fallback = designated.and_then(|key| self.material(ctx, key));

        if !self.config.material_map.is_empty() {
            let map: BTreeMap<String, Arc<Material>> = self
                .config
                .material_map
                .iter()
                .filter_map(|(original, key)| Some((original.clone(), self.material(ctx, key)?)))
                .collect();
            apply_material_map(object, &map, fallback.as_ref());
            return;
        }

        let default = Arc::new(Material::default());
        let materials: Vec<Arc<Material>> = self
            .config
            .materials
            .iter()
            .map(|key| {
                self.material(ctx, key)
                    .or_else(|| fallback.clone())
                    .unwrap_or_else(|| default.clone())
            })
            .collect();
        apply_material_array(object, &materials, fallback.as_ref());
    }

    /// X, then Y, then Z, in degrees.
    fn apply_rotation(&self, object: &mut Object3D) {
        let turns = [
            (Vec3::X, self.config.rotate_x),
            (Vec3::Y, self.config.rotate_y),
            (Vec3::Z, self.config.rotate_z),
        ];
        for (axis, degrees) in turns {
            if degrees == 0.0 {
                continue;
            }
            let radians = degrees.to_radians();
            if self.config.rotate_local {
                object.rotate_local(axis, radians);
            } else {
                object.rotate_world(axis, radians);
            }
        }
    }
}

#[async_trait]
impl ConfigLoader for ModelLoader {
    type Output = Object3D;

    const CATEGORY: Category = Category::Models;

    fn schema() -> &'static Schema {
        builtin(SchemaKey::Model)
    }

    fn from_config(config: LoaderConfig, _registry: &Registry) -> Result<Self, AssetError> {
        Ok(Self {
            key: config.key().to_owned(),
            config: config.deserialize()?,
        })
    }

    async fn dependencies(&mut self, _registry: &Registry) -> Result<DependencyDictionary, AssetError> {
        Ok(DependencyDictionary::new().with_keys(Category::Materials, self.required_materials()))
    }

    async fn load(&self, ctx: &LoadContext) -> Result<Object3D, AssetError> {
        let format = ModelFormat::from_path(&self.config.source);
        let mut object = ctx.backend().load_model(&self.config.source, format).await?;
        object.name = self.key.clone();
        self.apply_materials(ctx, &mut object);
        self.apply_rotation(&mut object);
        tracing::debug!(model = %self.key, ?format, meshes = object.mesh_count(), "model loaded");
        Ok(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::ObjectDatabase;
    use crate::material::MaterialLoader;
    use glam::Quat;
    use scenecraft_render::HeadlessBackend;

    const CHAIR_OBJ: &str = "\
mtllib chair.mtl
o Seat
v 0 0 0
v 1 0 0
v 1 1 0
usemtl Fabric
f 1 2 3
o Legs
v 0 0 1
v 1 0 1
v 1 1 1
usemtl Metal
f 4 5 6
";
    const CHAIR_MTL: &str = "newmtl Fabric\nKd 1 0 0\nnewmtl Metal\nKd 0.5 0.5 0.5\n";
    const MATERIALS: &str = "red:\n  properties:\n    color: '#ff0000'\nsteel:\n  type: physical\ngrey:\n  type: basic\n";

    fn setup(models: &str) -> (ObjectDatabase<ModelLoader>, ObjectDatabase<MaterialLoader>, Registry) {
        let backend = HeadlessBackend::default()
            .with_file("models/chair.obj", CHAIR_OBJ)
            .with_file("models/chair.mtl", CHAIR_MTL);
        let mats = ObjectDatabase::<MaterialLoader>::from_yaml_str(MATERIALS).unwrap();
        let models = ObjectDatabase::<ModelLoader>::from_yaml_str(models).unwrap();
        let registry = Registry::builder(Arc::new(backend))
            .provider(mats.clone())
            .provider(models.clone())
            .build();
        (models, mats, registry)
    }

    fn assigned(object: &Object3D) -> Vec<Option<String>> {
        object
            .children
            .iter()
            .map(|c| c.mesh().and_then(|m| m.material.as_ref()).map(|m| m.name.clone()))
            .collect()
    }

    #[tokio::test]
    async fn positional_materials_follow_source_material_order() {
        let (models, mats, registry) =
            setup("chair:\n  source: models/chair.obj\n  materials: [red, steel]\n");
        let chair = models.load(&registry, "chair").await.unwrap().unwrap();
        assert_eq!(chair.name, "chair");
        assert_eq!(assigned(&chair), [Some("red".into()), Some("steel".into())]);
        assert!(mats.is_config_loaded("red"));
    }

    #[tokio::test]
    async fn material_map_matches_names_and_falls_back() {
        let (models, _, registry) = setup(
            "chair:\n  source: models/chair.obj\n  material: grey\n  materialMap:\n    Metal: steel\n",
        );
        let chair = models.load(&registry, "chair").await.unwrap().unwrap();
        assert_eq!(assigned(&chair), [Some("grey".into()), Some("steel".into())]);
    }

    #[tokio::test]
    async fn designated_material_covers_unlisted_slots() {
        let (models, _, registry) =
            setup("chair:\n  source: models/chair.obj\n  material: grey\n  materials: [red]\n");
        let chair = models.load(&registry, "chair").await.unwrap().unwrap();
        assert_eq!(assigned(&chair), [Some("red".into()), Some("grey".into())]);
    }

    #[tokio::test]
    async fn rotation_is_applied_in_degrees() {
        let (models, _, registry) = setup("chair:\n  source: models/chair.obj\n  rotateY: 90\n");
        let chair = models.load(&registry, "chair").await.unwrap().unwrap();
        let expected = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        assert!(chair.transform.rotation.abs_diff_eq(expected, 1e-5));
    }

    #[tokio::test]
    async fn local_and_world_rotation_orders_differ() {
        let (models, _, registry) = setup(
            "world:\n  source: models/chair.obj\n  rotateX: 90\n  rotateY: 90\nlocal:\n  source: models/chair.obj\n  rotateX: 90\n  rotateY: 90\n  rotateLocal: true\n",
        );
        let world = models.load(&registry, "world").await.unwrap().unwrap();
        let local = models.load(&registry, "local").await.unwrap().unwrap();
        assert!(!world.transform.rotation.abs_diff_eq(local.transform.rotation, 1e-4));
    }

    #[tokio::test]
    async fn unsupported_format_fails_the_load() {
        let (models, _, registry) = setup("legacy:\n  source: models/old.fbx\n");
        let err = models.load(&registry, "legacy").await.unwrap_err();
        assert!(matches!(err, AssetError::Backend(_)));
    }
}
