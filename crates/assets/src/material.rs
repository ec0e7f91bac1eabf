use crate::dependencies::DependencyDictionary;
use crate::error::AssetError;
use crate::loader::{ConfigLoader, LoadContext, LoaderConfig};
use crate::registry::Registry;
use async_trait::async_trait;
use scenecraft_common::Category;
use scenecraft_render::{Material, MaterialKind, MaterialProperty, parse_color, parse_vector2};
use scenecraft_schema::{Schema, SchemaKey, builtin};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::sync::Arc;

/// Value kind of a known material property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    Color,
    Texture,
    Vector2,
    Array,
}

/// Type of a known property; unknown properties pass through untouched.
pub fn property_type(name: &str) -> Option<PropertyType> {
    Some(match name {
        "color" | "emissive" | "sheenColor" | "attenuationColor" | "specularColor" => {
            PropertyType::Color
        }
        "map" | "lightMap" | "aoMap" | "emissiveMap" | "bumpMap" | "normalMap"
        | "displacementMap" | "roughnessMap" | "metalnessMap" | "alphaMap" | "envMap"
        | "clearcoatMap" | "clearcoatRoughnessMap" | "clearcoatNormalMap" | "sheenColorMap"
        | "sheenRoughnessMap" | "transmissionMap" | "thicknessMap" | "specularIntensityMap"
        | "specularColorMap" | "iridescenceMap" | "anisotropyMap" => PropertyType::Texture,
        "normalScale" | "clearcoatNormalScale" => PropertyType::Vector2,
        "clippingPlanes" => PropertyType::Array,
        _ => return None,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MaterialConfig {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    properties: Mapping,
    extends: Option<String>,
    texture_pack_source: Option<String>,
    #[serde(default)]
    texture_pack_sources: Vec<String>,
    loaded_callback: Option<String>,
}

pub struct MaterialLoader {
    key: String,
    config: MaterialConfig,
}

/// Merge the `extends` chain of `raw` into it.
///
/// Own fields win over inherited ones, `properties` merge per property and
/// texture pack sources are unioned, own sources first.
pub fn resolve_extends(key: &str, raw: Mapping, registry: &Registry) -> Result<Mapping, AssetError> {
    let mut merged = raw;
    let mut visited = vec![key.to_owned()];
    let mut parent_key = extends_of(&merged);
    while let Some(parent) = parent_key {
        if visited.contains(&parent) {
            visited.push(parent);
            return Err(AssetError::ExtendsCycle {
                key: key.to_owned(),
                chain: visited.join(" -> "),
            });
        }
        let Some(parent_config) = registry.config(Category::Materials, &parent) else {
            tracing::warn!(material = key, extends = %parent, "extended material does not exist");
            break;
        };
        parent_key = extends_of(&parent_config);
        visited.push(parent);
        merged = merge_material(merged, &parent_config);
    }
    Ok(merged)
}

fn extends_of(config: &Mapping) -> Option<String> {
    config.get("extends")?.as_str().map(str::to_owned)
}

fn merge_material(own: Mapping, parent: &Mapping) -> Mapping {
    let mut merged = parent.clone();
    let mut sources: Vec<Value> = Vec::new();
    for config in [&own, parent] {
        let single = config.get("texturePackSource").into_iter();
        let many = config
            .get("texturePackSources")
            .and_then(Value::as_sequence)
            .into_iter()
            .flatten();
        for source in single.chain(many) {
            if !source.is_null() && !sources.contains(source) {
                sources.push(source.clone());
            }
        }
    }

    let mut properties = parent
        .get("properties")
        .and_then(Value::as_mapping)
        .cloned()
        .unwrap_or_default();
    if let Some(own_properties) = own.get("properties").and_then(Value::as_mapping) {
        for (name, value) in own_properties {
            properties.insert(name.clone(), value.clone());
        }
    }

    for (field, value) in own {
        merged.insert(field, value);
    }
    if !properties.is_empty() {
        merged.insert("properties".into(), Value::Mapping(properties));
    }
    merged.remove("texturePackSource");
    merged.remove("texturePackSources");
    if !sources.is_empty() {
        merged.insert("texturePackSources".into(), Value::Sequence(sources));
    }
    merged
}

impl MaterialLoader {
    fn referenced_packs(&self) -> Vec<String> {
        let mut packs: Vec<String> = self
            .config
            .texture_pack_source
            .iter()
            .chain(&self.config.texture_pack_sources)
            .cloned()
            .collect();
        for (name, value) in &self.config.properties {
            let is_texture = name
                .as_str()
                .and_then(property_type)
                .is_some_and(|t| t == PropertyType::Texture);
            if !is_texture {
                continue;
            }
            if let Some((pack, _)) = value.as_str().and_then(|v| v.split_once('/')) {
                if !packs.iter().any(|p| p == pack) {
                    packs.push(pack.to_owned());
                }
            }
        }
        packs
    }

    fn process_property(&self, ctx: &LoadContext, name: &str, value: &Value) -> Option<MaterialProperty> {
        // Name processors take precedence over type processors.
        if name == "envMap" {
            let texture = self.lookup_texture(ctx, name, value)?;
            if !texture.is_env_map() {
                tracing::warn!(material = %self.key, texture = %texture.name, "envMap texture is not an environment map");
            }
            return Some(MaterialProperty::Texture(texture));
        }
        match property_type(name) {
            Some(PropertyType::Color) => match parse_color(value) {
                Some(color) => Some(MaterialProperty::Color(color)),
                None => {
                    tracing::warn!(material = %self.key, property = name, "unreadable color");
                    None
                }
            },
            Some(PropertyType::Texture) => self
                .lookup_texture(ctx, name, value)
                .map(MaterialProperty::Texture),
            Some(PropertyType::Vector2) => match parse_vector2(value) {
                Some(v) => Some(MaterialProperty::Vector2(v)),
                None => Some(MaterialProperty::Value(value.clone())),
            },
            Some(PropertyType::Array) => match value {
                Value::Sequence(items) => Some(MaterialProperty::Array(items.clone())),
                other => Some(MaterialProperty::Value(other.clone())),
            },
            None => Some(MaterialProperty::Value(value.clone())),
        }
    }

    fn lookup_texture(
        &self,
        ctx: &LoadContext,
        name: &str,
        value: &Value,
    ) -> Option<Arc<scenecraft_render::Texture>> {
        let reference = value.as_str()?;
        let texture = ctx.texture(reference);
        if texture.is_none() {
            tracing::warn!(material = %self.key, property = name, texture = reference, "texture not found");
        }
        texture
    }
}

#[async_trait]
impl ConfigLoader for MaterialLoader {
    type Output = Material;

    const CATEGORY: Category = Category::Materials;

    fn schema() -> &'static Schema {
        builtin(SchemaKey::Material)
    }

    fn prepare_config(key: &str, raw: Mapping, registry: &Registry) -> Result<Mapping, AssetError> {
        resolve_extends(key, raw, registry)
    }

    fn from_config(config: LoaderConfig, _registry: &Registry) -> Result<Self, AssetError> {
        Ok(Self {
            key: config.key().to_owned(),
            config: config.deserialize()?,
        })
    }

    async fn dependencies(&mut self, _registry: &Registry) -> Result<DependencyDictionary, AssetError> {
        Ok(DependencyDictionary::new()
            .with_keys(Category::TexturePacks, self.referenced_packs())
            .with_keys(Category::Materials, self.config.extends.clone()))
    }

    async fn load(&self, ctx: &LoadContext) -> Result<Material, AssetError> {
        let kind: MaterialKind = self.config.kind.parse().map_err(|message| AssetError::Config {
            category: Category::Materials,
            key: self.key.clone(),
            message,
        })?;
        let mut material = Material::new(self.key.clone(), kind);
        for (name, value) in &self.config.properties {
            let Some(name) = name.as_str() else {
                continue;
            };
            if let Some(property) = self.process_property(ctx, name, value) {
                material.properties.insert(name.to_owned(), property);
            }
        }
        Ok(material)
    }

    fn loaded_callback(&self) -> Option<&str> {
        self.config.loaded_callback.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::ObjectDatabase;
    use crate::texture_pack::TexturePackLoader;
    use glam::Vec3;
    use scenecraft_render::HeadlessBackend;

    const PACKS: &str = "\
wood:
  root: textures/wood
  sources: [oak, oak_normal]
sky:
  type: cubemap
  root: sky
  sources:
    - [px, nx, py, ny, pz, nz]
";

    fn backend() -> HeadlessBackend {
        let mut backend = HeadlessBackend::default()
            .with_file("textures/wood/oak.jpg", "")
            .with_file("textures/wood/oak_normal.jpg", "");
        for face in ["px", "nx", "py", "ny", "pz", "nz"] {
            backend = backend.with_file(format!("sky/{face}.jpg"), "");
        }
        backend
    }

    fn setup(materials: &str) -> (ObjectDatabase<MaterialLoader>, ObjectDatabase<TexturePackLoader>, Registry) {
        let packs = ObjectDatabase::<TexturePackLoader>::from_yaml_str(PACKS).unwrap();
        let mats = ObjectDatabase::<MaterialLoader>::from_yaml_str(materials).unwrap();
        let registry = Registry::builder(Arc::new(backend()))
            .provider(packs.clone())
            .provider(mats.clone())
            .build();
        (mats, packs, registry)
    }

    #[tokio::test]
    async fn extends_merges_properties_and_pack_sources() {
        let (mats, packs, registry) = setup(
            "\
base:
  type: physical
  texturePackSource: wood
  properties:
    color: '#ff0000'
    roughness: 0.5
child:
  extends: base
  texturePackSource: sky
  properties:
    roughness: 0.2
    map: oak
",
        );
        let child = mats.load(&registry, "child").await.unwrap().unwrap();
        assert_eq!(child.name, "child");
        assert_eq!(child.kind, MaterialKind::Physical);
        assert_eq!(child.color(), Some(Vec3::X));
        assert_eq!(
            child.property("roughness"),
            Some(&MaterialProperty::Value(Value::Number(0.2.into())))
        );
        assert_eq!(child.property("map").and_then(|p| p.as_texture()).unwrap().name, "oak");
        assert!(packs.is_config_loaded("wood"));
        assert!(packs.is_config_loaded("sky"));
        assert!(mats.is_config_loaded("base"));
    }

    #[test]
    fn merge_unions_pack_sources_without_duplicates() {
        let own: Mapping = serde_yaml::from_str("texturePackSources: [a, b]").unwrap();
        let parent: Mapping =
            serde_yaml::from_str("texturePackSource: b\ntexturePackSources: [c]").unwrap();
        let merged = merge_material(own, &parent);
        let sources: Vec<Value> = serde_yaml::from_str("[a, b, c]").unwrap();
        assert_eq!(merged.get("texturePackSources"), Some(&Value::Sequence(sources)));
        assert!(merged.get("texturePackSource").is_none());
    }

    #[tokio::test]
    async fn extends_cycle_is_a_hard_error() {
        let (mats, _, registry) = setup("a:\n  extends: b\nb:\n  extends: c\nc:\n  extends: a\n");
        let err = mats.load(&registry, "a").await.unwrap_err();
        match err {
            AssetError::ExtendsCycle { key, chain } => {
                assert_eq!(key, "a");
                assert_eq!(chain, "a -> b -> c -> a");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn explicit_pack_reference_adds_dependency() {
        let (mats, packs, registry) = setup("m:\n  properties:\n    normalMap: wood/oak_normal\n");
        let m = mats.load(&registry, "m").await.unwrap().unwrap();
        assert!(packs.is_config_loaded("wood"));
        assert!(!packs.is_config_loaded("sky"));
        assert_eq!(
            m.property("normalMap").and_then(|p| p.as_texture()).unwrap().name,
            "oak_normal"
        );
    }

    #[tokio::test]
    async fn env_map_resolves_and_missing_textures_are_dropped() {
        let (mats, _, registry) = setup(
            "m:\n  texturePackSources: [sky, wood]\n  properties:\n    envMap: group1\n    aoMap: ghost\n    normalScale: [1, 2]\n",
        );
        let m = mats.load(&registry, "m").await.unwrap().unwrap();
        let env = m.property("envMap").and_then(|p| p.as_texture()).unwrap();
        assert!(env.is_env_map());
        assert!(m.property("aoMap").is_none());
        assert_eq!(
            m.property("normalScale"),
            Some(&MaterialProperty::Vector2(glam::Vec2::new(1.0, 2.0)))
        );
    }

    #[tokio::test]
    async fn missing_parent_is_ignored_with_warning() {
        let (mats, _, registry) = setup("orphan:\n  extends: ghost\n  type: basic\n");
        let m = mats.load(&registry, "orphan").await.unwrap().unwrap();
        assert_eq!(m.kind, MaterialKind::Basic);
    }
}
