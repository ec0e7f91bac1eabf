use crate::error::AssetError;
use crate::loader::{ConfigLoader, LoadContext, LoaderConfig};
use crate::path;
use crate::registry::Registry;
use async_trait::async_trait;
use futures::future::try_join_all;
use scenecraft_common::Category;
use scenecraft_render::{Texture, TextureKind, TextureRequest};
use scenecraft_schema::{Schema, SchemaKey, builtin};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Loaded textures of one pack, by local key.
#[derive(Debug, Clone, Default)]
pub struct TexturePack {
    textures: BTreeMap<String, Arc<Texture>>,
}

impl TexturePack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: impl Into<String>, texture: Arc<Texture>) {
        self.textures.insert(key.into(), texture);
    }

    pub fn get(&self, key: &str) -> Option<Arc<Texture>> {
        self.textures.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.textures.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.textures.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TexturePackConfig {
    #[serde(rename = "type")]
    kind: TextureKind,
    root: Option<String>,
    sources: Value,
    default_extension: String,
    #[serde(default)]
    global_properties: Mapping,
    #[serde(default)]
    properties: BTreeMap<String, Mapping>,
    loaded_one_callback: Option<String>,
    loaded_all_callback: Option<String>,
}

/// One pack entry before loading: local key plus source files.
#[derive(Debug, Clone, PartialEq)]
struct SourceEntry {
    key: String,
    files: Vec<String>,
}

pub struct TexturePackLoader {
    key: String,
    config: TexturePackConfig,
}

impl TexturePackLoader {
    fn entries(&self) -> Result<Vec<SourceEntry>, AssetError> {
        let malformed = |message: &str| AssetError::Config {
            category: Category::TexturePacks,
            key: self.key.clone(),
            message: message.to_owned(),
        };
        let files_of = |value: &Value| -> Result<Vec<String>, AssetError> {
            match value {
                Value::String(s) => Ok(vec![s.clone()]),
                Value::Sequence(items) => items
                    .iter()
                    .map(|v| {
                        v.as_str()
                            .map(str::to_owned)
                            .ok_or_else(|| malformed("texture sources must be strings"))
                    })
                    .collect(),
                _ => Err(malformed("texture source must be a string or a list")),
            }
        };

        let mut entries = Vec::new();
        match &self.config.sources {
            Value::Sequence(items) => {
                for (index, item) in items.iter().enumerate() {
                    let files = self.sanitize(files_of(item)?);
                    let key = match item {
                        Value::Sequence(_) => format!("group{}", index + 1),
                        _ => files.first().map(|f| path::file_stem(f)).unwrap_or_default(),
                    };
                    entries.push(SourceEntry { key, files });
                }
            }
            Value::Mapping(map) => {
                for (key, item) in map {
                    let key = key
                        .as_str()
                        .ok_or_else(|| malformed("texture keys must be strings"))?;
                    entries.push(SourceEntry {
                        key: key.to_owned(),
                        files: self.sanitize(files_of(item)?),
                    });
                }
            }
            _ => return Err(malformed("sources must be a list or a mapping")),
        }
        Ok(entries)
    }

    /// Apply `defaultExtension` and keep one file unless this is a cubemap.
    fn sanitize(&self, files: Vec<String>) -> Vec<String> {
        let extension = self.config.default_extension.trim_start_matches('.');
        let mut files: Vec<String> = files
            .into_iter()
            .map(|f| path::with_default_extension(&f, extension))
            .collect();
        if self.config.kind != TextureKind::Cubemap {
            files.truncate(1);
        }
        files
    }
}

#[async_trait]
impl ConfigLoader for TexturePackLoader {
    type Output = TexturePack;

    const CATEGORY: Category = Category::TexturePacks;

    fn schema() -> &'static Schema {
        builtin(SchemaKey::TexturePack)
    }

    fn from_config(config: LoaderConfig, _registry: &Registry) -> Result<Self, AssetError> {
        Ok(Self {
            key: config.key().to_owned(),
            config: config.deserialize()?,
        })
    }

    async fn load(&self, ctx: &LoadContext) -> Result<TexturePack, AssetError> {
        let root = self.config.root.as_deref();
        let requests = self.entries()?.into_iter().map(|entry| {
            let request = TextureRequest {
                name: entry.key.clone(),
                kind: self.config.kind,
                sources: entry.files.iter().map(|f| path::join(root, f)).collect(),
            };
            async move {
                let texture = ctx.backend().load_texture(request).await?;
                Ok::<_, AssetError>((entry.key, texture))
            }
        });
        let textures = try_join_all(requests).await?;

        let mut pack = TexturePack::new();
        for (key, mut texture) in textures {
            for (name, value) in &self.config.global_properties {
                if let Some(name) = name.as_str() {
                    texture.set_property(name, value.clone());
                }
            }
            if let Some(own) = self.config.properties.get(&key) {
                for (name, value) in own {
                    if let Some(name) = name.as_str() {
                        texture.set_property(name, value.clone());
                    }
                }
            }
            let texture = Arc::new(texture);
            ctx.invoke_callback(
                self.config.loaded_one_callback.as_deref(),
                Category::TexturePacks,
                &key,
                texture.clone(),
            );
            pack.add(key, texture);
        }
        for key in self.config.properties.keys() {
            if !pack.contains(key) {
                tracing::warn!(pack = %self.key, texture = %key, "properties for unknown texture");
            }
        }
        tracing::debug!(pack = %self.key, textures = pack.len(), "texture pack loaded");
        Ok(pack)
    }

    fn loaded_callback(&self) -> Option<&str> {
        self.config.loaded_all_callback.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::ObjectDatabase;
    use crate::registry::LoadEvent;
    use scenecraft_render::{HeadlessBackend, TextureMapping};
    use std::sync::Mutex;

    fn registry(db: &ObjectDatabase<TexturePackLoader>, backend: HeadlessBackend) -> Registry {
        Registry::builder(Arc::new(backend)).provider(db.clone()).build()
    }

    #[tokio::test]
    async fn list_sources_use_file_stems_and_default_extension() {
        let db = ObjectDatabase::<TexturePackLoader>::from_yaml_str(
            "wood:\n  root: textures/wood\n  sources: [oak, walnut.png]\n",
        )
        .unwrap();
        let backend = HeadlessBackend::default()
            .with_file("textures/wood/oak.jpg", "")
            .with_file("textures/wood/walnut.png", "");
        let registry = registry(&db, backend);
        let pack = db.load(&registry, "wood").await.unwrap().unwrap();
        assert_eq!(pack.keys().collect::<Vec<_>>(), ["oak", "walnut"]);
        assert_eq!(pack.get("oak").unwrap().sources, ["textures/wood/oak.jpg"]);
        assert_eq!(pack.get("oak").unwrap().mapping, TextureMapping::Uv);
    }

    #[tokio::test]
    async fn cubemap_list_entry_becomes_group_with_cube_mapping() {
        let db = ObjectDatabase::<TexturePackLoader>::from_yaml_str(
            "sky:\n  type: cubemap\n  root: sky\n  sources:\n    - [px, nx, py, ny, pz, nz]\n",
        )
        .unwrap();
        let mut backend = HeadlessBackend::default();
        for face in ["px", "nx", "py", "ny", "pz", "nz"] {
            backend = backend.with_file(format!("sky/{face}.jpg"), "");
        }
        let registry = registry(&db, backend);
        let pack = db.load(&registry, "sky").await.unwrap().unwrap();
        let group = pack.get("group1").unwrap();
        assert_eq!(group.sources.len(), 6);
        assert_eq!(group.mapping, TextureMapping::CubeReflection);
        assert!(group.is_env_map());
    }

    #[tokio::test]
    async fn mapping_sources_keep_keys_and_apply_properties() {
        let db = ObjectDatabase::<TexturePackLoader>::from_yaml_str(
            "studio:\n  type: hdri\n  sources:\n    env: studio_small\n  globalProperties:\n    flipY: false\n  properties:\n    env:\n      flipY: true\n      anisotropy: 4\n",
        )
        .unwrap();
        let backend = HeadlessBackend::default().with_file("studio_small.hdr", "");
        let registry = registry(&db, backend);
        let pack = db.load(&registry, "studio").await.unwrap().unwrap();
        let env = pack.get("env").unwrap();
        assert_eq!(env.mapping, TextureMapping::EquirectangularReflection);
        assert_eq!(env.property("flipY"), Some(&Value::Bool(true)));
        assert_eq!(env.property("anisotropy"), Some(&Value::Number(4.into())));
    }

    #[tokio::test]
    async fn global_properties_reach_every_texture() {
        let db = ObjectDatabase::<TexturePackLoader>::from_yaml_str(
            "tiles:\n  sources: [a, b]\n  globalProperties:\n    wrapS: repeat\n",
        )
        .unwrap();
        let backend = HeadlessBackend::default()
            .with_file("a.jpg", "")
            .with_file("b.jpg", "");
        let registry = registry(&db, backend);
        let pack = db.load(&registry, "tiles").await.unwrap().unwrap();
        for key in ["a", "b"] {
            assert_eq!(
                pack.get(key).unwrap().property("wrapS"),
                Some(&Value::String("repeat".into()))
            );
        }
    }

    #[tokio::test]
    async fn vector_global_properties_are_copied() {
        let db = ObjectDatabase::<TexturePackLoader>::from_yaml_str(
            "tiles:\n  sources: [a]\n  globalProperties:\n    repeat: [2, 2]\n",
        )
        .unwrap();
        let registry = registry(&db, HeadlessBackend::default().with_file("a.jpg", ""));
        let pack = db.load(&registry, "tiles").await.unwrap().unwrap();
        let repeat: Value = serde_yaml::from_str("[2, 2]").unwrap();
        assert_eq!(pack.get("a").unwrap().property("repeat"), Some(&repeat));
    }

    #[tokio::test]
    async fn callbacks_fire_per_texture_and_per_pack() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let one = seen.clone();
        let all = seen.clone();
        let db = ObjectDatabase::<TexturePackLoader>::from_yaml_str(
            "tiles:\n  sources: [a, b]\n  loadedOneCallback: one\n  loadedAllCallback: all\n",
        )
        .unwrap();
        let registry = Registry::builder(Arc::new(
            HeadlessBackend::default()
                .with_file("a.jpg", "")
                .with_file("b.jpg", ""),
        ))
        .provider(db.clone())
        .callback("one", move |e: &LoadEvent| {
            one.lock().unwrap().push(format!("one:{}", e.key));
        })
        .callback("all", move |e: &LoadEvent| {
            let pack = e.downcast::<TexturePack>().unwrap();
            all.lock().unwrap().push(format!("all:{}:{}", e.key, pack.len()));
        })
        .build();
        db.load(&registry, "tiles").await.unwrap();
        assert_eq!(*seen.lock().unwrap(), ["one:a", "one:b", "all:tiles:2"]);
    }

    #[tokio::test]
    async fn missing_file_fails_the_pack() {
        let db = ObjectDatabase::<TexturePackLoader>::from_yaml_str("bad:\n  sources: [ghost]\n")
            .unwrap();
        let registry = registry(&db, HeadlessBackend::default());
        let err = db.load(&registry, "bad").await.unwrap_err();
        assert!(matches!(err, AssetError::Backend(_)));
    }
}
