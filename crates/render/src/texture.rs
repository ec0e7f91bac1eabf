use serde::Deserialize;
use serde_yaml::Value;
use std::collections::BTreeMap;

/// How a pack entry is sourced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextureKind {
    #[default]
    Texture,
    /// Six face images.
    Cubemap,
    /// One equirectangular HDR image.
    Hdri,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureMapping {
    #[default]
    Uv,
    CubeReflection,
    EquirectangularReflection,
}

impl TextureMapping {
    pub fn for_kind(kind: TextureKind) -> Self {
        match kind {
            TextureKind::Texture => TextureMapping::Uv,
            TextureKind::Cubemap => TextureMapping::CubeReflection,
            TextureKind::Hdri => TextureMapping::EquirectangularReflection,
        }
    }
}

/// Request handed to an [`AssetBackend`](crate::AssetBackend).
#[derive(Debug, Clone, PartialEq)]
pub struct TextureRequest {
    pub name: String,
    pub kind: TextureKind,
    pub sources: Vec<String>,
}

/// Texture metadata. Pixel data stays with the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub name: String,
    pub sources: Vec<String>,
    pub mapping: TextureMapping,
    pub properties: BTreeMap<String, Value>,
}

impl Texture {
    pub fn new(request: TextureRequest) -> Self {
        Self {
            name: request.name,
            mapping: TextureMapping::for_kind(request.kind),
            sources: request.sources,
            properties: BTreeMap::new(),
        }
    }

    /// Usable as an environment map.
    pub fn is_env_map(&self) -> bool {
        matches!(
            self.mapping,
            TextureMapping::CubeReflection | TextureMapping::EquirectangularReflection
        )
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: Value) {
        self.properties.insert(key.into(), value);
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}
