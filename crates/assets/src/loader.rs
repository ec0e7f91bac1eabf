use crate::dependencies::DependencyDictionary;
use crate::error::AssetError;
use crate::registry::{LoadEvent, Registry, Resource};
use crate::texture_pack::TexturePack;
use async_trait::async_trait;
use scenecraft_common::Category;
use scenecraft_render::{AssetBackend, Material, Texture};
use scenecraft_schema::Schema;
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};
use std::sync::Arc;

/// Builds one object of a category from its validated config.
///
/// The database creates a fresh loader per load: `prepare_config`, schema
/// validation, `from_config`, `dependencies`, then `load`.
#[async_trait]
pub trait ConfigLoader: Sized + Send + Sync + 'static {
    type Output: Send + Sync + 'static;

    const CATEGORY: Category;

    fn schema() -> &'static Schema;

    /// Rewrite the raw config before validation.
    fn prepare_config(
        _key: &str,
        raw: Mapping,
        _registry: &Registry,
    ) -> Result<Mapping, AssetError> {
        Ok(raw)
    }

    fn from_config(config: LoaderConfig, registry: &Registry) -> Result<Self, AssetError>;

    async fn dependencies(
        &mut self,
        _registry: &Registry,
    ) -> Result<DependencyDictionary, AssetError> {
        Ok(DependencyDictionary::new())
    }

    async fn load(&self, ctx: &LoadContext) -> Result<Self::Output, AssetError>;

    /// Callback invoked with the cached object once the load succeeded.
    fn loaded_callback(&self) -> Option<&str> {
        None
    }
}

/// A validated config with schema-aware accessors.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    category: Category,
    key: String,
    values: Mapping,
    schema: &'static Schema,
}

impl LoaderConfig {
    /// Validate `values`, writing schema defaults into it.
    pub fn validated(
        category: Category,
        key: impl Into<String>,
        mut values: Mapping,
        schema: &'static Schema,
    ) -> Result<Self, AssetError> {
        let key = key.into();
        if let Err(source) = schema.validate(&mut values) {
            return Err(AssetError::Validation {
                category,
                key,
                source,
            });
        }
        Ok(Self {
            category,
            key,
            values,
            schema,
        })
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn values(&self) -> &Mapping {
        &self.values
    }

    /// Field value, else the schema default.
    pub fn get_value(&self, field: &str) -> Option<Value> {
        match self.values.get(field) {
            Some(value) if !value.is_null() => Some(value.clone()),
            _ => self.schema.default_value(&self.values, field),
        }
    }

    /// Field value, else the schema default, else `default`.
    pub fn get_value_or(&self, field: &str, default: Value) -> Value {
        self.get_value(field).unwrap_or(default)
    }

    pub fn get_str(&self, field: &str) -> Option<String> {
        self.get_value(field)
            .and_then(|v| v.as_str().map(str::to_owned))
    }

    /// Deserialize into a typed config.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, AssetError> {
        serde_yaml::from_value(Value::Mapping(self.values.clone())).map_err(|e| {
            AssetError::Config {
                category: self.category,
                key: self.key.clone(),
                message: e.to_string(),
            }
        })
    }
}

/// What a loader sees while building its object.
pub struct LoadContext {
    key: String,
    registry: Registry,
    dependencies: DependencyDictionary,
}

impl LoadContext {
    pub fn new(key: impl Into<String>, registry: Registry, dependencies: DependencyDictionary) -> Self {
        Self {
            key: key.into(),
            registry,
            dependencies,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn backend(&self) -> &Arc<dyn AssetBackend> {
        self.registry.backend()
    }

    pub fn dependencies(&self) -> &DependencyDictionary {
        &self.dependencies
    }

    pub fn object<T: Send + Sync + 'static>(&self, category: Category, key: &str) -> Option<Arc<T>> {
        self.dependencies.get_object(&self.registry, category, key)
    }

    pub fn material(&self, key: &str) -> Option<Arc<Material>> {
        self.object(Category::Materials, key)
    }

    pub fn texture_pack(&self, key: &str) -> Option<Arc<TexturePack>> {
        self.object(Category::TexturePacks, key)
    }

    /// Resolve `pack/texture`, or a bare texture key searched over every
    /// referenced pack in order.
    pub fn texture(&self, reference: &str) -> Option<Arc<Texture>> {
        if let Some((pack, texture)) = reference.split_once('/') {
            return self.texture_pack(pack)?.get(texture);
        }
        self.dependencies
            .texture_packs(&self.registry)
            .into_iter()
            .find_map(|(_, pack)| pack.get(reference))
    }

    pub fn invoke_callback(&self, name: Option<&str>, category: Category, key: &str, object: Resource) {
        if let Some(name) = name {
            self.registry
                .invoke_callback(name, &LoadEvent::new(category, key, object));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenecraft_schema::{SchemaKey, builtin};

    fn mapping(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn get_value_falls_back_to_schema_then_caller() {
        let config = LoaderConfig::validated(
            Category::TexturePacks,
            "sky",
            mapping("type: hdri\nsources: [studio]"),
            builtin(SchemaKey::TexturePack),
        )
        .unwrap();
        assert_eq!(config.get_str("defaultExtension").as_deref(), Some("hdr"));
        assert_eq!(config.get_value("root"), None);
        assert_eq!(
            config.get_value_or("root", Value::String("textures".into())),
            Value::String("textures".into())
        );
    }

    #[test]
    fn validation_failure_names_category_and_key() {
        let err = LoaderConfig::validated(
            Category::Models,
            "chair",
            mapping("material: oak"),
            builtin(SchemaKey::Model),
        )
        .unwrap_err();
        match err {
            AssetError::Validation { category, key, source } => {
                assert_eq!(category, Category::Models);
                assert_eq!(key, "chair");
                assert_eq!(source.key, "source");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
