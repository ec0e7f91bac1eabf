use crate::error::AssetError;
use crate::loader::{ConfigLoader, LoadContext, LoaderConfig};
use crate::registry::Registry;
use async_trait::async_trait;
use scenecraft_common::Category;
use scenecraft_schema::{Schema, SchemaKey, builtin};
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};

/// A validated modifier config: schema defaults filled, null fields dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct ModifierConfig {
    key: String,
    values: Mapping,
}

impl ModifierConfig {
    /// Validate an inline config, e.g. a node's `localModifiers` entry.
    pub fn from_inline(key: impl Into<String>, raw: Mapping) -> Result<Self, AssetError> {
        let config = LoaderConfig::validated(Category::Modifiers, key, raw, ModifierLoader::schema())?;
        Ok(Self::sanitized(&config))
    }

    fn sanitized(config: &LoaderConfig) -> Self {
        let mut values = Mapping::new();
        for field in config.values().keys() {
            let Some(name) = field.as_str() else {
                continue;
            };
            if let Some(value) = config.get_value(name) {
                values.insert(field.clone(), value);
            }
        }
        Self {
            key: config.key().to_owned(),
            values,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The `type` tag.
    pub fn kind(&self) -> &str {
        self.get_str("type").unwrap_or_default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.values.get(field)?.as_str()
    }

    pub fn values(&self) -> &Mapping {
        &self.values
    }

    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, AssetError> {
        serde_yaml::from_value(Value::Mapping(self.values.clone())).map_err(|e| AssetError::Config {
            category: Category::Modifiers,
            key: self.key.clone(),
            message: e.to_string(),
        })
    }
}

pub struct ModifierLoader {
    config: LoaderConfig,
}

#[async_trait]
impl ConfigLoader for ModifierLoader {
    type Output = ModifierConfig;

    const CATEGORY: Category = Category::Modifiers;

    fn schema() -> &'static Schema {
        builtin(SchemaKey::Modifier)
    }

    fn from_config(config: LoaderConfig, _registry: &Registry) -> Result<Self, AssetError> {
        Ok(Self { config })
    }

    async fn load(&self, _ctx: &LoadContext) -> Result<ModifierConfig, AssetError> {
        Ok(ModifierConfig::sanitized(&self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::ObjectDatabase;
    use scenecraft_render::HeadlessBackend;
    use std::sync::Arc;

    #[tokio::test]
    async fn loads_sanitized_config() {
        let db = ObjectDatabase::<ModifierLoader>::from_yaml_str(
            "fabric:\n  type: material\n  label: Fabric\n  materialOptions: [red, blue]\n  note: ~\n",
        )
        .unwrap();
        let registry = Registry::builder(Arc::new(HeadlessBackend::default()))
            .provider(db.clone())
            .build();
        let config = db.load(&registry, "fabric").await.unwrap().unwrap();
        assert_eq!(config.kind(), "material");
        assert_eq!(config.get_str("targetPath"), Some(""));
        assert_eq!(config.get("lazyLoad"), Some(&Value::Bool(true)));
        assert!(config.get("note").is_none());
    }

    #[test]
    fn inline_configs_are_validated() {
        let raw: Mapping = serde_yaml::from_str("type: material\ntargetPath: seat").unwrap();
        let config = ModifierConfig::from_inline("seat-local", raw).unwrap();
        assert_eq!(config.key(), "seat-local");
        assert_eq!(config.get("materialOptions"), Some(&Value::Sequence(vec![])));

        let raw: Mapping = serde_yaml::from_str("type: sound").unwrap();
        assert!(matches!(
            ModifierConfig::from_inline("bad", raw),
            Err(AssetError::Validation { .. })
        ));
    }
}
