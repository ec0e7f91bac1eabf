use crate::error::AssetError;
use crate::registry::{LoadChain, Registry, Resource};
use crate::texture_pack::TexturePack;
use futures::future::join_all;
use scenecraft_common::Category;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Keys a config references, per category.
///
/// Keys keep insertion order; inserting a key twice is a no-op.
#[derive(Clone, Default)]
pub struct DependencyDictionary {
    keys: BTreeMap<Category, Vec<String>>,
    loaded: HashMap<(Category, String), Resource>,
}

impl fmt::Debug for DependencyDictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyDictionary")
            .field("keys", &self.keys)
            .field("loaded", &self.loaded.len())
            .finish()
    }
}

impl DependencyDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keys<I, S>(mut self, category: Category, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extend(category, keys);
        self
    }

    pub fn insert(&mut self, category: Category, key: impl Into<String>) {
        let key = key.into();
        let entry = self.keys.entry(category).or_default();
        if !entry.contains(&key) {
            entry.push(key);
        }
    }

    pub fn extend<I, S>(&mut self, category: Category, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for key in keys {
            self.insert(category, key);
        }
    }

    pub fn keys(&self, category: Category) -> &[String] {
        self.keys.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, category: Category, key: &str) -> bool {
        self.keys(category).iter().any(|k| k == key)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.values().all(Vec::is_empty)
    }

    /// Load every key, one category at a time in [`Category`] order.
    pub async fn load_all(&mut self, registry: &Registry) -> Result<(), AssetError> {
        self.load_all_within(registry, &LoadChain::new()).await
    }

    /// Like [`load_all`](Self::load_all) on behalf of the loads in `chain`.
    pub async fn load_all_within(
        &mut self,
        registry: &Registry,
        chain: &LoadChain,
    ) -> Result<(), AssetError> {
        for category in Category::ALL {
            let keys = self.keys(category).to_vec();
            if keys.is_empty() {
                continue;
            }
            let provider = registry
                .provider(category)
                .ok_or(AssetError::MissingProvider(category))?;
            let pending = keys
                .iter()
                .map(|key| provider.load_resource(registry, key, chain));
            let results = join_all(pending).await;
            for (key, result) in keys.into_iter().zip(results) {
                match result? {
                    Some(resource) => {
                        self.loaded.insert((category, key), resource);
                    }
                    None => {
                        tracing::warn!(%category, key = %key, "referenced config does not exist")
                    }
                }
            }
        }
        Ok(())
    }

    /// Object loaded by this dictionary, else the provider's loaded copy.
    pub fn get_object<T: Send + Sync + 'static>(
        &self,
        registry: &Registry,
        category: Category,
        key: &str,
    ) -> Option<Arc<T>> {
        let resource = match self.loaded.get(&(category, key.to_owned())) {
            Some(resource) => resource.clone(),
            None => registry.provider(category)?.loaded_resource(key)?,
        };
        resource.downcast::<T>().ok()
    }

    /// Every referenced texture pack that is available, in declaration order.
    pub fn texture_packs(&self, registry: &Registry) -> Vec<(String, Arc<TexturePack>)> {
        self.keys(Category::TexturePacks)
            .iter()
            .filter_map(|key| {
                self.get_object::<TexturePack>(registry, Category::TexturePacks, key)
                    .map(|pack| (key.clone(), pack))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_insertion_is_a_noop() {
        let mut deps = DependencyDictionary::new()
            .with_keys(Category::Materials, ["oak", "steel"]);
        deps.insert(Category::Materials, "oak");
        deps.extend(Category::Materials, ["steel", "glass"]);
        assert_eq!(deps.keys(Category::Materials), ["oak", "steel", "glass"]);
        assert!(deps.contains(Category::Materials, "glass"));
        assert!(deps.keys(Category::Nodes).is_empty());
    }

    #[test]
    fn empty_until_a_key_is_added() {
        let mut deps = DependencyDictionary::new();
        assert!(deps.is_empty());
        deps.insert(Category::Models, "chair");
        assert!(!deps.is_empty());
    }
}
