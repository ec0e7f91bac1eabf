use crate::error::AssetError;
use futures::future::BoxFuture;
use scenecraft_common::Category;
use scenecraft_render::AssetBackend;
use serde_yaml::Mapping;
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// A loaded object of any category.
pub type Resource = Arc<dyn Any + Send + Sync>;

/// Future returned by [`DependencyProvider::load_resource`].
pub type ResourceFuture = BoxFuture<'static, Result<Option<Resource>, AssetError>>;

/// Keys currently being resolved, innermost last.
///
/// Persistent linked list so every branch of a dependency walk can extend
/// it without copying.
#[derive(Clone, Default)]
pub struct LoadChain(Option<Arc<ChainLink>>);

struct ChainLink {
    category: Category,
    key: String,
    parent: LoadChain,
}

impl LoadChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, category: Category, key: &str) -> Self {
        LoadChain(Some(Arc::new(ChainLink {
            category,
            key: key.to_owned(),
            parent: self.clone(),
        })))
    }

    /// The innermost load, i.e. the one waiting on whatever comes next.
    pub fn head(&self) -> Option<(Category, &str)> {
        self.0.as_ref().map(|link| (link.category, link.key.as_str()))
    }

    pub fn contains(&self, category: Category, key: &str) -> bool {
        let mut cursor = self;
        while let Some(link) = &cursor.0 {
            if link.category == category && link.key == key {
                return true;
            }
            cursor = &link.parent;
        }
        false
    }

    pub fn len(&self) -> usize {
        let mut count = 0;
        let mut cursor = self;
        while let Some(link) = &cursor.0 {
            count += 1;
            cursor = &link.parent;
        }
        count
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// Outermost first, e.g. `nodes:room -> materials:oak`.
    pub fn describe(&self) -> String {
        let mut links = Vec::new();
        let mut cursor = self;
        while let Some(link) = &cursor.0 {
            links.push(format!("{}:{}", link.category, link.key));
            cursor = &link.parent;
        }
        links.reverse();
        links.join(" -> ")
    }
}

impl fmt::Debug for LoadChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LoadChain({})", self.describe())
    }
}

/// Object-safe face of one category's database.
pub trait DependencyProvider: Send + Sync {
    fn category(&self) -> Category;

    /// Raw config for `key`, if declared.
    fn config(&self, key: &str) -> Option<Mapping>;

    fn keys(&self) -> Vec<String>;

    fn is_loaded(&self, key: &str) -> bool;

    fn loaded_resource(&self, key: &str) -> Option<Resource>;

    /// Load `key` as part of `chain`. `Ok(None)` when no config exists.
    fn load_resource(&self, registry: &Registry, key: &str, chain: &LoadChain) -> ResourceFuture;

    fn as_any(&self) -> &dyn Any;
}

/// Notification handed to named callbacks.
#[derive(Clone)]
pub struct LoadEvent {
    pub category: Category,
    pub key: String,
    pub object: Resource,
}

impl LoadEvent {
    pub fn new(category: Category, key: impl Into<String>, object: Resource) -> Self {
        Self {
            category,
            key: key.into(),
            object,
        }
    }

    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.object.clone().downcast::<T>().ok()
    }
}

impl fmt::Debug for LoadEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadEvent")
            .field("category", &self.category)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

pub type Callback = Arc<dyn Fn(&LoadEvent) + Send + Sync>;

type LoadKey = (Category, String);

/// Which in-flight loads await which, across every provider.
///
/// Chains only see their own ancestors; two loads started from separate
/// roots meet here.
#[derive(Default)]
struct WaitGraph {
    edges: BTreeMap<LoadKey, BTreeSet<LoadKey>>,
}

impl WaitGraph {
    /// True when `target` already waits, directly or not, on a load in
    /// `chain`.
    fn reaches(&self, target: &LoadKey, chain: &LoadChain) -> bool {
        let mut seen = BTreeSet::new();
        let mut pending = vec![target.clone()];
        while let Some(current) = pending.pop() {
            if chain.contains(current.0, &current.1) {
                return true;
            }
            if let Some(next) = self.edges.get(&current) {
                pending.extend(next.iter().filter(|k| !seen.contains(*k)).cloned());
            }
            seen.insert(current);
        }
        false
    }
}

struct RegistryInner {
    providers: BTreeMap<Category, Arc<dyn DependencyProvider>>,
    backend: Arc<dyn AssetBackend>,
    callbacks: BTreeMap<String, Callback>,
    waits: Mutex<WaitGraph>,
}

/// Provider registry, asset backend and named callbacks.
///
/// Immutable once built; clones share the same state.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("providers", &self.inner.providers.keys().collect::<Vec<_>>())
            .field("callbacks", &self.inner.callbacks.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Registry {
    pub fn builder(backend: Arc<dyn AssetBackend>) -> RegistryBuilder {
        RegistryBuilder {
            providers: BTreeMap::new(),
            backend,
            callbacks: BTreeMap::new(),
        }
    }

    pub fn backend(&self) -> &Arc<dyn AssetBackend> {
        &self.inner.backend
    }

    pub fn provider(&self, category: Category) -> Option<&Arc<dyn DependencyProvider>> {
        self.inner.providers.get(&category)
    }

    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.inner.providers.keys().copied()
    }

    /// Typed handle to a registered provider.
    pub fn database<D: Clone + 'static>(&self, category: Category) -> Option<D> {
        self.provider(category)?.as_any().downcast_ref::<D>().cloned()
    }

    pub fn config(&self, category: Category, key: &str) -> Option<Mapping> {
        self.provider(category)?.config(key)
    }

    pub fn loaded<T: Send + Sync + 'static>(&self, category: Category, key: &str) -> Option<Arc<T>> {
        self.provider(category)?
            .loaded_resource(key)?
            .downcast::<T>()
            .ok()
    }

    /// Load through the category's provider. Missing provider is an error,
    /// missing config is `Ok(None)`.
    pub async fn load<T: Send + Sync + 'static>(
        &self,
        category: Category,
        key: &str,
    ) -> Result<Option<Arc<T>>, AssetError> {
        let provider = self
            .provider(category)
            .ok_or(AssetError::MissingProvider(category))?;
        let resource = provider.load_resource(self, key, &LoadChain::new()).await?;
        Ok(resource.and_then(|r| r.downcast::<T>().ok()))
    }

    /// Record that the head of `chain` awaits `category`/`key`. Refused with
    /// `DependencyCycle` when that load already waits on the chain.
    pub(crate) fn wait_for(&self, chain: &LoadChain, category: Category, key: &str) -> Result<(), AssetError> {
        let Some((waiter_category, waiter_key)) = chain.head() else {
            return Ok(());
        };
        let target = (category, key.to_owned());
        let mut waits = self.inner.waits.lock().unwrap_or_else(PoisonError::into_inner);
        if waits.reaches(&target, chain) {
            return Err(AssetError::DependencyCycle {
                category,
                key: key.to_owned(),
                chain: format!("{} -> {category}:{key} (in flight)", chain.describe()),
            });
        }
        waits
            .edges
            .entry((waiter_category, waiter_key.to_owned()))
            .or_default()
            .insert(target);
        Ok(())
    }

    /// Drop every wait recorded for a load that has settled.
    pub(crate) fn finish_waiting(&self, category: Category, key: &str) {
        let mut waits = self.inner.waits.lock().unwrap_or_else(PoisonError::into_inner);
        waits.edges.remove(&(category, key.to_owned()));
    }

    pub fn has_callback(&self, name: &str) -> bool {
        self.inner.callbacks.contains_key(name)
    }

    /// Invoke a named callback. Unknown names are skipped.
    pub fn invoke_callback(&self, name: &str, event: &LoadEvent) {
        match self.inner.callbacks.get(name) {
            Some(callback) => callback(event),
            None => tracing::debug!(callback = name, key = %event.key, "no callback registered"),
        }
    }
}

pub struct RegistryBuilder {
    providers: BTreeMap<Category, Arc<dyn DependencyProvider>>,
    backend: Arc<dyn AssetBackend>,
    callbacks: BTreeMap<String, Callback>,
}

impl RegistryBuilder {
    /// Register a provider for its category, replacing any previous one.
    pub fn provider(mut self, provider: impl DependencyProvider + 'static) -> Self {
        let category = provider.category();
        if self
            .providers
            .insert(category, Arc::new(provider))
            .is_some()
        {
            tracing::warn!(%category, "provider replaced");
        }
        self
    }

    pub fn callback(
        mut self,
        name: impl Into<String>,
        callback: impl Fn(&LoadEvent) + Send + Sync + 'static,
    ) -> Self {
        self.callbacks.insert(name.into(), Arc::new(callback));
        self
    }

    pub fn build(self) -> Registry {
        tracing::debug!(
            providers = self.providers.len(),
            callbacks = self.callbacks.len(),
            "registry built"
        );
        Registry {
            inner: Arc::new(RegistryInner {
                providers: self.providers,
                backend: self.backend,
                callbacks: self.callbacks,
                waits: Mutex::new(WaitGraph::default()),
            }),
        }
    }
}
