use crate::error::AssetError;
use crate::loader::{ConfigLoader, LoadContext, LoaderConfig};
use crate::registry::{DependencyProvider, LoadChain, LoadEvent, Registry, Resource, ResourceFuture};
use futures::future::{self, BoxFuture, FutureExt, Shared};
use scenecraft_common::Category;
use serde_yaml::{Mapping, Value};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::Instrument;

type LoadResult<T> = Result<Option<Arc<T>>, AssetError>;
type SharedLoad<T> = Shared<BoxFuture<'static, LoadResult<T>>>;

struct DatabaseState<T> {
    configs: BTreeMap<String, Mapping>,
    loaded: HashMap<String, Arc<T>>,
    in_flight: HashMap<String, SharedLoad<T>>,
    load_list: Vec<String>,
}

/// Config store and object cache for one category.
///
/// Cheap to clone; clones share the same state.
///
/// # Invariants
/// - A key is loaded iff its object is cached; the cached object never
///   changes afterwards.
/// - At most one load per key is in flight. Concurrent requests await the
///   same shared future.
/// - The state lock is never held across an await.
pub struct ObjectDatabase<L: ConfigLoader> {
    state: Arc<Mutex<DatabaseState<L::Output>>>,
}

impl<L: ConfigLoader> Clone for ObjectDatabase<L> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<L: ConfigLoader> fmt::Debug for ObjectDatabase<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("ObjectDatabase")
            .field("category", &L::CATEGORY)
            .field("configs", &state.configs.len())
            .field("loaded", &state.loaded.len())
            .field("in_flight", &state.in_flight.len())
            .finish()
    }
}

impl<L: ConfigLoader> Default for ObjectDatabase<L> {
    fn default() -> Self {
        Self::new(BTreeMap::new())
    }
}

impl<L: ConfigLoader> ObjectDatabase<L> {
    pub fn new(configs: BTreeMap<String, Mapping>) -> Self {
        Self {
            state: Arc::new(Mutex::new(DatabaseState {
                configs,
                loaded: HashMap::new(),
                in_flight: HashMap::new(),
                load_list: Vec::new(),
            })),
        }
    }

    /// Parse a YAML document of `key: config` entries.
    pub fn from_yaml_str(source: &str) -> Result<Self, AssetError> {
        let db = Self::default();
        db.extend_from_yaml_str(source)?;
        Ok(db)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        tracing::debug!(category = %L::CATEGORY, path = %path.display(), "reading configs");
        Self::from_yaml_str(&source)
    }

    /// Add every entry of a YAML document. Non-mapping entries are skipped.
    pub fn extend_from_yaml_str(&self, source: &str) -> Result<usize, AssetError> {
        let document: Value = serde_yaml::from_str(source)?;
        let entries = match document {
            Value::Mapping(entries) => entries,
            Value::Null => Mapping::new(),
            _ => {
                return Err(AssetError::Config {
                    category: L::CATEGORY,
                    key: String::new(),
                    message: "config document must be a mapping of keys to configs".into(),
                });
            }
        };
        let mut added = 0;
        for (key, config) in entries {
            let Some(key) = key.as_str().map(str::to_owned) else {
                tracing::warn!(category = %L::CATEGORY, "skipping config with non-string key");
                continue;
            };
            match config {
                Value::Mapping(config) => {
                    self.insert_config(key, config);
                    added += 1;
                }
                _ => tracing::warn!(category = %L::CATEGORY, key = %key, "skipping non-mapping config"),
            }
        }
        Ok(added)
    }

    /// Declare or replace a config. Already loaded objects are kept.
    pub fn insert_config(&self, key: impl Into<String>, config: Mapping) {
        self.lock().configs.insert(key.into(), config);
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().configs.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().configs.is_empty()
    }

    /// Copy of the raw config; with `loaded_only`, only for loaded keys.
    pub fn get_config(&self, key: &str, loaded_only: bool) -> Option<Mapping> {
        let state = self.lock();
        if loaded_only && !state.loaded.contains_key(key) {
            return None;
        }
        state.configs.get(key).cloned()
    }

    pub fn is_config_loaded(&self, key: &str) -> bool {
        self.lock().loaded.contains_key(key)
    }

    pub fn get_loaded_config(&self, key: &str) -> Option<Arc<L::Output>> {
        self.lock().loaded.get(key).cloned()
    }

    pub fn is_loading(&self, key: &str) -> bool {
        self.lock().in_flight.contains_key(key)
    }

    pub async fn load(&self, registry: &Registry, key: &str) -> LoadResult<L::Output> {
        self.load_with(registry, key, true).await
    }

    /// Load `key`, optionally skipping dependency resolution.
    pub async fn load_with(
        &self,
        registry: &Registry,
        key: &str,
        check_dependencies: bool,
    ) -> LoadResult<L::Output> {
        self.load_within(registry, key, &LoadChain::new(), check_dependencies)
            .await
    }

    /// Load `key` on behalf of the loads in `chain`.
    ///
    /// A key already in `chain`, or an in-flight key whose load already
    /// waits on `chain`, is a dependency cycle and fails instead of awaiting
    /// a load that can never finish.
    pub fn load_within(
        &self,
        registry: &Registry,
        key: &str,
        chain: &LoadChain,
        check_dependencies: bool,
    ) -> BoxFuture<'static, LoadResult<L::Output>> {
        let mut state = self.lock();
        if let Some(object) = state.loaded.get(key) {
            return future::ready(Ok(Some(object.clone()))).boxed();
        }
        if chain.contains(L::CATEGORY, key) {
            let err = AssetError::DependencyCycle {
                category: L::CATEGORY,
                key: key.to_owned(),
                chain: chain.push(L::CATEGORY, key).describe(),
            };
            tracing::error!(error = %err, "refusing cyclic load");
            return future::ready(Err(err)).boxed();
        }
        if let Some(pending) = state.in_flight.get(key) {
            if let Err(err) = registry.wait_for(chain, L::CATEGORY, key) {
                tracing::error!(error = %err, "refusing to join a load waiting on this one");
                return future::ready(Err(err)).boxed();
            }
            tracing::trace!(category = %L::CATEGORY, key, "joining in-flight load");
            return pending.clone().boxed();
        }
        let Some(raw) = state.configs.get(key).cloned() else {
            tracing::warn!(category = %L::CATEGORY, key, "config does not exist");
            return future::ready(Ok(None)).boxed();
        };
        if let Err(err) = registry.wait_for(chain, L::CATEGORY, key) {
            return future::ready(Err(err)).boxed();
        }

        let span = tracing::debug_span!("load", category = %L::CATEGORY, key);
        let shared = self
            .clone()
            .run_load(
                registry.clone(),
                key.to_owned(),
                raw,
                chain.push(L::CATEGORY, key),
                check_dependencies,
            )
            .instrument(span)
            .boxed()
            .shared();
        state.in_flight.insert(key.to_owned(), shared.clone());
        shared.boxed()
    }

    async fn run_load(
        self,
        registry: Registry,
        key: String,
        raw: Mapping,
        chain: LoadChain,
        check_dependencies: bool,
    ) -> LoadResult<L::Output> {
        let result = load_fresh::<L>(&registry, &key, raw, &chain, check_dependencies).await;
        let outcome = {
            let mut state = self.lock();
            state.in_flight.remove(&key);
            registry.finish_waiting(L::CATEGORY, &key);
            match result {
                Ok((output, callback)) => {
                    let object = state
                        .loaded
                        .entry(key.clone())
                        .or_insert_with(|| Arc::new(output))
                        .clone();
                    Ok((object, callback))
                }
                Err(e) => Err(e),
            }
        };
        match outcome {
            Ok((object, callback)) => {
                tracing::debug!("loaded");
                if let Some(name) = callback {
                    let resource: Resource = object.clone();
                    registry.invoke_callback(&name, &LoadEvent::new(L::CATEGORY, &key, resource));
                }
                Ok(Some(object))
            }
            Err(e) => {
                tracing::error!(category = %L::CATEGORY, key = %key, error = %e, "load failed");
                Err(e)
            }
        }
    }

    /// Load every declared config, stopping at the first failure.
    pub async fn load_all(&self, registry: &Registry) -> Result<BTreeMap<String, Arc<L::Output>>, AssetError> {
        let mut loaded = BTreeMap::new();
        for key in self.keys() {
            if let Some(object) = self.load(registry, &key).await? {
                loaded.insert(key, object);
            }
        }
        Ok(loaded)
    }

    /// Queue `key` for [`load_queued`](Self::load_queued). Loaded or already
    /// queued keys are ignored.
    pub fn push_to_load_list(&self, key: impl Into<String>) {
        let key = key.into();
        let mut state = self.lock();
        if state.loaded.contains_key(&key) || state.load_list.contains(&key) {
            return;
        }
        state.load_list.push(key);
    }

    pub fn remove_from_load_list(&self, key: &str) {
        self.lock().load_list.retain(|k| k != key);
    }

    pub fn load_list(&self) -> Vec<String> {
        self.lock().load_list.clone()
    }

    /// Drain the load list and load every queued key in order.
    pub async fn load_queued(&self, registry: &Registry) -> Result<BTreeMap<String, Arc<L::Output>>, AssetError> {
        let queued = std::mem::take(&mut self.lock().load_list);
        let mut loaded = BTreeMap::new();
        for key in queued {
            if let Some(object) = self.load(registry, &key).await? {
                loaded.insert(key, object);
            }
        }
        Ok(loaded)
    }

    fn lock(&self) -> MutexGuard<'_, DatabaseState<L::Output>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn load_fresh<L: ConfigLoader>(
    registry: &Registry,
    key: &str,
    raw: Mapping,
    chain: &LoadChain,
    check_dependencies: bool,
) -> Result<(L::Output, Option<String>), AssetError> {
    let prepared = L::prepare_config(key, raw, registry)?;
    let config = LoaderConfig::validated(L::CATEGORY, key, prepared, L::schema())?;
    let mut loader = L::from_config(config, registry)?;
    let mut dependencies = loader.dependencies(registry).await?;
    if check_dependencies {
        dependencies.load_all_within(registry, chain).await?;
    }
    let ctx = LoadContext::new(key, registry.clone(), dependencies);
    let output = loader.load(&ctx).await?;
    Ok((output, loader.loaded_callback().map(str::to_owned)))
}

impl<L: ConfigLoader> DependencyProvider for ObjectDatabase<L> {
    fn category(&self) -> Category {
        L::CATEGORY
    }

    fn config(&self, key: &str) -> Option<Mapping> {
        self.get_config(key, false)
    }

    fn keys(&self) -> Vec<String> {
        ObjectDatabase::keys(self)
    }

    fn is_loaded(&self, key: &str) -> bool {
        self.is_config_loaded(key)
    }

    fn loaded_resource(&self, key: &str) -> Option<Resource> {
        self.get_loaded_config(key).map(|object| object as Resource)
    }

    fn load_resource(&self, registry: &Registry, key: &str, chain: &LoadChain) -> ResourceFuture {
        self.load_within(registry, key, chain, true)
            .map(|result| result.map(|object| object.map(|o| o as Resource)))
            .boxed()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
