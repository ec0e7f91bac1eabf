use async_trait::async_trait;
use scenecraft_assets::{AssetError, DependencyDictionary, ModifierConfig, Registry};
use scenecraft_scene::{Found, SceneNodeGraph};
use thiserror::Error;

/// Errors from modifier setup and input.
#[derive(Debug, Error)]
pub enum ModifierError {
    #[error("unknown modifier type '{0}'")]
    UnknownType(String),
    #[error("modifier {key}: {message}")]
    Config { key: String, message: String },
    #[error("modifier {key}: target '{path}' not found")]
    NoTarget { key: String, path: String },
    #[error("modifier {key}: material '{material}' not available")]
    MissingMaterial { key: String, material: String },
    #[error(transparent)]
    Asset(#[from] AssetError),
}

/// Lifecycle notifications, in order of occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModifierEvent {
    InitializeStarted,
    InitializeFinished,
    PrepareStarted,
    PrepareFinished,
    LazyPrepareStarted { input: usize },
    LazyPrepareFinished { input: usize },
    AppliedInput { input: usize },
}

/// Settings and runtime state shared by every modifier.
#[derive(Debug, Clone)]
pub struct ModifierState {
    pub key: String,
    pub label: Option<String>,
    /// Path resolved with [`SceneNodeGraph::find_object`] from the owner.
    pub target_path: String,
    /// Load dependencies per input instead of all at init.
    pub lazy_load: bool,
    pub default_input: Option<usize>,
    pub owner: Option<String>,
    pub target: Option<Found>,
    pub current_input: Option<usize>,
    events: Vec<ModifierEvent>,
}

impl ModifierState {
    pub fn from_config(config: &ModifierConfig) -> Self {
        Self {
            key: config.key().to_owned(),
            label: config.get_str("label").map(str::to_owned),
            target_path: config.get_str("targetPath").unwrap_or_default().to_owned(),
            lazy_load: config
                .get("lazyLoad")
                .and_then(|v| v.as_bool())
                .unwrap_or(true),
            default_input: config
                .get("defaultInput")
                .and_then(|v| v.as_u64())
                .map(|v| v as usize),
            owner: None,
            target: None,
            current_input: None,
            events: Vec::new(),
        }
    }

    pub fn events(&self) -> &[ModifierEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<ModifierEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn emit(&mut self, event: ModifierEvent) {
        self.events.push(event);
    }
}

/// A user-facing control bound to a target inside the graph.
///
/// Inputs are option indices. The provided methods drive the lifecycle;
/// implementors supply dependencies and [`SceneModifier::apply_input_internal`].
#[async_trait]
pub trait SceneModifier: Send + Sync {
    fn kind(&self) -> &'static str;

    fn state(&self) -> &ModifierState;

    fn state_mut(&mut self) -> &mut ModifierState;

    /// Everything any input may need.
    fn dependencies(&self) -> DependencyDictionary;

    /// What one input needs.
    fn lazy_dependencies(&self, input: usize) -> DependencyDictionary;

    /// Number of selectable inputs.
    fn option_count(&self) -> usize;

    async fn apply_input_internal(
        &mut self,
        graph: &mut SceneNodeGraph,
        registry: &Registry,
        input: usize,
    ) -> Result<(), ModifierError>;

    /// Eager preparation, target lookup and the default input.
    async fn init(
        &mut self,
        graph: &mut SceneNodeGraph,
        registry: &Registry,
    ) -> Result<(), ModifierError> {
        self.state_mut().emit(ModifierEvent::InitializeStarted);
        if !self.state().lazy_load {
            self.prepare(registry).await?;
        }
        self.init_target(graph);
        if let Some(input) = self.state().default_input {
            self.apply_input(graph, registry, input).await?;
        }
        self.state_mut().emit(ModifierEvent::InitializeFinished);
        Ok(())
    }

    async fn prepare(&mut self, registry: &Registry) -> Result<(), ModifierError> {
        let mut dependencies = self.dependencies();
        self.state_mut().emit(ModifierEvent::PrepareStarted);
        dependencies.load_all(registry).await?;
        self.state_mut().emit(ModifierEvent::PrepareFinished);
        Ok(())
    }

    async fn prepare_lazy(&mut self, registry: &Registry, input: usize) -> Result<(), ModifierError> {
        let mut dependencies = self.lazy_dependencies(input);
        self.state_mut()
            .emit(ModifierEvent::LazyPrepareStarted { input });
        dependencies.load_all(registry).await?;
        self.state_mut()
            .emit(ModifierEvent::LazyPrepareFinished { input });
        Ok(())
    }

    async fn apply_input(
        &mut self,
        graph: &mut SceneNodeGraph,
        registry: &Registry,
        input: usize,
    ) -> Result<(), ModifierError> {
        self.init_target(graph);
        if self.state().lazy_load {
            self.prepare_lazy(registry, input).await?;
        }
        self.apply_input_internal(graph, registry, input).await?;
        let state = self.state_mut();
        state.current_input = Some(input);
        state.emit(ModifierEvent::AppliedInput { input });
        Ok(())
    }

    /// Re-resolve the target path from the owner node. An empty path keeps
    /// the current target.
    fn init_target(&mut self, graph: &SceneNodeGraph) -> Option<Found> {
        let state = self.state();
        if state.target_path.is_empty() {
            return state.target.clone();
        }
        let target = graph.find_object(&state.target_path, state.owner.as_deref());
        if target.is_none() {
            tracing::debug!(modifier = %state.key, path = %state.target_path, "target not found");
        }
        self.state_mut().target = target.clone();
        target
    }
}
