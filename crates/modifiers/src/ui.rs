use crate::modifier::{ModifierError, SceneModifier};
use crate::parse_modifier;
use scenecraft_assets::{ModifierConfig, Registry};
use scenecraft_scene::{GraphEvent, SceneNodeGraph};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

/// Widget for one modifier.
pub trait ModifierUi: Send {
    /// Called once the modifier has its owner, before it initializes.
    fn establish(&mut self, modifier: &dyn SceneModifier);

    fn refresh(&mut self, modifier: &dyn SceneModifier);

    fn remove(&mut self);
}

/// The host UI that modifier widgets live in.
pub trait UiConnection: Send {
    /// `None` when the host has no widget for this modifier type; the
    /// modifier still runs.
    fn modifier_ui_for(&mut self, config: &ModifierConfig) -> Option<Box<dyn ModifierUi>>;

    fn set_loading_panel_visibility(&mut self, visible: bool);

    fn set_container_visibility(&mut self, visible: bool);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    ModifierAdded { node: String, key: String },
    ModifierRemoved { node: String, key: String },
}

struct Entry {
    node: String,
    modifier: Box<dyn SceneModifier>,
    ui: Option<Box<dyn ModifierUi>>,
}

/// Keeps modifier widgets in step with the nodes attached to a graph.
pub struct SceneUi<C: UiConnection> {
    connection: C,
    material_previews: BTreeMap<String, String>,
    entries: Vec<Entry>,
    initializing: usize,
    container_visible: bool,
    events: Vec<UiEvent>,
}

impl<C: UiConnection> SceneUi<C> {
    pub fn new(connection: C, material_previews: BTreeMap<String, String>) -> Self {
        Self {
            connection,
            material_previews,
            entries: Vec::new(),
            initializing: 0,
            container_visible: false,
            events: Vec::new(),
        }
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn modifier(&self, index: usize) -> Option<&dyn SceneModifier> {
        self.entries.get(index).map(|e| e.modifier.as_ref())
    }

    /// Index of the modifier `key` owned by `node`.
    pub fn position(&self, node: &str, key: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.node == node && e.modifier.state().key == key)
    }

    pub fn modifiers(&self) -> impl Iterator<Item = (&str, &dyn SceneModifier)> {
        self.entries
            .iter()
            .map(|e| (e.node.as_str(), e.modifier.as_ref()))
    }

    pub fn events(&self) -> &[UiEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<UiEvent> {
        std::mem::take(&mut self.events)
    }

    /// Preview image for a material, or the `default` preview.
    pub fn material_preview(&self, key: &str) -> Option<&str> {
        self.material_previews
            .get(key)
            .or_else(|| self.material_previews.get("default"))
            .map(String::as_str)
    }

    /// React to drained graph events. A modifier that fails to parse or
    /// initialize is logged and kept out of the UI.
    pub async fn handle_events(
        &mut self,
        events: Vec<GraphEvent>,
        graph: &mut SceneNodeGraph,
        registry: &Registry,
    ) {
        for event in events {
            match event {
                GraphEvent::AppliedPreConnects { key, .. } => {
                    self.add_node_modifiers(&key, graph, registry).await;
                }
                GraphEvent::NodeRemoved { key } => self.remove_node_modifiers(&key),
                _ => {}
            }
        }
    }

    async fn add_node_modifiers(&mut self, node: &str, graph: &mut SceneNodeGraph, registry: &Registry) {
        let Some(configs) = graph.node(node).map(|n| n.modifiers().to_vec()) else {
            return;
        };
        for config in configs {
            let mut modifier = match parse_modifier(&config) {
                Ok(modifier) => modifier,
                Err(e) => {
                    tracing::warn!(%node, modifier = %config.key(), "{e}");
                    continue;
                }
            };
            modifier.state_mut().owner = Some(node.to_owned());
            let mut ui = self.connection.modifier_ui_for(&config);
            if let Some(ui) = ui.as_mut() {
                ui.establish(modifier.as_ref());
            }

            self.begin_loading();
            let result = modifier.init(graph, registry).await;
            self.end_loading();
            if let Err(e) = result {
                tracing::warn!(%node, modifier = %config.key(), "initialization failed: {e}");
                if let Some(ui) = ui.as_mut() {
                    ui.remove();
                }
                continue;
            }

            if let Some(ui) = ui.as_mut() {
                ui.refresh(modifier.as_ref());
            }
            tracing::debug!(%node, modifier = %config.key(), "modifier added");
            self.events.push(UiEvent::ModifierAdded {
                node: node.to_owned(),
                key: config.key().to_owned(),
            });
            self.entries.push(Entry {
                node: node.to_owned(),
                modifier,
                ui,
            });
        }
        self.update_container();
    }

    fn remove_node_modifiers(&mut self, node: &str) {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|e| e.node == node);
        self.entries = kept;
        for mut entry in removed {
            if let Some(ui) = entry.ui.as_mut() {
                ui.remove();
            }
            self.events.push(UiEvent::ModifierRemoved {
                node: entry.node,
                key: entry.modifier.state().key.clone(),
            });
        }
        self.update_container();
    }

    /// Apply `input` on the modifier at `index`, then redraw every widget.
    /// Returns `false` for an unknown index.
    pub async fn apply_input(
        &mut self,
        index: usize,
        input: usize,
        graph: &mut SceneNodeGraph,
        registry: &Registry,
    ) -> Result<bool, ModifierError> {
        if index >= self.entries.len() {
            return Ok(false);
        }
        let lazy = self.entries[index].modifier.state().lazy_load;
        if lazy {
            self.begin_loading();
        }
        let result = self.entries[index]
            .modifier
            .apply_input(graph, registry, input)
            .await;
        if lazy {
            self.end_loading();
        }
        result?;
        for entry in &mut self.entries {
            if let Some(ui) = entry.ui.as_mut() {
                ui.refresh(entry.modifier.as_ref());
            }
        }
        Ok(true)
    }

    fn update_container(&mut self) {
        let visible = !self.entries.is_empty();
        if visible != self.container_visible {
            self.container_visible = visible;
            self.connection.set_container_visibility(visible);
        }
    }

    fn begin_loading(&mut self) {
        if self.initializing == 0 {
            self.connection.set_loading_panel_visibility(true);
        }
        self.initializing += 1;
    }

    fn end_loading(&mut self) {
        self.initializing = self.initializing.saturating_sub(1);
        if self.initializing == 0 {
            self.connection.set_loading_panel_visibility(false);
        }
    }
}

/// Headless host that writes every widget change as a line of text.
#[derive(Debug, Clone, Default)]
pub struct TextUi {
    transcript: Arc<Mutex<Vec<String>>>,
}

impl TextUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transcript(&self) -> Vec<String> {
        self.transcript
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    fn write(&self, line: String) {
        if let Ok(mut lines) = self.transcript.lock() {
            lines.push(line);
        }
    }
}

impl UiConnection for TextUi {
    fn modifier_ui_for(&mut self, config: &ModifierConfig) -> Option<Box<dyn ModifierUi>> {
        Some(Box::new(TextModifierUi {
            host: self.clone(),
            key: config.key().to_owned(),
        }))
    }

    fn set_loading_panel_visibility(&mut self, visible: bool) {
        self.write(format!("loading {}", if visible { "shown" } else { "hidden" }));
    }

    fn set_container_visibility(&mut self, visible: bool) {
        self.write(format!("modifiers {}", if visible { "shown" } else { "hidden" }));
    }
}

struct TextModifierUi {
    host: TextUi,
    key: String,
}

impl TextModifierUi {
    fn describe(modifier: &dyn SceneModifier) -> String {
        let state = modifier.state();
        let mut line = format!(
            "{} [{}] {}",
            state.key,
            modifier.kind(),
            state.label.as_deref().unwrap_or(&state.key)
        );
        match state.current_input {
            Some(input) => {
                let _ = write!(line, " input={input}/{}", modifier.option_count());
            }
            None => {
                let _ = write!(line, " options={}", modifier.option_count());
            }
        }
        line
    }
}

impl ModifierUi for TextModifierUi {
    fn establish(&mut self, modifier: &dyn SceneModifier) {
        self.host.write(format!("+ {}", Self::describe(modifier)));
    }

    fn refresh(&mut self, modifier: &dyn SceneModifier) {
        self.host.write(format!("~ {}", Self::describe(modifier)));
    }

    fn remove(&mut self) {
        self.host.write(format!("- {}", self.key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenecraft_assets::{MaterialDatabase, ModifierDatabase};
    use scenecraft_render::{Geometry, HeadlessBackend, MeshData, Object3D, ObjectKind};
    use scenecraft_scene::{ConnectionKind, EndpointId, SceneNode, SceneNodeConnection};
    use serde_yaml::Mapping;
    use std::sync::Arc;

    const MODIFIERS: &str = "finish:\n  type: material\n  label: Finish\n  targetPath: object:top\n  materialOptions: [oak, walnut]\n";

    fn config(key: &str, yaml: &str) -> ModifierConfig {
        let raw: Mapping = serde_yaml::from_str(yaml).unwrap();
        ModifierConfig::from_inline(key, raw).unwrap()
    }

    async fn setup() -> (SceneNodeGraph, Registry) {
        let materials =
            MaterialDatabase::from_yaml_str("oak:\n  type: standard\nwalnut:\n  type: basic\n").unwrap();
        let modifiers = ModifierDatabase::from_yaml_str(MODIFIERS).unwrap();
        let registry = Registry::builder(Arc::new(HeadlessBackend::default()))
            .provider(materials)
            .provider(modifiers.clone())
            .build();

        let mut room = SceneNode::new("room");
        room.add_connection(
            "socket",
            SceneNodeConnection::new(ConnectionKind::Receiver, Object3D::empty("socket")),
        );
        let mut table = SceneNode::new("table");
        let mut top = MeshData::primitive(Geometry::Cube, None);
        top.source_material = Some("Wood".into());
        table.add_object("top", Object3D::new("top", ObjectKind::Mesh(top)));
        table.add_connection(
            "leg",
            SceneNodeConnection::new(ConnectionKind::Plug, Object3D::empty("leg")),
        );
        let finish = modifiers.load(&registry, "finish").await.unwrap().unwrap();
        table.add_modifier((*finish).clone());
        table.add_modifier(config(
            "table:local0",
            "type: material\ntargetPath: object:top\nlazyLoad: false\nmaterialOptions: [walnut]\n",
        ));

        let mut graph = SceneNodeGraph::new(BTreeMap::new());
        graph.add_node(room);
        graph.add_node(table);
        (graph, registry)
    }

    #[tokio::test]
    async fn builds_widgets_for_attached_nodes() {
        let (mut graph, registry) = setup().await;
        let host = TextUi::new();
        let mut ui = SceneUi::new(host.clone(), BTreeMap::new());
        let events = graph.drain_events();
        ui.handle_events(events, &mut graph, &registry).await;

        assert_eq!(ui.len(), 2);
        assert_eq!(ui.position("table", "finish"), Some(0));
        assert_eq!(ui.modifier(0).unwrap().state().owner.as_deref(), Some("table"));
        assert_eq!(
            ui.drain_events(),
            [
                UiEvent::ModifierAdded { node: "table".into(), key: "finish".into() },
                UiEvent::ModifierAdded { node: "table".into(), key: "table:local0".into() },
            ]
        );
        let transcript = host.transcript();
        assert_eq!(transcript[0], "+ finish [material] Finish options=2");
        assert_eq!(transcript[1], "loading shown");
        assert_eq!(transcript[2], "loading hidden");
        assert_eq!(transcript.last().map(String::as_str), Some("modifiers shown"));
    }

    #[tokio::test]
    async fn applied_input_redraws_every_widget() {
        let (mut graph, registry) = setup().await;
        let host = TextUi::new();
        let mut ui = SceneUi::new(host.clone(), BTreeMap::new());
        let events = graph.drain_events();
        ui.handle_events(events, &mut graph, &registry).await;

        let before = host.transcript().len();
        assert!(ui.apply_input(0, 1, &mut graph, &registry).await.unwrap());
        let after = host.transcript();
        assert_eq!(
            &after[before..],
            [
                "loading shown",
                "loading hidden",
                "~ finish [material] Finish input=1/2",
                "~ table:local0 [material] table:local0 options=1",
            ]
        );
        let top = graph.node("table").unwrap().object("top").unwrap();
        assert_eq!(top.mesh().unwrap().material.as_ref().unwrap().name, "walnut");
        assert!(!ui.apply_input(7, 0, &mut graph, &registry).await.unwrap());
    }

    #[tokio::test]
    async fn removing_a_node_drops_its_widgets() {
        let (mut graph, registry) = setup().await;
        let host = TextUi::new();
        let mut ui = SceneUi::new(host.clone(), BTreeMap::new());
        let events = graph.drain_events();
        ui.handle_events(events, &mut graph, &registry).await;
        ui.drain_events();

        assert!(graph.connect(&EndpointId::new("room", "socket"), &EndpointId::new("table", "leg")));
        assert!(graph.disconnect(&EndpointId::new("room", "socket"), &EndpointId::new("table", "leg")));
        let events = graph.drain_events();
        ui.handle_events(events, &mut graph, &registry).await;

        assert!(ui.is_empty());
        assert_eq!(ui.drain_events().len(), 2);
        let transcript = host.transcript();
        assert!(transcript.contains(&"- finish".to_owned()));
        assert_eq!(transcript.last().map(String::as_str), Some("modifiers hidden"));
    }

    #[test]
    fn material_preview_falls_back_to_default() {
        let previews = BTreeMap::from([
            ("default".to_owned(), "previews/default.png".to_owned()),
            ("oak".to_owned(), "previews/oak.png".to_owned()),
        ]);
        let ui = SceneUi::new(TextUi::new(), previews);
        assert_eq!(ui.material_preview("oak"), Some("previews/oak.png"));
        assert_eq!(ui.material_preview("steel"), Some("previews/default.png"));
        assert_eq!(SceneUi::new(TextUi::new(), BTreeMap::new()).material_preview("oak"), None);
    }
}
