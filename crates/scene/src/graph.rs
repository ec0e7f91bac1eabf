use crate::connection::ConnectionKind;
use crate::node::SceneNode;
use glam::{Quat, Vec3};
use scenecraft_assets::Registry;
use scenecraft_common::Category;
use scenecraft_render::{Object3D, Scene};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Source of loaded nodes for pre-connects and for connecting to nodes that
/// are not attached yet.
pub trait NodeLookup {
    fn loaded_node(&self, key: &str) -> Option<Arc<SceneNode>>;
}

impl NodeLookup for Registry {
    fn loaded_node(&self, key: &str) -> Option<Arc<SceneNode>> {
        self.loaded::<SceneNode>(Category::Nodes, key)
    }
}

impl NodeLookup for BTreeMap<String, Arc<SceneNode>> {
    fn loaded_node(&self, key: &str) -> Option<Arc<SceneNode>> {
        self.get(key).cloned()
    }
}

/// A connection endpoint: the owning node and the endpoint's key in it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointId {
    pub node: String,
    pub key: String,
}

impl EndpointId {
    pub fn new(node: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.node, self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub receiver: EndpointId,
    pub plug: EndpointId,
}

/// Record of every graph mutation, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    NodeAdded { key: String, central: bool },
    NodeRemoved { key: String },
    AppliedPreConnects { key: String, central: bool },
    ConnectionEstablished(Connection),
    ConnectionRemoved(Connection),
}

/// Which links keep a node attached during cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReachabilityPolicy {
    /// Follow receivers to the plugged-in node only.
    #[default]
    ReceiverOnly,
    /// Follow links in both directions.
    Bidirectional,
}

/// Result of [`SceneNodeGraph::find_object`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Found {
    Node(String),
    Object { node: String, key: String },
}

/// Attached scene nodes and the plug/receiver links between them.
///
/// The first node ever added is the central node. It cannot be removed and
/// anchors the cleanup that runs after every disconnect.
pub struct SceneNodeGraph {
    nodes: BTreeMap<String, SceneNode>,
    central: Option<String>,
    receivers: BTreeMap<EndpointId, Connection>,
    plugs: BTreeMap<EndpointId, Connection>,
    lookup: Box<dyn NodeLookup + Send + Sync>,
    policy: ReachabilityPolicy,
    event_log: Vec<GraphEvent>,
}

impl fmt::Debug for SceneNodeGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneNodeGraph")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("central", &self.central)
            .field("connections", &self.receivers.values().collect::<Vec<_>>())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl SceneNodeGraph {
    pub fn new(lookup: impl NodeLookup + Send + Sync + 'static) -> Self {
        Self {
            nodes: BTreeMap::new(),
            central: None,
            receivers: BTreeMap::new(),
            plugs: BTreeMap::new(),
            lookup: Box::new(lookup),
            policy: ReachabilityPolicy::default(),
            event_log: Vec::new(),
        }
    }

    pub fn with_policy(mut self, policy: ReachabilityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> ReachabilityPolicy {
        self.policy
    }

    pub fn central(&self) -> Option<&str> {
        self.central.as_deref()
    }

    pub fn node(&self, key: &str) -> Option<&SceneNode> {
        if key.is_empty() {
            return None;
        }
        self.nodes.get(key)
    }

    pub fn node_mut(&mut self, key: &str) -> Option<&mut SceneNode> {
        self.nodes.get_mut(key)
    }

    pub fn nodes(&self) -> &BTreeMap<String, SceneNode> {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.receivers.values()
    }

    pub fn connection_count(&self) -> usize {
        self.receivers.len()
    }

    pub fn receiver_connection(&self, receiver: &EndpointId) -> Option<&Connection> {
        self.receivers.get(receiver)
    }

    pub fn plug_connection(&self, plug: &EndpointId) -> Option<&Connection> {
        self.plugs.get(plug)
    }

    pub fn has_connection(&self, receiver: &EndpointId, plug: &EndpointId) -> bool {
        self.receivers.get(receiver).is_some_and(|c| c.plug == *plug) && self.plugs.contains_key(plug)
    }

    pub fn events(&self) -> &[GraphEvent] {
        &self.event_log
    }

    pub fn drain_events(&mut self) -> Vec<GraphEvent> {
        std::mem::take(&mut self.event_log)
    }

    /// Attach a node and apply its pre-connects. A key that is already
    /// attached is left untouched.
    pub fn add_node(&mut self, node: SceneNode) -> bool {
        let key = node.key().to_owned();
        if !self.attach(node) {
            return false;
        }
        self.apply_pre_connects(&key);
        true
    }

    fn attach(&mut self, node: SceneNode) -> bool {
        let key = node.key().to_owned();
        if self.nodes.contains_key(&key) {
            return false;
        }
        self.nodes.insert(key.clone(), node);
        let central = *self.central.get_or_insert_with(|| key.clone()) == key;
        tracing::debug!(node = %key, central, "node added");
        self.event_log.push(GraphEvent::NodeAdded { key, central });
        true
    }

    fn apply_pre_connects(&mut self, key: &str) {
        let Some(node) = self.nodes.get(key) else {
            return;
        };
        let pre_connects = node.pre_connects.clone();
        for pre in pre_connects {
            if !self.contains(&pre.node) && self.lookup.loaded_node(&pre.node).is_none() {
                tracing::debug!(node = key, target = %pre.node, "pre-connect target not loaded");
                continue;
            }
            let receiver = EndpointId::new(key, pre.receiver_key);
            let plug = EndpointId::new(pre.node, pre.plug_key);
            self.connect(&receiver, &plug);
        }
        let central = self.central.as_deref() == Some(key);
        self.event_log.push(GraphEvent::AppliedPreConnects {
            key: key.to_owned(),
            central,
        });
    }

    /// Detach a node and drop every link it takes part in. The central node
    /// is never removed.
    pub fn remove_node(&mut self, key: &str) -> bool {
        if !self.nodes.contains_key(key) {
            return false;
        }
        if self.central.as_deref() == Some(key) {
            tracing::error!(node = key, "cannot remove the central node");
            return false;
        }
        let linked: Vec<Connection> = self
            .receivers
            .values()
            .filter(|c| c.receiver.node == key || c.plug.node == key)
            .cloned()
            .collect();
        for connection in linked {
            self.unlink(&connection);
        }
        self.nodes.remove(key);
        tracing::debug!(node = key, "node removed");
        self.event_log.push(GraphEvent::NodeRemoved {
            key: key.to_owned(),
        });
        true
    }

    fn endpoint_kind(&self, endpoint: &EndpointId) -> Option<ConnectionKind> {
        match self.nodes.get(&endpoint.node) {
            Some(node) => Some(node.connection(&endpoint.key)?.kind()),
            None => Some(
                self.lookup
                    .loaded_node(&endpoint.node)?
                    .connection(&endpoint.key)?
                    .kind(),
            ),
        }
    }

    /// Attach from the lookup unless already attached.
    fn ensure_attached(&mut self, key: &str) -> Option<bool> {
        if self.nodes.contains_key(key) {
            return Some(false);
        }
        let node = self.lookup.loaded_node(key)?;
        Some(self.attach((*node).clone()))
    }

    /// Link `plug` into `receiver`, moving the plug's node so both endpoints
    /// coincide. Rejected when either endpoint is unknown or already linked.
    pub fn connect(&mut self, receiver: &EndpointId, plug: &EndpointId) -> bool {
        if self.receivers.contains_key(receiver) || self.plugs.contains_key(plug) {
            tracing::warn!(%receiver, %plug, "cannot connect: endpoint already connected");
            return false;
        }
        if self.endpoint_kind(receiver) != Some(ConnectionKind::Receiver) {
            tracing::warn!(%receiver, "cannot connect: no such receiver");
            return false;
        }
        if self.endpoint_kind(plug) != Some(ConnectionKind::Plug) {
            tracing::warn!(%plug, "cannot connect: no such plug");
            return false;
        }

        if self.ensure_attached(&receiver.node) == Some(true) {
            self.apply_pre_connects(&receiver.node);
            if self.receivers.contains_key(receiver) || self.plugs.contains_key(plug) {
                tracing::warn!(%receiver, %plug, "cannot connect: endpoint taken by pre-connect");
                return false;
            }
        }
        let Some(plug_attached) = self.ensure_attached(&plug.node) else {
            tracing::warn!(%plug, "cannot connect: plug node not loaded");
            return false;
        };

        let connection = Connection {
            receiver: receiver.clone(),
            plug: plug.clone(),
        };
        self.receivers.insert(receiver.clone(), connection.clone());
        self.plugs.insert(plug.clone(), connection.clone());
        self.align(receiver, plug);
        self.set_connected(&connection, true);

        tracing::debug!(%receiver, %plug, "connection established");
        self.event_log
            .push(GraphEvent::ConnectionEstablished(connection));
        if plug_attached {
            self.apply_pre_connects(&plug.node);
        }
        true
    }

    /// Rotate then translate the plug's node onto the receiver.
    fn align(&mut self, receiver: &EndpointId, plug: &EndpointId) {
        let Some(receiver_world) = self
            .nodes
            .get(&receiver.node)
            .and_then(|n| n.connection_world(&receiver.key))
        else {
            return;
        };
        let facing = receiver_world.rotation * Quat::from_rotation_z(std::f32::consts::PI);

        let Some(node) = self.nodes.get_mut(&plug.node) else {
            return;
        };
        let Some(plug_world) = node.connection_world(&plug.key) else {
            return;
        };
        let delta = facing * plug_world.rotation.inverse();
        node.root.rotation = (delta * node.root.rotation).normalize();

        let Some(plug_world) = node.connection_world(&plug.key) else {
            return;
        };
        let offset: Vec3 = receiver_world.position - plug_world.position;
        node.root.position += offset;
    }

    fn set_connected(&mut self, connection: &Connection, connected: bool) {
        for endpoint in [&connection.receiver, &connection.plug] {
            if let Some(c) = self
                .nodes
                .get_mut(&endpoint.node)
                .and_then(|n| n.connection_mut(&endpoint.key))
            {
                c.set_connected(connected);
            }
        }
    }

    fn unlink(&mut self, connection: &Connection) {
        self.receivers.remove(&connection.receiver);
        self.plugs.remove(&connection.plug);
        self.set_connected(connection, false);
        tracing::debug!(receiver = %connection.receiver, plug = %connection.plug, "connection removed");
        self.event_log
            .push(GraphEvent::ConnectionRemoved(connection.clone()));
    }

    /// Remove the link, then detach every node the central node no longer
    /// reaches.
    pub fn disconnect(&mut self, receiver: &EndpointId, plug: &EndpointId) -> bool {
        if !self.has_connection(receiver, plug) {
            tracing::warn!(%receiver, %plug, "cannot disconnect: no such connection");
            return false;
        }
        let connection = Connection {
            receiver: receiver.clone(),
            plug: plug.clone(),
        };
        self.unlink(&connection);
        self.cleanup_nodes();
        true
    }

    /// Keys reachable from the central node under the current policy.
    pub fn reachable(&self) -> BTreeSet<String> {
        let mut reached = BTreeSet::new();
        let mut pending: Vec<String> = self.central.iter().cloned().collect();
        while let Some(key) = pending.pop() {
            if !reached.insert(key.clone()) {
                continue;
            }
            let Some(node) = self.nodes.get(&key) else {
                continue;
            };
            for (endpoint_key, connection) in node.connections() {
                let endpoint = EndpointId::new(key.as_str(), endpoint_key.as_str());
                let next = match connection.kind() {
                    ConnectionKind::Receiver => self.receivers.get(&endpoint).map(|c| &c.plug.node),
                    ConnectionKind::Plug if self.policy == ReachabilityPolicy::Bidirectional => {
                        self.plugs.get(&endpoint).map(|c| &c.receiver.node)
                    }
                    ConnectionKind::Plug => None,
                };
                if let Some(next) = next {
                    pending.push(next.clone());
                }
            }
        }
        reached
    }

    fn cleanup_nodes(&mut self) {
        let reached = self.reachable();
        let orphans: Vec<String> = self
            .nodes
            .keys()
            .filter(|k| !reached.contains(*k))
            .cloned()
            .collect();
        for key in orphans {
            self.remove_node(&key);
        }
    }

    /// Resolve a slash-separated path from `start`.
    ///
    /// Segments may be prefixed with `node:`, `object:`, `plug:` or
    /// `receiver:`. A bare segment tries an object of the current node, the
    /// node plugged into its receiver, the node its plug is plugged into and
    /// finally a node by key. An empty path yields the start node.
    pub fn find_object(&self, path: &str, start: Option<&str>) -> Option<Found> {
        let mut current = start.filter(|k| self.nodes.contains_key(*k)).map(str::to_owned);
        let segments: Vec<&str> = path
            .trim()
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if segments.is_empty() {
            return current.map(Found::Node);
        }

        let mut result = None;
        for segment in segments {
            let (prefix, key) = match segment.split_once(':') {
                Some((prefix, key)) => (Some(prefix), key),
                None => (None, segment),
            };
            let search = |kind: &str| prefix.is_none_or(|p| p == kind);
            let here = current.as_deref();

            let found = here
                .filter(|_| search("object"))
                .and_then(|node| {
                    self.nodes.get(node)?.object(key).map(|_| Found::Object {
                        node: node.to_owned(),
                        key: key.to_owned(),
                    })
                })
                .or_else(|| {
                    let node = here.filter(|_| search("receiver"))?;
                    let plug = &self.receivers.get(&EndpointId::new(node, key))?.plug;
                    Some(Found::Node(plug.node.clone()))
                })
                .or_else(|| {
                    let node = here.filter(|_| search("plug"))?;
                    let receiver = &self.plugs.get(&EndpointId::new(node, key))?.receiver;
                    Some(Found::Node(receiver.node.clone()))
                })
                .or_else(|| {
                    search("node")
                        .then(|| self.node(key))
                        .flatten()
                        .map(|n| Found::Node(n.key().to_owned()))
                });

            match found {
                Some(Found::Node(node)) => {
                    current = Some(node.clone());
                    result = Some(Found::Node(node));
                }
                Some(object) => result = Some(object),
                None => return None,
            }
        }
        result
    }

    /// Objects a modifier acts on: every object of a node, or one object.
    pub fn target_objects_mut(&mut self, target: &Found) -> Vec<&mut Object3D> {
        match target {
            Found::Node(key) => self
                .nodes
                .get_mut(key)
                .map(|n| n.objects_mut().collect())
                .unwrap_or_default(),
            Found::Object { node, key } => self
                .nodes
                .get_mut(node)
                .and_then(|n| n.object_mut(key))
                .into_iter()
                .collect(),
        }
    }

    /// Visible objects of every attached node in world space.
    pub fn scene(&self) -> Scene {
        let mut scene = Scene::new();
        for node in self.nodes.values() {
            node.push_to_scene(&mut scene);
        }
        scene
    }
}
