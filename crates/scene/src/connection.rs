use scenecraft_render::Object3D;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a connection endpoint. A plug is aligned onto a receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    Plug,
    Receiver,
}

impl ConnectionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionKind::Plug => "plug",
            ConnectionKind::Receiver => "receiver",
        }
    }
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-endpoint overrides from a node's `connectionProperties`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProperties {
    pub hide_on_connect: Option<bool>,
}

/// A plug or receiver: a transform-only group inside a scene node.
#[derive(Debug, Clone)]
pub struct SceneNodeConnection {
    kind: ConnectionKind,
    pub object: Object3D,
    pub hide_on_connect: bool,
}

impl SceneNodeConnection {
    pub fn new(kind: ConnectionKind, object: Object3D) -> Self {
        Self {
            kind,
            object,
            hide_on_connect: false,
        }
    }

    pub fn kind(&self) -> ConnectionKind {
        self.kind
    }

    pub fn is_plug(&self) -> bool {
        self.kind == ConnectionKind::Plug
    }

    pub fn is_receiver(&self) -> bool {
        self.kind == ConnectionKind::Receiver
    }

    /// Unset properties keep their current value.
    pub fn apply_properties(&mut self, properties: &ConnectionProperties) {
        if let Some(hide) = properties.hide_on_connect {
            self.hide_on_connect = hide;
        }
    }

    pub(crate) fn set_connected(&mut self, connected: bool) {
        if self.hide_on_connect {
            self.object.visible = !connected;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties_only_override_what_they_set() {
        let mut plug = SceneNodeConnection::new(ConnectionKind::Plug, Object3D::group("plug1"));
        plug.apply_properties(&ConnectionProperties {
            hide_on_connect: Some(true),
        });
        plug.apply_properties(&ConnectionProperties::default());
        assert!(plug.hide_on_connect);
        assert!(plug.is_plug());
    }

    #[test]
    fn hidden_only_while_connected() {
        let mut receiver =
            SceneNodeConnection::new(ConnectionKind::Receiver, Object3D::group("socket"));
        receiver.set_connected(true);
        assert!(receiver.object.visible);

        receiver.hide_on_connect = true;
        receiver.set_connected(true);
        assert!(!receiver.object.visible);
        receiver.set_connected(false);
        assert!(receiver.object.visible);
    }

    #[test]
    fn kinds_deserialize_lowercase() {
        let kind: ConnectionKind = serde_yaml::from_str("receiver").unwrap();
        assert_eq!(kind, ConnectionKind::Receiver);
        assert_eq!(ConnectionKind::Plug.to_string(), "plug");
    }
}
